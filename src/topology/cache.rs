//! View cache: memoizes derived topologies keyed by their
//! (transpose, node-sort, edge-sort) tags.
//!
//! The cache is mutated during setup (building views) and consulted
//! read-only during parallel execution; it is not itself safe for concurrent
//! mutation. Cached entries are shared-immutable (`Arc`) and may back any
//! number of live views.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::properties::EdgeTypeProvider;
use crate::runtime::Runtime;
use crate::topology::shuffle::{EdgeShuffleTopology, ShuffleTopology};
use crate::topology::type_aware::{CondensedTypeIdMap, EdgeTypeAwareTopology};
use crate::topology::{
    EdgeSortKind, EntityTypeId, GraphTopology, Node, NodeSortKind, PropertyIndex, TransposeKind,
};

/// The cache's default topology: either the base CSR or a derived topology
/// promoted over it (see [`ViewCache::reseat_default`]).
#[derive(Clone)]
pub enum DefaultTopology {
    Base(Arc<GraphTopology>),
    Promoted(Arc<EdgeShuffleTopology>),
}

impl std::ops::Deref for DefaultTopology {
    type Target = GraphTopology;

    fn deref(&self) -> &GraphTopology {
        match self {
            DefaultTopology::Base(t) => t,
            DefaultTopology::Promoted(t) => t.csr(),
        }
    }
}

/// Serializable snapshot of one cached topology, for round-tripping through
/// an external store. Field names are the wire contract; an external
/// serializer reads them verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RdgTopology {
    pub transpose_state: TransposeKind,
    pub node_sort_state: NodeSortKind,
    pub edge_sort_state: EdgeSortKind,
    pub adj_indices: Vec<u64>,
    pub dests: Vec<Node>,
    pub edge_prop_indices: Vec<PropertyIndex>,
    /// Present for fully shuffled topologies.
    pub node_prop_indices: Option<Vec<PropertyIndex>>,
    /// Present for edge-type-aware topologies.
    pub per_type_adj_indices: Option<Vec<u64>>,
    /// Condensed type map (dense index -> type id), when per-type data is
    /// present.
    pub edge_type_index: Option<Vec<EntityTypeId>>,
}

impl RdgTopology {
    fn from_edge_shuffle(topo: &EdgeShuffleTopology) -> Self {
        RdgTopology {
            transpose_state: topo.transpose_state(),
            node_sort_state: NodeSortKind::Any,
            edge_sort_state: topo.edge_sort_state(),
            adj_indices: topo.adj_data().to_vec(),
            dests: topo.dest_data().to_vec(),
            edge_prop_indices: topo.edge_prop_index_data().to_vec(),
            node_prop_indices: None,
            per_type_adj_indices: None,
            edge_type_index: None,
        }
    }

    fn from_shuffle(topo: &ShuffleTopology) -> Self {
        let mut rdg = Self::from_edge_shuffle(topo);
        rdg.node_sort_state = topo.node_sort_state();
        rdg.node_prop_indices = Some(topo.node_prop_index_data().to_vec());
        rdg
    }

    fn from_edge_type_aware(topo: &EdgeTypeAwareTopology) -> Self {
        let mut rdg = Self::from_edge_shuffle(topo);
        rdg.per_type_adj_indices = Some(topo.per_type_adj_data().to_vec());
        rdg.edge_type_index = Some(topo.distinct_edge_types().to_vec());
        rdg
    }

    fn to_csr(&self) -> GraphTopology {
        GraphTopology::from_parts(
            self.adj_indices.clone(),
            self.dests.clone(),
            self.edge_prop_indices.clone(),
            self.transpose_state,
            self.edge_sort_state,
        )
    }

    /// Rehydrate as an edge-shuffle topology.
    pub fn to_edge_shuffle(&self) -> EdgeShuffleTopology {
        EdgeShuffleTopology::from_csr(self.to_csr())
    }

    /// Rehydrate as a fully shuffled topology, if node data is present.
    pub fn to_shuffle(&self) -> Option<ShuffleTopology> {
        let node_prop_indices = self.node_prop_indices.clone()?;
        Some(ShuffleTopology::from_parts(
            self.to_edge_shuffle(),
            node_prop_indices,
            self.node_sort_state,
        ))
    }

    /// Rehydrate as an edge-type-aware topology, if per-type data is present.
    pub fn to_edge_type_aware(&self) -> Option<EdgeTypeAwareTopology> {
        let per_type = self.per_type_adj_indices.clone()?;
        let index_to_type = self.edge_type_index.clone()?;
        Some(EdgeTypeAwareTopology::from_parts(
            self.to_edge_shuffle(),
            Arc::new(CondensedTypeIdMap::from_parts(index_to_type)),
            per_type,
        ))
    }
}

#[derive(Default)]
pub struct ViewCache {
    original: Arc<GraphTopology>,
    default_override: Option<Arc<EdgeShuffleTopology>>,
    edge_shuff_topos: Vec<Arc<EdgeShuffleTopology>>,
    fully_shuff_topos: Vec<Arc<ShuffleTopology>>,
    edge_type_aware_topos: Vec<Arc<EdgeTypeAwareTopology>>,
    edge_type_id_map: Option<Arc<CondensedTypeIdMap>>,
}

impl ViewCache {
    pub fn new(original: GraphTopology) -> Self {
        ViewCache {
            original: Arc::new(original),
            ..Default::default()
        }
    }

    /// The base CSR (or the topology promoted over it).
    pub fn default_topology(&self) -> DefaultTopology {
        match &self.default_override {
            Some(t) => DefaultTopology::Promoted(Arc::clone(t)),
            None => DefaultTopology::Base(Arc::clone(&self.original)),
        }
    }

    pub fn default_topology_ref(&self) -> &GraphTopology {
        match &self.default_override {
            Some(t) => t.csr(),
            None => &self.original,
        }
    }

    /// Promote an untransposed derived topology to be the default, avoiding
    /// two equivalent CSRs. Returns false (and does nothing) for transposed
    /// topologies.
    pub fn reseat_default(&mut self, topo: &Arc<EdgeShuffleTopology>) -> bool {
        if topo.is_transposed() {
            return false;
        }
        self.default_override = Some(Arc::clone(topo));
        true
    }

    /// Purge every cached topology and reset the default to an empty one.
    pub fn drop_all(&mut self) {
        self.original = Arc::new(GraphTopology::default());
        self.default_override = None;
        self.edge_shuff_topos.clear();
        self.fully_shuff_topos.clear();
        self.edge_type_aware_topos.clear();
        self.edge_type_id_map = None;
    }

    /// Cached-or-built edge-shuffle topology with the given tags. An entry
    /// matches if its transpose tag is exact and its edge-sort tag matches
    /// (`Any` matches any sort state). Building transposes first, then sorts.
    pub fn edge_shuffle_topology(
        &mut self,
        rt: &Runtime,
        tpose: TransposeKind,
        edge_sort: EdgeSortKind,
        edge_types: Option<&dyn EdgeTypeProvider>,
    ) -> Result<Arc<EdgeShuffleTopology>> {
        if let Some(hit) = self
            .edge_shuff_topos
            .iter()
            .find(|t| t.transpose_state() == tpose && t.has_edges_sorted_by(edge_sort))
        {
            return Ok(Arc::clone(hit));
        }
        let built = Arc::new(EdgeShuffleTopology::make(
            rt,
            self.default_topology_ref(),
            tpose,
            edge_sort,
            edge_types,
        )?);
        self.edge_shuff_topos.push(Arc::clone(&built));
        Ok(built)
    }

    /// Like [`Self::edge_shuffle_topology`] but yields an owned topology that
    /// is *not* left in the cache; a uniquely-owned cache hit is popped,
    /// otherwise a fresh one is built.
    fn pop_edge_shuffle_topology(
        &mut self,
        rt: &Runtime,
        tpose: TransposeKind,
        edge_sort: EdgeSortKind,
        edge_types: Option<&dyn EdgeTypeProvider>,
    ) -> Result<EdgeShuffleTopology> {
        if let Some(pos) = self
            .edge_shuff_topos
            .iter()
            .position(|t| t.transpose_state() == tpose && t.has_edges_sorted_by(edge_sort))
        {
            let arc = self.edge_shuff_topos.swap_remove(pos);
            match Arc::try_unwrap(arc) {
                Ok(owned) => return Ok(owned),
                Err(shared) => {
                    // Still referenced by a live view; leave it cached.
                    self.edge_shuff_topos.push(shared);
                }
            }
        }
        EdgeShuffleTopology::make(rt, self.default_topology_ref(), tpose, edge_sort, edge_types)
    }

    /// Cached-or-built fully shuffled topology.
    pub fn shuffle_topology(
        &mut self,
        rt: &Runtime,
        tpose: TransposeKind,
        node_sort: NodeSortKind,
        edge_sort: EdgeSortKind,
        edge_types: Option<&dyn EdgeTypeProvider>,
    ) -> Result<Arc<ShuffleTopology>> {
        if let Some(hit) = self.fully_shuff_topos.iter().find(|t| {
            t.transpose_state() == tpose
                && t.has_nodes_sorted_by(node_sort)
                && t.has_edges_sorted_by(edge_sort)
        }) {
            return Ok(Arc::clone(hit));
        }
        let seed = self.edge_shuffle_topology(rt, tpose, EdgeSortKind::Any, edge_types)?;
        let built = Arc::new(ShuffleTopology::make_from_topo(
            rt, &seed, node_sort, edge_sort, edge_types,
        )?);
        self.fully_shuff_topos.push(Arc::clone(&built));
        Ok(built)
    }

    /// Condensed edge-type map, built on first request and reused.
    pub fn edge_type_index(
        &mut self,
        rt: &Runtime,
        edge_types: &dyn EdgeTypeProvider,
    ) -> Arc<CondensedTypeIdMap> {
        if let Some(map) = &self.edge_type_id_map {
            return Arc::clone(map);
        }
        let map = Arc::new(CondensedTypeIdMap::from_edge_types(
            rt,
            self.default_topology_ref(),
            edge_types,
        ));
        self.edge_type_id_map = Some(Arc::clone(&map));
        map
    }

    /// Cached-or-built edge-type-aware topology for the given transpose
    /// direction.
    pub fn edge_type_aware_topology(
        &mut self,
        rt: &Runtime,
        tpose: TransposeKind,
        edge_types: &dyn EdgeTypeProvider,
    ) -> Result<Arc<EdgeTypeAwareTopology>> {
        if let Some(hit) = self
            .edge_type_aware_topos
            .iter()
            .find(|t| t.transpose_state() == tpose)
        {
            return Ok(Arc::clone(hit));
        }
        let type_map = self.edge_type_index(rt, edge_types);
        let sorted = self.pop_edge_shuffle_topology(
            rt,
            tpose,
            EdgeSortKind::SortedByEdgeType,
            Some(edge_types),
        )?;
        let built = Arc::new(EdgeTypeAwareTopology::make_from(
            rt,
            edge_types,
            type_map,
            sorted,
        )?);
        self.edge_type_aware_topos.push(Arc::clone(&built));
        Ok(built)
    }

    /// Snapshot every cached derived topology for round-tripping through an
    /// external store. Pure read; calling it twice yields equal snapshots.
    pub fn to_rdg_topologies(&self) -> Vec<RdgTopology> {
        let mut out = Vec::new();
        for t in &self.edge_shuff_topos {
            out.push(RdgTopology::from_edge_shuffle(t));
        }
        for t in &self.fully_shuff_topos {
            out.push(RdgTopology::from_shuffle(t));
        }
        for t in &self.edge_type_aware_topos {
            out.push(RdgTopology::from_edge_type_aware(t));
        }
        out
    }

    pub fn num_cached(&self) -> usize {
        self.edge_shuff_topos.len() + self.fully_shuff_topos.len() + self.edge_type_aware_topos.len()
    }
}
