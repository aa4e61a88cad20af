//! Edge-type condensation and the edge-type-aware topology.
//!
//! [`CondensedTypeIdMap`] is a bijection between the entity type ids observed
//! on edges and the dense range `[0, num_unique_types)`.
//! [`EdgeTypeAwareTopology`] embeds an edge-type-sorted CSR plus an expanded
//! per-(node, type) prefix-sum array so the edges of a node with a given type
//! are an O(1) lookup, no scanning.

use std::ops::Range;
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::properties::EdgeTypeProvider;
use crate::runtime::{PerThreadStorage, Runtime};
use crate::topology::shuffle::EdgeShuffleTopology;
use crate::topology::{Edge, EdgeSortKind, EntityTypeId, GraphTopology, Node};

/// Bijection between observed edge types and dense indices.
/// Invariant: `type_of(index_of(t)) == t` for every observed `t`.
pub struct CondensedTypeIdMap {
    type_to_index: FxHashMap<EntityTypeId, u32>,
    index_to_type: Vec<EntityTypeId>,
    valid: bool,
}

impl CondensedTypeIdMap {
    /// Scan every edge of `topo` and condense the observed types. Indices are
    /// assigned in ascending type-id order, so the map is deterministic.
    pub fn from_edge_types(
        rt: &Runtime,
        topo: &GraphTopology,
        types: &dyn EdgeTypeProvider,
    ) -> Self {
        let seen = PerThreadStorage::<Vec<bool>>::new(rt);
        rt.do_all(0..topo.num_edges() as usize, |e| {
            let ty = types.edge_type(topo.edge_property_index(e as Edge));
            let mut local = seen.local();
            if local.is_empty() {
                local.resize(256, false);
            }
            local[ty as usize] = true;
        });

        let mut observed = [false; 256];
        for tid in 0..seen.num_slots() {
            let local = seen.remote(tid);
            for (ty, &hit) in local.iter().enumerate() {
                if hit {
                    observed[ty] = true;
                }
            }
        }

        let index_to_type: Vec<EntityTypeId> = (0..256u16)
            .filter(|&ty| observed[ty as usize])
            .map(|ty| ty as EntityTypeId)
            .collect();
        let type_to_index = index_to_type
            .iter()
            .enumerate()
            .map(|(i, &ty)| (ty, i as u32))
            .collect();

        CondensedTypeIdMap {
            type_to_index,
            index_to_type,
            valid: true,
        }
    }

    pub(crate) fn from_parts(index_to_type: Vec<EntityTypeId>) -> Self {
        let type_to_index = index_to_type
            .iter()
            .enumerate()
            .map(|(i, &ty)| (ty, i as u32))
            .collect();
        CondensedTypeIdMap {
            type_to_index,
            index_to_type,
            valid: true,
        }
    }

    pub fn num_unique_types(&self) -> usize {
        self.index_to_type.len()
    }

    pub fn type_of(&self, index: u32) -> EntityTypeId {
        self.index_to_type[index as usize]
    }

    pub fn index_of(&self, edge_type: EntityTypeId) -> Option<u32> {
        self.type_to_index.get(&edge_type).copied()
    }

    /// True iff some edge in the graph carries this type.
    pub fn has_edge_type(&self, edge_type: EntityTypeId) -> bool {
        self.type_to_index.contains_key(&edge_type)
    }

    pub fn distinct_edge_types(&self) -> &[EntityTypeId] {
        &self.index_to_type
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

/// CSR whose edges are grouped by type within each node, plus one prefix sum
/// per (node, type) so typed edge ranges need no scan.
pub struct EdgeTypeAwareTopology {
    edge_topo: EdgeShuffleTopology,
    type_map: Arc<CondensedTypeIdMap>,
    /// `num_nodes * num_unique_types` exclusive-end offsets, flat running
    /// prefix across the whole edge array.
    per_type_adj_indices: Vec<Edge>,
}

impl std::ops::Deref for EdgeTypeAwareTopology {
    type Target = EdgeShuffleTopology;

    fn deref(&self) -> &EdgeShuffleTopology {
        &self.edge_topo
    }
}

impl EdgeTypeAwareTopology {
    /// Consume an edge-type-sorted topology and compute the per-type prefix
    /// sums.
    pub fn make_from(
        rt: &Runtime,
        types: &dyn EdgeTypeProvider,
        type_map: Arc<CondensedTypeIdMap>,
        edge_topo: EdgeShuffleTopology,
    ) -> Result<Self> {
        if edge_topo.edge_sort_state() != EdgeSortKind::SortedByEdgeType {
            return Err(Error::invalid(
                "edge-type-aware topology requires an edge-type-sorted CSR",
            ));
        }
        let num_nodes = edge_topo.num_nodes() as usize;
        let num_types = type_map.num_unique_types();

        let mut per_type = vec![0 as Edge; num_nodes * num_types];
        {
            let per_type_chunks: Vec<(usize, &mut [Edge])> =
                per_type.chunks_mut(num_types.max(1)).enumerate().collect();
            let topo = &edge_topo;
            let map = &type_map;
            rt.install(|| {
                per_type_chunks.into_par_iter().for_each(|(n, slots)| {
                    if num_types == 0 {
                        return;
                    }
                    let range = topo.out_edges(n as Node);
                    let mut e = range.start;
                    let mut running = range.start;
                    for t in 0..num_types {
                        let ty = map.type_of(t as u32);
                        while e < range.end
                            && types.edge_type(topo.edge_property_index(e)) == ty
                        {
                            e += 1;
                        }
                        running = e;
                        slots[t] = running;
                    }
                    debug_assert_eq!(running, range.end);
                })
            });
        }

        Ok(EdgeTypeAwareTopology {
            edge_topo,
            type_map,
            per_type_adj_indices: per_type,
        })
    }

    pub(crate) fn from_parts(
        edge_topo: EdgeShuffleTopology,
        type_map: Arc<CondensedTypeIdMap>,
        per_type_adj_indices: Vec<Edge>,
    ) -> Self {
        EdgeTypeAwareTopology {
            edge_topo,
            type_map,
            per_type_adj_indices,
        }
    }

    pub fn type_map(&self) -> &Arc<CondensedTypeIdMap> {
        &self.type_map
    }

    pub fn per_type_adj_data(&self) -> &[Edge] {
        &self.per_type_adj_indices
    }

    pub fn distinct_edge_types(&self) -> &[EntityTypeId] {
        self.type_map.distinct_edge_types()
    }

    pub fn has_edge_type(&self, edge_type: EntityTypeId) -> bool {
        self.type_map.has_edge_type(edge_type)
    }

    /// Edges of `node` carrying `edge_type`; empty if the type was never
    /// observed in the graph.
    pub fn edges_with_type(&self, node: Node, edge_type: EntityTypeId) -> Range<Edge> {
        let Some(t_idx) = self.type_map.index_of(edge_type) else {
            return 0..0;
        };
        let num_types = self.type_map.num_unique_types();
        let slot = node as usize * num_types + t_idx as usize;
        let begin = if slot == 0 {
            0
        } else {
            self.per_type_adj_indices[slot - 1]
        };
        begin..self.per_type_adj_indices[slot]
    }

    pub fn degree_with_type(&self, node: Node, edge_type: EntityTypeId) -> usize {
        let r = self.edges_with_type(node, edge_type);
        (r.end - r.start) as usize
    }

    /// All edges from `src` to `dst` with the given type; destinations are
    /// sorted inside each type group, so this is a binary search.
    pub fn find_all_edges_with_type(
        &self,
        src: Node,
        dst: Node,
        edge_type: EntityTypeId,
    ) -> Range<Edge> {
        let range = self.edges_with_type(src, edge_type);
        if range.is_empty() {
            return range;
        }
        let base = range.start;
        let dests = &self.csr().dest_data()[range.start as usize..range.end as usize];
        let lo = dests.partition_point(|&d| d < dst);
        let hi = dests.partition_point(|&d| d <= dst);
        base + lo as Edge..base + hi as Edge
    }

    /// All edges from `src` to `dst` of the first type that has any.
    pub fn find_all_edges(&self, src: Node, dst: Node) -> Range<Edge> {
        if self.out_degree(src) == 0 {
            return 0..0;
        }
        for &ty in self.distinct_edge_types() {
            let r = self.find_all_edges_with_type(src, dst, ty);
            if !r.is_empty() {
                return r;
            }
        }
        0..0
    }

    pub fn has_edge_with_type(&self, src: Node, dst: Node, edge_type: EntityTypeId) -> bool {
        !self.find_all_edges_with_type(src, dst, edge_type).is_empty()
    }

    pub fn has_edge(&self, src: Node, dst: Node) -> bool {
        if self.out_degree(src) == 0 {
            return false;
        }
        self.distinct_edge_types()
            .iter()
            .any(|&ty| self.has_edge_with_type(src, dst, ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::ColumnStore;
    use crate::topology::TopologyBuilder;

    fn rt() -> Runtime {
        Runtime::with_threads(4).unwrap()
    }

    /// 0 -> 1 (type 7), 0 -> 2 (type 3), 0 -> 1 (type 3), 1 -> 2 (type 7)
    fn typed_graph() -> (GraphTopology, ColumnStore) {
        let mut b = TopologyBuilder::asymmetric().with_multi_edges();
        b.add_nodes(3);
        b.add_edge(0, 1);
        b.add_edge(0, 2);
        b.add_edge(0, 1);
        b.add_edge(1, 2);
        (b.convert_to_csr(), ColumnStore::from_edge_types(vec![7, 3, 3, 7]))
    }

    #[test]
    fn condensed_map_is_a_bijection() {
        let rt = rt();
        let (topo, store) = typed_graph();
        let map = CondensedTypeIdMap::from_edge_types(&rt, &topo, &store);
        assert_eq!(map.num_unique_types(), 2);
        for i in 0..map.num_unique_types() as u32 {
            assert_eq!(map.index_of(map.type_of(i)), Some(i));
        }
        assert!(map.has_edge_type(3));
        assert!(map.has_edge_type(7));
        assert!(!map.has_edge_type(0));
    }

    #[test]
    fn typed_edge_ranges() {
        let rt = rt();
        let (topo, store) = typed_graph();
        let map = Arc::new(CondensedTypeIdMap::from_edge_types(&rt, &topo, &store));
        let mut sorted = EdgeShuffleTopology::make_original_copy(&topo);
        sorted.sort_edges_by_type_then_dest(&rt, &store);
        let aware = EdgeTypeAwareTopology::make_from(&rt, &store, map, sorted).unwrap();

        assert_eq!(aware.degree_with_type(0, 3), 2);
        assert_eq!(aware.degree_with_type(0, 7), 1);
        assert_eq!(aware.degree_with_type(1, 7), 1);
        assert_eq!(aware.degree_with_type(1, 3), 0);
        assert_eq!(aware.degree_with_type(0, 99), 0);

        // Typed range of node 0 / type 3: dests sorted ascending.
        let r = aware.edges_with_type(0, 3);
        let dests: Vec<Node> = r.map(|e| aware.out_edge_dst(e)).collect();
        assert_eq!(dests, vec![1, 2]);

        assert!(aware.has_edge_with_type(0, 1, 3));
        assert!(aware.has_edge_with_type(0, 1, 7));
        assert!(!aware.has_edge_with_type(1, 2, 3));
        assert!(aware.has_edge(1, 2));
        assert!(!aware.has_edge(2, 0));
        assert_eq!(aware.find_all_edges(0, 1).count(), 1);
    }

    #[test]
    fn requires_type_sorted_input() {
        let rt = rt();
        let (topo, store) = typed_graph();
        let map = Arc::new(CondensedTypeIdMap::from_edge_types(&rt, &topo, &store));
        let unsorted = EdgeShuffleTopology::make_original_copy(&topo);
        assert!(EdgeTypeAwareTopology::make_from(&rt, &store, map, unsorted).is_err());
    }
}
