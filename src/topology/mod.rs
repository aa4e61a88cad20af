//! Immutable CSR graph topologies and their derived views.
//!
//! The base [`GraphTopology`] is a plain CSR: exclusive-end offsets plus a
//! destination array, with an edge permutation mapping local edge ids back to
//! base property indices (identity for the base). Derived topologies
//! (transposed, edge-sorted, node-shuffled, edge-type-aware) are produced by
//! pure transformations in [`shuffle`] / [`type_aware`] and memoized by the
//! view cache in [`cache`]; read-only wrappers over them live in [`views`].

pub mod cache;
pub mod shuffle;
pub mod type_aware;
pub mod views;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dense node id.
pub type Node = u32;
/// Dense edge id.
pub type Edge = u64;
/// Index into the external columnar property store.
pub type PropertyIndex = u64;
/// Entity type id; at most 256 distinct values are assumed.
pub type EntityTypeId = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransposeKind {
    No,
    Yes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeSortKind {
    Any,
    SortedByDestId,
    SortedByEdgeType,
    SortedByNodeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeSortKind {
    Any,
    SortedByDegree,
    SortedByNodeType,
}

/// Adjacency of a graph in CSR format.
///
/// `adj_indices[n]` is the one-past-last edge of node `n`; the edges of `n`
/// are `adj_indices[n-1]..adj_indices[n]` with an implicit leading zero.
#[derive(Debug, Default)]
pub struct GraphTopology {
    adj_indices: Vec<Edge>,
    dests: Vec<Node>,
    edge_prop_indices: Vec<PropertyIndex>,
    tpose_state: TransposeKind,
    edge_sort_state: EdgeSortKind,
}

impl Default for TransposeKind {
    fn default() -> Self {
        TransposeKind::No
    }
}

impl Default for EdgeSortKind {
    fn default() -> Self {
        EdgeSortKind::Any
    }
}

impl Default for NodeSortKind {
    fn default() -> Self {
        NodeSortKind::Any
    }
}

impl GraphTopology {
    /// Build a base topology, validating the CSR invariants. The edge
    /// property index is the identity.
    pub fn new(adj_indices: Vec<Edge>, dests: Vec<Node>) -> Result<Self> {
        let num_nodes = adj_indices.len();
        let num_edges = dests.len();

        let mut prev = 0u64;
        for (n, &end) in adj_indices.iter().enumerate() {
            if end < prev {
                return Err(Error::invalid(format!(
                    "adj_indices must be nondecreasing: adj_indices[{n}] = {end} < {prev}"
                )));
            }
            prev = end;
        }
        if num_nodes > 0 && adj_indices[num_nodes - 1] != num_edges as u64 {
            return Err(Error::invalid(format!(
                "adj_indices[{}] = {} does not match num_edges = {}",
                num_nodes - 1,
                adj_indices[num_nodes - 1],
                num_edges
            )));
        }
        if num_nodes == 0 && num_edges != 0 {
            return Err(Error::invalid("edges present in a topology with no nodes"));
        }
        for (e, &dst) in dests.iter().enumerate() {
            if dst as usize >= num_nodes {
                return Err(Error::invalid(format!(
                    "dests[{e}] = {dst} out of range [0, {num_nodes})"
                )));
            }
        }

        let edge_prop_indices = (0..num_edges as u64).collect();
        Ok(GraphTopology {
            adj_indices,
            dests,
            edge_prop_indices,
            tpose_state: TransposeKind::No,
            edge_sort_state: EdgeSortKind::Any,
        })
    }

    /// Assemble from already-validated parts.
    pub(crate) fn from_parts(
        adj_indices: Vec<Edge>,
        dests: Vec<Node>,
        edge_prop_indices: Vec<PropertyIndex>,
        tpose_state: TransposeKind,
        edge_sort_state: EdgeSortKind,
    ) -> Self {
        debug_assert_eq!(dests.len(), edge_prop_indices.len());
        GraphTopology {
            adj_indices,
            dests,
            edge_prop_indices,
            tpose_state,
            edge_sort_state,
        }
    }

    /// Deep copy, preserving tags and the property permutation.
    pub fn copy(&self) -> Self {
        GraphTopology {
            adj_indices: self.adj_indices.clone(),
            dests: self.dests.clone(),
            edge_prop_indices: self.edge_prop_indices.clone(),
            tpose_state: self.tpose_state,
            edge_sort_state: self.edge_sort_state,
        }
    }

    pub fn num_nodes(&self) -> u64 {
        self.adj_indices.len() as u64
    }

    pub fn num_edges(&self) -> u64 {
        self.dests.len() as u64
    }

    pub fn adj_data(&self) -> &[Edge] {
        &self.adj_indices
    }

    pub fn dest_data(&self) -> &[Node] {
        &self.dests
    }

    pub fn edge_prop_index_data(&self) -> &[PropertyIndex] {
        &self.edge_prop_indices
    }

    /// Element-wise comparison of the adjacency arrays. Expensive on large
    /// graphs.
    pub fn equals(&self, other: &GraphTopology) -> bool {
        self.adj_indices == other.adj_indices && self.dests == other.dests
    }

    pub fn nodes(&self) -> std::ops::Range<Node> {
        0..self.num_nodes() as Node
    }

    /// All edge ids.
    pub fn all_out_edges(&self) -> std::ops::Range<Edge> {
        0..self.num_edges()
    }

    /// Edge range of `node`.
    pub fn out_edges(&self, node: Node) -> std::ops::Range<Edge> {
        let n = node as usize;
        debug_assert!(n < self.adj_indices.len());
        let begin = if n > 0 { self.adj_indices[n - 1] } else { 0 };
        begin..self.adj_indices[n]
    }

    pub fn out_edge_dst(&self, edge: Edge) -> Node {
        self.dests[edge as usize]
    }

    pub fn out_degree(&self, node: Node) -> usize {
        let r = self.out_edges(node);
        (r.end - r.start) as usize
    }

    /// Source node of an edge id, by binary search over the offsets.
    pub fn edge_src(&self, edge: Edge) -> Node {
        debug_assert!(edge < self.num_edges());
        if edge < self.adj_indices[0] {
            return 0;
        }
        // First node whose exclusive end exceeds the edge id.
        let n = self.adj_indices.partition_point(|&end| end <= edge);
        debug_assert!(n < self.adj_indices.len());
        n as Node
    }

    pub fn edge_property_index(&self, edge: Edge) -> PropertyIndex {
        self.edge_prop_indices[edge as usize]
    }

    pub fn node_property_index(&self, node: Node) -> PropertyIndex {
        node as PropertyIndex
    }

    pub fn is_transposed(&self) -> bool {
        self.tpose_state == TransposeKind::Yes
    }

    pub fn transpose_state(&self) -> TransposeKind {
        self.tpose_state
    }

    pub fn edge_sort_state(&self) -> EdgeSortKind {
        self.edge_sort_state
    }

    pub(crate) fn set_transpose_state(&mut self, state: TransposeKind) {
        self.tpose_state = state;
    }

    pub(crate) fn set_edge_sort_state(&mut self, state: EdgeSortKind) {
        self.edge_sort_state = state;
    }

    pub(crate) fn arrays_mut(
        &mut self,
    ) -> (&mut Vec<Edge>, &mut Vec<Node>, &mut Vec<PropertyIndex>) {
        (
            &mut self.adj_indices,
            &mut self.dests,
            &mut self.edge_prop_indices,
        )
    }
}

/// Incremental builder for small graphs. Add nodes, add edges, then
/// [`TopologyBuilder::convert_to_csr`].
pub struct TopologyBuilder {
    adjacency: Vec<Vec<Node>>,
    symmetric: bool,
    allow_multi_edge: bool,
}

impl TopologyBuilder {
    /// Every `add_edge(a, b)` also inserts `(b, a)`.
    pub fn symmetric() -> Self {
        TopologyBuilder {
            adjacency: Vec::new(),
            symmetric: true,
            allow_multi_edge: false,
        }
    }

    pub fn asymmetric() -> Self {
        TopologyBuilder {
            adjacency: Vec::new(),
            symmetric: false,
            allow_multi_edge: false,
        }
    }

    pub fn with_multi_edges(mut self) -> Self {
        self.allow_multi_edge = true;
        self
    }

    pub fn add_nodes(&mut self, count: usize) {
        self.adjacency.resize(self.adjacency.len() + count, Vec::new());
    }

    pub fn add_edge(&mut self, src: Node, dst: Node) {
        self.add_edge_impl(src, dst);
        if self.symmetric {
            self.add_edge_impl(dst, src);
        }
    }

    fn add_edge_impl(&mut self, src: Node, dst: Node) {
        debug_assert!((src as usize) < self.adjacency.len());
        debug_assert!((dst as usize) < self.adjacency.len());
        let adj = &mut self.adjacency[src as usize];
        if self.allow_multi_edge || !adj.contains(&dst) {
            adj.push(dst);
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.adjacency.len()
    }

    pub fn num_edges(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    pub fn degree(&self, node: Node) -> usize {
        self.adjacency[node as usize].len()
    }

    pub fn convert_to_csr(&self) -> GraphTopology {
        let mut adj_indices = Vec::with_capacity(self.num_nodes());
        let mut dests = Vec::with_capacity(self.num_edges());
        let mut prefix = 0u64;
        for adj in &self.adjacency {
            prefix += adj.len() as u64;
            adj_indices.push(prefix);
            dests.extend_from_slice(adj);
        }
        let num_edges = dests.len() as u64;
        GraphTopology::from_parts(
            adj_indices,
            dests,
            (0..num_edges).collect(),
            TransposeKind::No,
            EdgeSortKind::Any,
        )
    }
}

/// Uniform-random CSR: every node gets `edges_per_node` destinations drawn
/// uniformly. Deterministic for a given seed.
pub fn uniform_random_topology(num_nodes: usize, edges_per_node: usize, seed: u64) -> GraphTopology {
    let mut rng = StdRng::seed_from_u64(seed);
    let num_edges = num_nodes * edges_per_node;
    let mut adj_indices = Vec::with_capacity(num_nodes);
    let mut dests = Vec::with_capacity(num_edges);
    for n in 0..num_nodes {
        adj_indices.push(((n + 1) * edges_per_node) as u64);
        for _ in 0..edges_per_node {
            dests.push(rng.random_range(0..num_nodes) as Node);
        }
    }
    GraphTopology::from_parts(
        adj_indices,
        dests,
        (0..num_edges as u64).collect(),
        TransposeKind::No,
        EdgeSortKind::Any,
    )
}
