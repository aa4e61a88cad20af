//! Derived CSR topologies: transposed / edge-sorted copies and fully
//! shuffled (node-permuted) copies of a base topology.
//!
//! Every transformation here is pure: it reads a finished topology and
//! produces a new one, carrying an edge (and for shuffles a node)
//! permutation back to base property indices.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::properties::EdgeTypeProvider;
use crate::runtime::{parallel_prefix_sum, Runtime};
use crate::topology::{
    Edge, EdgeSortKind, GraphTopology, Node, NodeSortKind, PropertyIndex, TransposeKind,
};

/// Split `data` into one contiguous chunk per node, using the exclusive-end
/// offsets of `adj`.
pub(crate) fn split_per_node<'a, T>(adj: &[Edge], mut data: &'a mut [T]) -> Vec<&'a mut [T]> {
    let mut chunks = Vec::with_capacity(adj.len());
    let mut prev = 0u64;
    for &end in adj {
        let (chunk, rest) = data.split_at_mut((end - prev) as usize);
        chunks.push(chunk);
        data = rest;
        prev = end;
    }
    chunks
}

/// A CSR whose edges may be reordered (within each node) or transposed
/// relative to the base topology. Local edge ids map back to base property
/// indices through the carried permutation.
#[derive(Debug)]
pub struct EdgeShuffleTopology {
    csr: GraphTopology,
    valid: bool,
}

impl std::ops::Deref for EdgeShuffleTopology {
    type Target = GraphTopology;

    fn deref(&self) -> &GraphTopology {
        &self.csr
    }
}

impl EdgeShuffleTopology {
    pub(crate) fn from_csr(csr: GraphTopology) -> Self {
        EdgeShuffleTopology { csr, valid: true }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn csr(&self) -> &GraphTopology {
        &self.csr
    }

    /// Untransposed deep copy of the base.
    pub fn make_original_copy(base: &GraphTopology) -> Self {
        let mut csr = base.copy();
        csr.set_transpose_state(TransposeKind::No);
        csr.set_edge_sort_state(EdgeSortKind::Any);
        EdgeShuffleTopology { csr, valid: true }
    }

    /// Transposed copy: `new.edges(v)` enumerates `{u : v in base.edges(u)}`.
    ///
    /// Three passes: atomic in-degree count, prefix sum, then a parallel
    /// scatter claiming each destination slot with a fetch-add cursor. The
    /// new edge's property index is the original edge's.
    pub fn make_transpose_copy(rt: &Runtime, base: &GraphTopology) -> Self {
        let num_nodes = base.num_nodes() as usize;
        let num_edges = base.num_edges() as usize;

        let in_degrees: Vec<AtomicU64> = (0..num_nodes).map(|_| AtomicU64::new(0)).collect();
        rt.do_all(0..num_edges, |e| {
            let dst = base.out_edge_dst(e as Edge) as usize;
            in_degrees[dst].fetch_add(1, Ordering::Relaxed);
        });

        let mut adj_indices: Vec<u64> = in_degrees
            .into_iter()
            .map(|d| d.into_inner())
            .collect();
        parallel_prefix_sum(rt, &mut adj_indices);

        // Cursor per destination, starting at its exclusive begin.
        let cursors: Vec<AtomicU64> = (0..num_nodes)
            .map(|n| {
                let start = if n > 0 { adj_indices[n - 1] } else { 0 };
                AtomicU64::new(start)
            })
            .collect();

        let dests: Vec<AtomicU64> = (0..num_edges).map(|_| AtomicU64::new(0)).collect();
        let props: Vec<AtomicU64> = (0..num_edges).map(|_| AtomicU64::new(0)).collect();

        rt.install(|| {
            (0..num_nodes).into_par_iter().for_each(|u| {
                for e in base.out_edges(u as Node) {
                    let v = base.out_edge_dst(e) as usize;
                    let slot = cursors[v].fetch_add(1, Ordering::Relaxed) as usize;
                    dests[slot].store(u as u64, Ordering::Relaxed);
                    props[slot].store(base.edge_property_index(e), Ordering::Relaxed);
                }
            })
        });

        let dests: Vec<Node> = dests.into_iter().map(|d| d.into_inner() as Node).collect();
        let props: Vec<PropertyIndex> = props.into_iter().map(|p| p.into_inner()).collect();

        let csr = GraphTopology::from_parts(
            adj_indices,
            dests,
            props,
            TransposeKind::Yes,
            EdgeSortKind::Any,
        );
        EdgeShuffleTopology { csr, valid: true }
    }

    /// Build a copy with the requested transpose and edge-sort state.
    pub fn make(
        rt: &Runtime,
        base: &GraphTopology,
        tpose: TransposeKind,
        edge_sort: EdgeSortKind,
        edge_types: Option<&dyn EdgeTypeProvider>,
    ) -> Result<Self> {
        let mut topo = match tpose {
            TransposeKind::Yes => Self::make_transpose_copy(rt, base),
            TransposeKind::No => Self::make_original_copy(base),
        };
        topo.sort_edges(rt, edge_sort, edge_types)?;
        Ok(topo)
    }

    pub fn has_edges_sorted_by(&self, kind: EdgeSortKind) -> bool {
        kind == EdgeSortKind::Any || kind == self.edge_sort_state()
    }

    pub fn sort_edges(
        &mut self,
        rt: &Runtime,
        kind: EdgeSortKind,
        edge_types: Option<&dyn EdgeTypeProvider>,
    ) -> Result<()> {
        match kind {
            EdgeSortKind::Any => Ok(()),
            EdgeSortKind::SortedByDestId => {
                self.sort_edges_by_dest_id(rt);
                Ok(())
            }
            EdgeSortKind::SortedByEdgeType => {
                let types = edge_types.ok_or_else(|| {
                    Error::invalid("edge-type sort requested but the graph has no edge type column")
                })?;
                self.sort_edges_by_type_then_dest(rt, types);
                Ok(())
            }
            EdgeSortKind::SortedByNodeType => Err(Error::NotImplemented(
                "edge sort by node type is not wired yet",
            )),
        }
    }

    /// Stable-sort each node's edges by destination, permuting the property
    /// index alongside. Parallel across nodes.
    pub fn sort_edges_by_dest_id(&mut self, rt: &Runtime) {
        Self::sort_ranges_by_key(rt, &mut self.csr, |dst, _prop| (0u8, dst));
        self.csr.set_edge_sort_state(EdgeSortKind::SortedByDestId);
    }

    /// Sort each node's edges by edge type, then destination.
    pub fn sort_edges_by_type_then_dest(&mut self, rt: &Runtime, types: &dyn EdgeTypeProvider) {
        Self::sort_ranges_by_key(rt, &mut self.csr, |dst, prop| (types.edge_type(prop), dst));
        self.csr.set_edge_sort_state(EdgeSortKind::SortedByEdgeType);
    }

    fn sort_ranges_by_key<K, F>(rt: &Runtime, csr: &mut GraphTopology, key: F)
    where
        K: Ord + Send,
        F: Fn(Node, PropertyIndex) -> K + Sync,
    {
        let num_nodes = csr.num_nodes() as usize;
        if num_nodes == 0 {
            return;
        }
        let (adj, dests, props) = csr.arrays_mut();
        let adj: &[Edge] = adj;
        let dest_chunks = split_per_node(adj, dests.as_mut_slice());
        let prop_chunks = split_per_node(adj, props.as_mut_slice());

        rt.install(|| {
            dest_chunks
                .into_par_iter()
                .zip(prop_chunks.into_par_iter())
                .for_each(|(dchunk, pchunk)| {
                    let mut pairs: Vec<(Node, PropertyIndex)> = dchunk
                        .iter()
                        .copied()
                        .zip(pchunk.iter().copied())
                        .collect();
                    pairs.sort_by_key(|&(dst, prop)| key(dst, prop));
                    for (i, (dst, prop)) in pairs.into_iter().enumerate() {
                        dchunk[i] = dst;
                        pchunk[i] = prop;
                    }
                })
        });
    }

    /// First edge from `src` to `dst`, if any. Requires `SortedByDestId`.
    pub fn find_edge(&self, src: Node, dst: Node) -> Option<Edge> {
        let r = self.find_all_edges(src, dst);
        if r.is_empty() {
            None
        } else {
            Some(r.start)
        }
    }

    /// Maximal contiguous subrange of `src`'s edges whose destination equals
    /// `dst` (parallel edges included). Requires `SortedByDestId`.
    pub fn find_all_edges(&self, src: Node, dst: Node) -> Range<Edge> {
        debug_assert!(self.has_edges_sorted_by(EdgeSortKind::SortedByDestId));
        let range = self.csr.out_edges(src);
        let base = range.start;
        let dests = &self.csr.dest_data()[range.start as usize..range.end as usize];
        let lo = dests.partition_point(|&d| d < dst);
        let hi = dests.partition_point(|&d| d <= dst);
        base + lo as Edge..base + hi as Edge
    }

    pub fn has_edge(&self, src: Node, dst: Node) -> bool {
        !self.find_all_edges(src, dst).is_empty()
    }
}

/// Fully shuffled topology: both nodes and edges may be reordered. Carries a
/// node permutation back to base property indices.
#[derive(Debug)]
pub struct ShuffleTopology {
    edge_topo: EdgeShuffleTopology,
    node_prop_indices: Vec<PropertyIndex>,
    node_sort_state: NodeSortKind,
}

impl std::ops::Deref for ShuffleTopology {
    type Target = EdgeShuffleTopology;

    fn deref(&self) -> &EdgeShuffleTopology {
        &self.edge_topo
    }
}

impl ShuffleTopology {
    pub fn node_sort_state(&self) -> NodeSortKind {
        self.node_sort_state
    }

    pub fn has_nodes_sorted_by(&self, kind: NodeSortKind) -> bool {
        kind == NodeSortKind::Any || kind == self.node_sort_state
    }

    pub fn node_property_index(&self, node: Node) -> PropertyIndex {
        self.node_prop_indices[node as usize]
    }

    pub fn node_prop_index_data(&self) -> &[PropertyIndex] {
        &self.node_prop_indices
    }

    /// Identity node order over a seed topology.
    pub fn make_from(seed: &EdgeShuffleTopology) -> Self {
        let num_nodes = seed.num_nodes();
        ShuffleTopology {
            edge_topo: EdgeShuffleTopology::from_csr(seed.csr().copy()),
            node_prop_indices: (0..num_nodes).collect(),
            node_sort_state: NodeSortKind::Any,
        }
    }

    /// Nodes reordered by descending degree (ties by old id).
    pub fn make_sorted_by_degree(rt: &Runtime, seed: &EdgeShuffleTopology) -> Self {
        Self::make_node_sorted(rt, seed, NodeSortKind::SortedByDegree, |a, b| {
            seed.out_degree(a)
                .cmp(&seed.out_degree(b))
                .reverse()
                .then(a.cmp(&b))
        })
    }

    /// General node-sorted construction: permute node ids by `cmp`, gather
    /// degrees, prefix-sum into new offsets, scatter edges through the
    /// old-to-new map. Edge order within a node follows the seed, so the
    /// edge-sort tag resets to `Any` (destination ids were renumbered).
    pub fn make_node_sorted<F>(
        rt: &Runtime,
        seed: &EdgeShuffleTopology,
        node_sort: NodeSortKind,
        cmp: F,
    ) -> Self
    where
        F: Fn(Node, Node) -> std::cmp::Ordering + Sync,
    {
        let num_nodes = seed.num_nodes() as usize;
        let num_edges = seed.num_edges() as usize;

        let mut node_prop_indices: Vec<PropertyIndex> = (0..num_nodes as u64).collect();
        rt.install(|| {
            node_prop_indices.par_sort_by(|&a, &b| cmp(a as Node, b as Node));
        });

        let mut old_to_new = vec![0 as Node; num_nodes];
        let mut degrees = vec![0u64; num_nodes];
        for (new_id, &old_id) in node_prop_indices.iter().enumerate() {
            old_to_new[old_id as usize] = new_id as Node;
            degrees[new_id] = seed.out_degree(old_id as Node) as u64;
        }
        parallel_prefix_sum(rt, &mut degrees);
        let adj_indices = degrees;

        let mut dests = vec![0 as Node; num_edges];
        let mut props = vec![0 as PropertyIndex; num_edges];
        let dest_chunks = split_per_node(&adj_indices, dests.as_mut_slice());
        let prop_chunks = split_per_node(&adj_indices, props.as_mut_slice());

        let perm = &node_prop_indices;
        let old_to_new = &old_to_new;
        rt.install(|| {
            dest_chunks
                .into_par_iter()
                .zip(prop_chunks.into_par_iter())
                .enumerate()
                .for_each(|(new_id, (dchunk, pchunk))| {
                    let old_id = perm[new_id] as Node;
                    for (k, e) in seed.out_edges(old_id).enumerate() {
                        dchunk[k] = old_to_new[seed.out_edge_dst(e) as usize];
                        pchunk[k] = seed.edge_property_index(e);
                    }
                })
        });

        let csr = GraphTopology::from_parts(
            adj_indices,
            dests,
            props,
            seed.transpose_state(),
            EdgeSortKind::Any,
        );
        ShuffleTopology {
            edge_topo: EdgeShuffleTopology::from_csr(csr),
            node_prop_indices,
            node_sort_state: node_sort,
        }
    }

    /// Build with the requested node order, then the requested edge order.
    pub fn make_from_topo(
        rt: &Runtime,
        seed: &EdgeShuffleTopology,
        node_sort: NodeSortKind,
        edge_sort: EdgeSortKind,
        edge_types: Option<&dyn EdgeTypeProvider>,
    ) -> Result<Self> {
        let mut topo = match node_sort {
            NodeSortKind::Any => Self::make_from(seed),
            NodeSortKind::SortedByDegree => Self::make_sorted_by_degree(rt, seed),
            NodeSortKind::SortedByNodeType => {
                return Err(Error::NotImplemented("node sort by node type is not wired yet"))
            }
        };
        topo.edge_topo.sort_edges(rt, edge_sort, edge_types)?;
        Ok(topo)
    }

    pub(crate) fn from_parts(
        edge_topo: EdgeShuffleTopology,
        node_prop_indices: Vec<PropertyIndex>,
        node_sort_state: NodeSortKind,
    ) -> Self {
        ShuffleTopology {
            edge_topo,
            node_prop_indices,
            node_sort_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TopologyBuilder;

    fn rt() -> Runtime {
        Runtime::with_threads(4).unwrap()
    }

    fn diamond() -> GraphTopology {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3
        let mut b = TopologyBuilder::asymmetric();
        b.add_nodes(4);
        b.add_edge(0, 1);
        b.add_edge(0, 2);
        b.add_edge(1, 3);
        b.add_edge(2, 3);
        b.convert_to_csr()
    }

    #[test]
    fn transpose_reverses_edges() {
        let rt = rt();
        let base = diamond();
        let tpose = EdgeShuffleTopology::make_transpose_copy(&rt, &base);
        assert!(tpose.is_transposed());
        assert_eq!(tpose.num_nodes(), 4);
        assert_eq!(tpose.num_edges(), 4);
        assert_eq!(tpose.out_degree(0), 0);
        assert_eq!(tpose.out_degree(3), 2);
        let mut in3: Vec<Node> = tpose.out_edges(3).map(|e| tpose.out_edge_dst(e)).collect();
        in3.sort_unstable();
        assert_eq!(in3, vec![1, 2]);
    }

    #[test]
    fn transpose_round_trip_equals_base() {
        let rt = rt();
        let base = crate::topology::uniform_random_topology(64, 3, 11);
        let mut sorted = EdgeShuffleTopology::make_original_copy(&base);
        sorted.sort_edges_by_dest_id(&rt);

        let once = EdgeShuffleTopology::make_transpose_copy(&rt, sorted.csr());
        let mut twice = EdgeShuffleTopology::make_transpose_copy(&rt, once.csr());
        twice.sort_edges_by_dest_id(&rt);
        assert!(twice.csr().equals(sorted.csr()));
    }

    #[test]
    fn transpose_property_indices_follow_edges() {
        let rt = rt();
        let base = diamond();
        let tpose = EdgeShuffleTopology::make_transpose_copy(&rt, &base);
        for e in tpose.all_out_edges() {
            let src_in_tpose = tpose.edge_src(e);
            let dst_in_tpose = tpose.out_edge_dst(e);
            // The mapped base edge must run dst -> src.
            let base_edge = tpose.edge_property_index(e);
            assert_eq!(base.edge_src(base_edge), dst_in_tpose);
            assert_eq!(base.out_edge_dst(base_edge), src_in_tpose);
        }
    }

    #[test]
    fn sort_by_dest_is_idempotent() {
        let rt = rt();
        let base = crate::topology::uniform_random_topology(40, 5, 3);
        let mut topo = EdgeShuffleTopology::make_original_copy(&base);
        topo.sort_edges_by_dest_id(&rt);
        let snapshot = topo.csr().copy();
        topo.sort_edges_by_dest_id(&rt);
        assert!(topo.csr().equals(&snapshot));
        assert_eq!(
            topo.csr().edge_prop_index_data(),
            snapshot.edge_prop_index_data()
        );
    }

    #[test]
    fn find_all_edges_returns_parallel_edges() {
        let rt = rt();
        let mut b = TopologyBuilder::asymmetric().with_multi_edges();
        b.add_nodes(3);
        b.add_edge(0, 2);
        b.add_edge(0, 1);
        b.add_edge(0, 2);
        let mut topo = EdgeShuffleTopology::make_original_copy(&b.convert_to_csr());
        topo.sort_edges_by_dest_id(&rt);
        assert_eq!(topo.find_all_edges(0, 2).count(), 2);
        assert_eq!(topo.find_all_edges(0, 1).count(), 1);
        assert!(topo.find_all_edges(0, 0).is_empty());
        assert!(topo.has_edge(0, 1));
        assert!(!topo.has_edge(1, 0));
    }

    #[test]
    fn degree_sorted_shuffle_orders_nodes() {
        let rt = rt();
        // Node 2 has the highest out-degree.
        let mut b = TopologyBuilder::asymmetric();
        b.add_nodes(4);
        b.add_edge(2, 0);
        b.add_edge(2, 1);
        b.add_edge(2, 3);
        b.add_edge(0, 1);
        let seed = EdgeShuffleTopology::make_original_copy(&b.convert_to_csr());
        let shuffled = ShuffleTopology::make_sorted_by_degree(&rt, &seed);

        assert!(shuffled.has_nodes_sorted_by(NodeSortKind::SortedByDegree));
        // New node 0 is old node 2.
        assert_eq!(shuffled.node_property_index(0), 2);
        assert_eq!(shuffled.out_degree(0), 3);
        let degrees: Vec<usize> = shuffled
            .nodes()
            .map(|n| shuffled.out_degree(n))
            .collect();
        let mut sorted = degrees.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(degrees, sorted);
        // Total edge count survives the shuffle.
        assert_eq!(shuffled.num_edges(), 4);
    }

    #[test]
    fn node_type_sort_is_not_implemented() {
        let rt = rt();
        let seed = EdgeShuffleTopology::make_original_copy(&diamond());
        let err = ShuffleTopology::make_from_topo(
            &rt,
            &seed,
            NodeSortKind::SortedByNodeType,
            EdgeSortKind::Any,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
    }
}
