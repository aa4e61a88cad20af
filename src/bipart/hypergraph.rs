//! Hypergraph representation for the BiPart partitioner.
//!
//! A hypergraph with H hyperedges and N nodes is stored as a CSR over
//! `H + N` graph nodes: ids `[0, H)` are synthetic hyperedge nodes, ids
//! `[H, H + N)` are the real nodes, and every hyperedge node points one
//! directed edge at each of its members. Per-node algorithm state lives in a
//! [`MetisNode`] record whose fields are relaxed atomics so coarsening,
//! partitioning and refinement can update them from parallel loops.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::runtime::{parallel_prefix_sum, Runtime};
use crate::topology::shuffle::split_per_node;
use crate::topology::{Edge, EdgeSortKind, GraphTopology, Node, TransposeKind};

pub type Weight = u32;
pub type Gain = i64;
pub type Netval = i64;
pub type Netnum = u32;

pub const NETNUM_MAX: Netnum = u32::MAX;
pub const NETVAL_MAX: Netval = i64::MAX;
pub const NETVAL_MIN: Netval = i64::MIN;
/// Partition id of a hyperedge spanning several partitions.
pub const INF_PARTITION: u32 = u32::MAX;

/// Per-node mutable state. All fields are relaxed atomics; multi-writer
/// updates go through CAS/min/add, reads are plain relaxed loads.
#[derive(Debug)]
pub struct MetisNode {
    partition: AtomicU32,
    parent: AtomicU32,
    node_id: AtomicU32,
    child_id: AtomicU32,
    graph_index: AtomicU32,
    counter: AtomicU32,
    list_index: AtomicU32,
    weight: AtomicU32,
    matched: AtomicBool,
    not_alone: AtomicBool,
    positive_gain: AtomicI64,
    negative_gain: AtomicI64,
    degree: AtomicU32,
    netrand: AtomicI64,
    netval: AtomicI64,
    netnum: AtomicU32,
}

impl Default for MetisNode {
    fn default() -> Self {
        MetisNode {
            partition: AtomicU32::new(0),
            parent: AtomicU32::new(0),
            node_id: AtomicU32::new(0),
            child_id: AtomicU32::new(0),
            graph_index: AtomicU32::new(0),
            counter: AtomicU32::new(0),
            list_index: AtomicU32::new(0),
            weight: AtomicU32::new(1),
            matched: AtomicBool::new(false),
            not_alone: AtomicBool::new(false),
            positive_gain: AtomicI64::new(0),
            negative_gain: AtomicI64::new(0),
            degree: AtomicU32::new(0),
            netrand: AtomicI64::new(0),
            netval: AtomicI64::new(0),
            netnum: AtomicU32::new(0),
        }
    }
}

macro_rules! atomic_field {
    ($get:ident, $set:ident, $field:ident, $ty:ty) => {
        #[inline]
        pub fn $get(&self) -> $ty {
            self.$field.load(Ordering::Relaxed)
        }

        #[inline]
        pub fn $set(&self, value: $ty) {
            self.$field.store(value, Ordering::Relaxed);
        }
    };
}

impl MetisNode {
    atomic_field!(partition, set_partition, partition, u32);
    atomic_field!(parent, set_parent, parent, Node);
    atomic_field!(node_id, set_node_id, node_id, Node);
    atomic_field!(child_id, set_child_id, child_id, Node);
    atomic_field!(graph_index, set_graph_index, graph_index, u32);
    atomic_field!(list_index, set_list_index, list_index, u32);
    atomic_field!(weight, set_weight, weight, Weight);
    atomic_field!(positive_gain, set_positive_gain, positive_gain, Gain);
    atomic_field!(negative_gain, set_negative_gain, negative_gain, Gain);
    atomic_field!(netrand, set_netrand, netrand, Netval);
    atomic_field!(netval, set_netval, netval, Netval);
    atomic_field!(netnum, set_netnum, netnum, Netnum);

    #[inline]
    pub fn degree(&self) -> u32 {
        self.degree.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_degree(&self, d: u32) {
        self.degree.store(d, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_degree(&self, d: u32) {
        self.degree.fetch_add(d, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_matched(&self) -> bool {
        self.matched.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_matched(&self) {
        self.matched.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn unset_matched(&self) {
        self.matched.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_not_alone(&self) -> bool {
        self.not_alone.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_not_alone(&self) {
        self.not_alone.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn unset_not_alone(&self) {
        self.not_alone.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn counter(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reset_counter(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_counter(&self) {
        self.counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn atomic_min_netval(&self, value: Netval) {
        crate::runtime::atomic_min_i64(&self.netval, value);
    }

    pub fn atomic_min_netrand(&self, value: Netval) {
        crate::runtime::atomic_min_i64(&self.netrand, value);
    }

    pub fn atomic_min_netnum(&self, value: Netnum) {
        crate::runtime::atomic_min_u32(&self.netnum, value);
    }

    /// Move-discouraged gain: positives minus negatives and past moves.
    pub fn gain(&self) -> Gain {
        self.positive_gain() - (self.negative_gain() + self.counter() as Gain)
    }

    /// Reset the coarsening fields and the refinement partition/counter.
    pub fn init_refine(&self, partition: u32) {
        self.set_partition(partition);
        self.reset_counter();
    }
}

/// Hypergraph as a CSR over hyperedge nodes plus member nodes.
pub struct HyperGraph {
    topo: GraphTopology,
    num_hedges: u32,
    num_hnodes: u32,
    nodes: Vec<MetisNode>,
}

impl HyperGraph {
    pub fn from_csr(topo: GraphTopology, num_hedges: u32, num_hnodes: u32) -> Self {
        let total = topo.num_nodes() as usize;
        debug_assert_eq!(total, (num_hedges + num_hnodes) as usize);
        let nodes = (0..total).map(|_| MetisNode::default()).collect();
        HyperGraph {
            topo,
            num_hedges,
            num_hnodes,
            nodes,
        }
    }

    /// Assemble from per-node adjacency lists (one list per CSR node;
    /// hyperedge nodes carry their member lists, member nodes are empty).
    pub fn from_adjacency(
        rt: &Runtime,
        edge_lists: &[Vec<Node>],
        num_hedges: u32,
        num_hnodes: u32,
    ) -> Self {
        let mut adj_indices: Vec<u64> = edge_lists.iter().map(|l| l.len() as u64).collect();
        let num_edges = parallel_prefix_sum(rt, &mut adj_indices) as usize;

        let mut dests = vec![0 as Node; num_edges];
        let chunks = split_per_node(&adj_indices, dests.as_mut_slice());
        rt.install(|| {
            chunks
                .into_par_iter()
                .zip(edge_lists.par_iter())
                .for_each(|(chunk, list)| chunk.copy_from_slice(list))
        });

        let topo = GraphTopology::from_parts(
            adj_indices,
            dests,
            (0..num_edges as Edge).collect(),
            TransposeKind::No,
            EdgeSortKind::Any,
        );
        Self::from_csr(topo, num_hedges, num_hnodes)
    }

    pub fn topology(&self) -> &GraphTopology {
        &self.topo
    }

    pub fn num_hedges(&self) -> u32 {
        self.num_hedges
    }

    pub fn num_hnodes(&self) -> u32 {
        self.num_hnodes
    }

    /// Hyperedge nodes plus member nodes.
    pub fn total_nodes(&self) -> u32 {
        self.topo.num_nodes() as u32
    }

    pub fn hedges(&self) -> std::ops::Range<Node> {
        0..self.num_hedges
    }

    pub fn hnodes(&self) -> std::ops::Range<Node> {
        self.num_hedges..self.total_nodes()
    }

    pub fn edges(&self, n: Node) -> std::ops::Range<Edge> {
        self.topo.out_edges(n)
    }

    pub fn edge_dst(&self, e: Edge) -> Node {
        self.topo.out_edge_dst(e)
    }

    pub fn degree(&self, n: Node) -> usize {
        self.topo.out_degree(n)
    }

    #[inline]
    pub fn node(&self, n: Node) -> &MetisNode {
        &self.nodes[n as usize]
    }

    /// Reset every node's identity and algorithm state: hyperedge nodes get
    /// their 1-based id as `netnum`, everything else gets the sentinel.
    pub fn init_nodes(&self, rt: &Runtime) {
        let num_hedges = self.num_hedges;
        rt.do_all(0..self.total_nodes() as usize, |n| {
            let node = &self.nodes[n];
            node.set_netnum(if (n as u32) < num_hedges {
                n as Netnum + 1
            } else {
                NETNUM_MAX
            });
            node.set_netrand(NETVAL_MAX);
            node.set_netval(NETVAL_MAX);
            node.set_node_id(n as Node + 1);
            node.set_graph_index(0);
            node.init_refine(0);
        });
    }

    /// Degree distribution snapshot: count, total, variance, min, max.
    pub fn degree_summary(&self) -> DegreeSummary {
        let mut stat = DegreeSummary::default();
        for n in 0..self.total_nodes() {
            stat.add(self.degree(n) as u64);
        }
        stat
    }
}

/// Streaming min/max/mean/variance over node degrees.
#[derive(Debug, Clone)]
pub struct DegreeSummary {
    num_nodes: u32,
    total: u64,
    min: u64,
    max: u64,
    sum_of_squares: f64,
}

impl Default for DegreeSummary {
    fn default() -> Self {
        DegreeSummary {
            num_nodes: 0,
            total: 0,
            min: u64::MAX,
            max: 0,
            sum_of_squares: 0.0,
        }
    }
}

impl DegreeSummary {
    pub fn add(&mut self, degree: u64) {
        self.num_nodes += 1;
        self.total += degree;
        self.sum_of_squares += (degree * degree) as f64;
        self.min = self.min.min(degree);
        self.max = self.max.max(degree);
    }

    pub fn node_count(&self) -> u32 {
        self.num_nodes
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        self.total as f64 / self.num_nodes as f64
    }

    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        self.sum_of_squares / self.num_nodes as f64 - mean * mean
    }
}

/// Load a hypergraph in hMETIS plaintext format: a `"num_hedges num_nodes"`
/// header, then one line of 1-based member ids per hyperedge. With
/// `skip_lone_hedges`, hyperedges with fewer than two members are dropped.
pub fn read_hmetis<R: BufRead>(reader: R, skip_lone_hedges: bool) -> Result<HyperGraph> {
    let rt = Runtime::with_threads(1)?;
    read_hmetis_with_runtime(&rt, reader, skip_lone_hedges)
}

pub fn read_hmetis_with_runtime<R: BufRead>(
    rt: &Runtime,
    reader: R,
    skip_lone_hedges: bool,
) -> Result<HyperGraph> {
    let mut lines = reader.lines();
    let header = lines
        .next()
        .ok_or_else(|| Error::invalid("empty hypergraph file"))??;
    let mut parts = header.split_whitespace();
    let declared_hedges: u32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::invalid(format!("bad hypergraph header: {header:?}")))?;
    let num_hnodes: u32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::invalid(format!("bad hypergraph header: {header:?}")))?;

    let mut members_per_hedge: Vec<Vec<Node>> = Vec::with_capacity(declared_hedges as usize);
    let mut num_read = 0u32;
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if num_read >= declared_hedges {
            return Err(Error::invalid("too many hyperedge lines in input file"));
        }
        num_read += 1;
        let mut members = Vec::new();
        for token in line.split_whitespace() {
            let id: u32 = token
                .parse()
                .map_err(|_| Error::invalid(format!("bad node id {token:?} in hypergraph")))?;
            if id < 1 || id > num_hnodes {
                return Err(Error::invalid(format!(
                    "node id {id} out of bounds [1, {num_hnodes}]"
                )));
            }
            members.push(id - 1);
        }
        if members.is_empty() {
            return Err(Error::invalid("hyperedge line with no nodes"));
        }
        if skip_lone_hedges && members.len() < 2 {
            continue;
        }
        members_per_hedge.push(members);
    }

    let num_hedges = members_per_hedge.len() as u32;
    let total_nodes = num_hedges + num_hnodes;
    let mut edge_lists = vec![Vec::new(); total_nodes as usize];
    for (h, members) in members_per_hedge.into_iter().enumerate() {
        // Members live right after the hyperedge nodes in the CSR.
        edge_lists[h] = members.into_iter().map(|m| num_hedges + m).collect();
    }

    let graph = HyperGraph::from_adjacency(rt, &edge_lists, num_hedges, num_hnodes);
    graph.init_nodes(rt);
    log::debug!(
        "hmetis: {} hyperedges, {} nodes, {} pins",
        graph.num_hedges(),
        graph.num_hnodes(),
        graph.topology().num_edges()
    );
    Ok(graph)
}

pub fn read_hmetis_file<P: AsRef<Path>>(
    rt: &Runtime,
    path: P,
    skip_lone_hedges: bool,
) -> Result<HyperGraph> {
    let file = std::fs::File::open(path)?;
    read_hmetis_with_runtime(rt, BufReader::new(file), skip_lone_hedges)
}

/// Write one `"<1-based node id> <partition>"` line per node.
pub fn write_partitions<W: Write>(writer: &mut W, partitions: &[u32]) -> Result<()> {
    for (i, p) in partitions.iter().enumerate() {
        writeln!(writer, "{} {}", i + 1, p)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn rt() -> Runtime {
        Runtime::with_threads(2).unwrap()
    }

    #[test]
    fn reads_hmetis_layout() {
        let input = "2 4\n1 2\n3 4\n";
        let g = read_hmetis_with_runtime(&rt(), Cursor::new(input), false).unwrap();
        assert_eq!(g.num_hedges(), 2);
        assert_eq!(g.num_hnodes(), 4);
        assert_eq!(g.total_nodes(), 6);
        // Hyperedge 0 points at nodes 2 and 3 (members 1,2 shifted past the
        // hyperedge ids).
        let dests: Vec<Node> = g.edges(0).map(|e| g.edge_dst(e)).collect();
        assert_eq!(dests, vec![2, 3]);
        let dests: Vec<Node> = g.edges(1).map(|e| g.edge_dst(e)).collect();
        assert_eq!(dests, vec![4, 5]);
        // Members have no out-edges.
        assert_eq!(g.degree(2), 0);
        // Hyperedge netnum is its 1-based id; members carry the sentinel.
        assert_eq!(g.node(0).netnum(), 1);
        assert_eq!(g.node(1).netnum(), 2);
        assert_eq!(g.node(2).netnum(), NETNUM_MAX);
    }

    #[test]
    fn skips_lone_hyperedges_when_asked() {
        let input = "3 4\n1 2\n3\n3 4\n";
        let kept = read_hmetis_with_runtime(&rt(), Cursor::new(input), true).unwrap();
        assert_eq!(kept.num_hedges(), 2);

        let all = read_hmetis_with_runtime(&rt(), Cursor::new(input), false).unwrap();
        assert_eq!(all.num_hedges(), 3);
    }

    #[test]
    fn rejects_out_of_bounds_node_id() {
        let input = "1 2\n1 5\n";
        assert!(matches!(
            read_hmetis_with_runtime(&rt(), Cursor::new(input), false),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_extra_lines() {
        let input = "1 2\n1 2\n1 2\n";
        assert!(read_hmetis_with_runtime(&rt(), Cursor::new(input), false).is_err());
    }

    #[test]
    fn gain_subtracts_counter() {
        let node = MetisNode::default();
        node.set_positive_gain(5);
        node.set_negative_gain(2);
        node.inc_counter();
        assert_eq!(node.gain(), 2);
    }

    #[test]
    fn degree_summary_tracks_distribution() {
        let input = "2 3\n1 2 3\n1 2\n";
        let g = read_hmetis_with_runtime(&rt(), Cursor::new(input), false).unwrap();
        let stat = g.degree_summary();
        assert_eq!(stat.node_count(), 5);
        assert_eq!(stat.total(), 5);
        assert_eq!(stat.max(), 3);
        assert_eq!(stat.min(), 0);
    }
}
