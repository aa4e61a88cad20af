//! Connected components over a symmetric view.
//!
//! Six cooperating strategies share one contract: write a labeling in which
//! two nodes get equal labels iff they are in the same connected component.
//! The label reported for a node is its component root's node id after the
//! final path-compression pass.
//!
//! Concurrency: the union-find arena stores one atomic parent index per
//! node. `merge`/`link` hook the higher root under the lower root with a
//! CAS; compression is a blind store that can be overwritten by a concurrent
//! merge and is still correct because it only shortens paths. The optimistic
//! variants are nondeterministic in their choice of representative during
//! execution, but the final partition of nodes into components is not.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use rand::Rng;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::runtime::{atomic_min_u64, Accumulator, InsertBag, ReduceLogicalOr, Runtime};
use crate::topology::views::View;
use crate::topology::{Edge, Node};

/// Arena union-find: one atomic parent index per node. A node is a root iff
/// its parent equals itself.
pub struct UnionFind {
    parent: Vec<AtomicU32>,
}

impl UnionFind {
    pub fn new(num_nodes: usize) -> Self {
        UnionFind {
            parent: (0..num_nodes as u32).map(AtomicU32::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    #[inline]
    fn load(&self, n: Node) -> Node {
        self.parent[n as usize].load(Ordering::Relaxed)
    }

    /// Walk to the root, then point every visited node at it. The stores are
    /// blind and may be overwritten by a concurrent merge; they only ever
    /// shorten paths.
    pub fn find_and_compress(&self, n: Node) -> Node {
        let mut root = self.load(n);
        if root == n {
            return root;
        }
        while self.load(root) != root {
            root = self.load(root);
        }
        let mut prev = n;
        while self.load(prev) != root {
            let next = self.load(prev);
            self.parent[prev as usize].store(root, Ordering::Relaxed);
            prev = next;
        }
        root
    }

    /// Read-only root walk.
    pub fn find(&self, n: Node) -> Node {
        let mut cur = self.load(n);
        while self.load(cur) != cur {
            cur = self.load(cur);
        }
        cur
    }

    /// Hook the higher root under the lower root. Returns true on an
    /// effective merge, false when both nodes were already in the same
    /// component.
    pub fn merge(&self, a: Node, b: Node) -> bool {
        let mut a = self.load(a);
        let mut b = self.load(b);
        while a != b {
            if a < b {
                std::mem::swap(&mut a, &mut b);
            }
            // a > b
            let ac = self.load(a);
            if ac == a {
                if self.parent[a as usize]
                    .compare_exchange(a, b, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    return true;
                }
            } else if b == ac {
                return true;
            }
            a = self.load(self.load(a));
            b = self.load(b);
        }
        false
    }

    /// Like [`Self::merge`] without the empty-merge report.
    pub fn link(&self, a: Node, b: Node) {
        let mut a = self.load(a);
        let mut b = self.load(b);
        while a != b {
            if a < b {
                std::mem::swap(&mut a, &mut b);
            }
            let ac = self.load(a);
            if ac == a
                && self.parent[a as usize]
                    .compare_exchange(a, b, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
            {
                break;
            }
            if b == ac {
                break;
            }
            a = self.load(self.load(a));
            b = self.load(b);
        }
    }

    /// Merge that reports the victim root when it was hooked under the
    /// sampled large component `c`, so the caller can enqueue the victim's
    /// edges for further hooking.
    pub fn hook_min(&self, a: Node, b: Node, c: Node) -> Option<Node> {
        let mut a = self.load(a);
        let mut b = self.load(b);
        while a != b {
            if a < b {
                std::mem::swap(&mut a, &mut b);
            }
            let ac = self.load(a);
            if ac == a
                && self.parent[a as usize]
                    .compare_exchange(a, b, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
            {
                if b == c {
                    return Some(a);
                }
                return None;
            }
            if b == ac {
                return None;
            }
            a = self.load(self.load(a));
            b = self.load(b);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectedComponentsAlgorithm {
    Serial,
    LabelProp,
    Synchronous,
    Asynchronous,
    EdgeTiledAsynchronous,
    Afforest,
}

/// Computational plan: the algorithm plus its parameters. Not every
/// parameter is used by every algorithm.
#[derive(Debug, Clone, Copy)]
pub struct ConnectedComponentsPlan {
    algorithm: ConnectedComponentsAlgorithm,
    edge_tile_size: usize,
    neighbor_sample_size: u32,
    component_sample_frequency: u32,
}

impl ConnectedComponentsPlan {
    pub const DEFAULT_EDGE_TILE_SIZE: usize = 512;
    pub const DEFAULT_NEIGHBOR_SAMPLE_SIZE: u32 = 2;
    pub const DEFAULT_COMPONENT_SAMPLE_FREQUENCY: u32 = 1024;

    pub fn serial() -> Self {
        Self::with_algorithm(ConnectedComponentsAlgorithm::Serial)
    }

    /// Push-style label propagation: labels start as node ids and
    /// monotonically decrease to the component minimum.
    pub fn label_prop() -> Self {
        Self::with_algorithm(ConnectedComponentsAlgorithm::LabelProp)
    }

    /// Two-phase merge/find rounds over per-round worklists.
    pub fn synchronous() -> Self {
        Self::with_algorithm(ConnectedComponentsAlgorithm::Synchronous)
    }

    /// Optimistic concurrent merges with concurrent path compression.
    pub fn asynchronous() -> Self {
        Self::with_algorithm(ConnectedComponentsAlgorithm::Asynchronous)
    }

    pub fn edge_tiled_asynchronous(edge_tile_size: usize) -> Self {
        ConnectedComponentsPlan {
            algorithm: ConnectedComponentsAlgorithm::EdgeTiledAsynchronous,
            edge_tile_size,
            ..Self::with_algorithm(ConnectedComponentsAlgorithm::EdgeTiledAsynchronous)
        }
    }

    /// Afforest sampling: neighbor rounds, largest-component estimation,
    /// residual linking.
    pub fn afforest(neighbor_sample_size: u32, component_sample_frequency: u32) -> Self {
        ConnectedComponentsPlan {
            algorithm: ConnectedComponentsAlgorithm::Afforest,
            neighbor_sample_size,
            component_sample_frequency,
            ..Self::with_algorithm(ConnectedComponentsAlgorithm::Afforest)
        }
    }

    fn with_algorithm(algorithm: ConnectedComponentsAlgorithm) -> Self {
        ConnectedComponentsPlan {
            algorithm,
            edge_tile_size: Self::DEFAULT_EDGE_TILE_SIZE,
            neighbor_sample_size: Self::DEFAULT_NEIGHBOR_SAMPLE_SIZE,
            component_sample_frequency: Self::DEFAULT_COMPONENT_SAMPLE_FREQUENCY,
        }
    }

    pub fn algorithm(&self) -> ConnectedComponentsAlgorithm {
        self.algorithm
    }

    pub fn edge_tile_size(&self) -> usize {
        self.edge_tile_size
    }

    pub fn neighbor_sample_size(&self) -> u32 {
        self.neighbor_sample_size
    }

    pub fn component_sample_frequency(&self) -> u32 {
        self.component_sample_frequency
    }
}

impl Default for ConnectedComponentsPlan {
    fn default() -> Self {
        Self::afforest(
            Self::DEFAULT_NEIGHBOR_SAMPLE_SIZE,
            Self::DEFAULT_COMPONENT_SAMPLE_FREQUENCY,
        )
    }
}

/// Compute connected components of a symmetric view. Returns one label per
/// node; labels are equal iff the nodes share a component.
pub fn connected_components<V: View>(
    rt: &Runtime,
    view: &V,
    plan: &ConnectedComponentsPlan,
) -> Result<Vec<u64>> {
    let num_nodes = view.num_nodes() as usize;
    if num_nodes == 0 {
        return Ok(Vec::new());
    }

    match plan.algorithm {
        ConnectedComponentsAlgorithm::Serial => Ok(serial(view, num_nodes)),
        ConnectedComponentsAlgorithm::LabelProp => Ok(label_prop(rt, view, num_nodes)),
        ConnectedComponentsAlgorithm::Synchronous => Ok(synchronous(rt, view, num_nodes)),
        ConnectedComponentsAlgorithm::Asynchronous => Ok(asynchronous(rt, view, num_nodes)),
        ConnectedComponentsAlgorithm::EdgeTiledAsynchronous => {
            Ok(edge_tiled_asynchronous(rt, view, num_nodes, plan.edge_tile_size))
        }
        ConnectedComponentsAlgorithm::Afforest => Ok(afforest(rt, view, num_nodes, plan)),
    }
}

fn compress_all_labels(rt: &Runtime, uf: &UnionFind) -> Vec<u64> {
    let labels: Vec<AtomicU64> = (0..uf.len()).map(|_| AtomicU64::new(0)).collect();
    rt.do_all(0..uf.len(), |n| {
        let root = uf.find_and_compress(n as Node);
        labels[n].store(root as u64, Ordering::Relaxed);
    });
    labels.into_iter().map(|l| l.into_inner()).collect()
}

fn serial<V: View>(view: &V, num_nodes: usize) -> Vec<u64> {
    let uf = UnionFind::new(num_nodes);
    for src in view.nodes() {
        for e in view.out_edges(src) {
            uf.merge(src, view.out_edge_dst(e));
        }
    }
    (0..num_nodes)
        .map(|n| uf.find_and_compress(n as Node) as u64)
        .collect()
}

fn label_prop<V: View>(rt: &Runtime, view: &V, num_nodes: usize) -> Vec<u64> {
    let labels: Vec<AtomicU64> = (0..num_nodes as u64).map(AtomicU64::new).collect();
    let old_labels: Vec<AtomicU64> = (0..num_nodes).map(|_| AtomicU64::new(u64::MAX)).collect();

    let changed = ReduceLogicalOr::new();
    loop {
        changed.reset();
        rt.do_all(0..num_nodes, |src| {
            let current = labels[src].load(Ordering::Relaxed);
            if current < old_labels[src].load(Ordering::Relaxed) {
                old_labels[src].store(current, Ordering::Relaxed);
                changed.update(true);
                for e in view.out_edges(src as Node) {
                    let dst = view.out_edge_dst(e) as usize;
                    atomic_min_u64(&labels[dst], current);
                }
            }
        });
        if !changed.reduce() {
            break;
        }
    }

    labels.into_iter().map(|l| l.into_inner()).collect()
}

struct WorkEdge {
    src: Node,
    /// Node whose union-find entry to merge with; a (possibly stale)
    /// component of some destination.
    dst_comp: Node,
    /// Position inside `src`'s edge range where the scan stopped.
    count: usize,
}

fn synchronous<V: View>(rt: &Runtime, view: &V, num_nodes: usize) -> Vec<u64> {
    let uf = UnionFind::new(num_nodes);
    let empty_merges = Accumulator::new();
    let mut rounds = 0usize;

    let seed_bag = InsertBag::new(rt);
    rt.do_all(0..num_nodes, |src| {
        let src = src as Node;
        for e in view.out_edges(src) {
            let dst = view.out_edge_dst(e);
            if src >= dst {
                continue;
            }
            seed_bag.push(WorkEdge {
                src,
                dst_comp: dst,
                count: 0,
            });
            break;
        }
    });

    let mut current = seed_bag.take_all();
    while !current.is_empty() {
        // Merge phase: hook each queued pair.
        rt.install(|| {
            use rayon::prelude::*;
            current.par_iter().for_each(|work| {
                if !uf.merge(work.src, work.dst_comp) {
                    empty_merges.add(1);
                }
            })
        });

        // Find phase: locate the next cross-component edge of each source.
        // The next round's worklist is kept separate so merges never chase
        // edges a concurrent find is still exploring.
        let next_bag = InsertBag::new(rt);
        rt.install(|| {
            use rayon::prelude::*;
            current.par_iter().for_each(|work| {
                let src = work.src;
                let src_comp = uf.find_and_compress(src);
                let range = view.out_edges(src);
                let mut count = work.count + 1;
                let mut e = range.start + count as Edge;
                while e < range.end {
                    let dst = view.out_edge_dst(e);
                    if src < dst {
                        let dst_comp = uf.find_and_compress(dst);
                        if src_comp != dst_comp {
                            next_bag.push(WorkEdge {
                                src,
                                dst_comp,
                                count,
                            });
                            break;
                        }
                    }
                    e += 1;
                    count += 1;
                }
            })
        });

        current = next_bag.take_all();
        rounds += 1;
    }

    log::debug!(
        "cc synchronous: rounds={rounds} empty_merges={}",
        empty_merges.reduce()
    );
    compress_all_labels(rt, &uf)
}

fn asynchronous<V: View>(rt: &Runtime, view: &V, num_nodes: usize) -> Vec<u64> {
    let uf = UnionFind::new(num_nodes);
    let empty_merges = Accumulator::new();

    rt.do_all(0..num_nodes, |src| {
        let src = src as Node;
        for e in view.out_edges(src) {
            let dst = view.out_edge_dst(e);
            if src >= dst {
                continue;
            }
            if !uf.merge(src, dst) {
                empty_merges.add(1);
            }
        }
    });

    log::debug!("cc asynchronous: empty_merges={}", empty_merges.reduce());
    compress_all_labels(rt, &uf)
}

struct EdgeTile {
    src: Node,
    begin: Edge,
    end: Edge,
}

fn edge_tiled_asynchronous<V: View>(
    rt: &Runtime,
    view: &V,
    num_nodes: usize,
    edge_tile_size: usize,
) -> Vec<u64> {
    let uf = UnionFind::new(num_nodes);
    let empty_merges = Accumulator::new();
    let tile = edge_tile_size.max(1) as Edge;

    let tiles = InsertBag::new(rt);
    rt.do_all(0..num_nodes, |src| {
        let src = src as Node;
        let range = view.out_edges(src);
        let mut begin = range.start;
        while begin + tile < range.end {
            tiles.push(EdgeTile {
                src,
                begin,
                end: begin + tile,
            });
            begin += tile;
        }
        if begin < range.end {
            tiles.push(EdgeTile {
                src,
                begin,
                end: range.end,
            });
        }
    });

    let tiles = tiles.take_all();
    rt.install(|| {
        use rayon::prelude::*;
        tiles.par_iter().for_each(|t| {
            for e in t.begin..t.end {
                let dst = view.out_edge_dst(e);
                if t.src >= dst {
                    continue;
                }
                if !uf.merge(t.src, dst) {
                    empty_merges.add(1);
                }
            }
        })
    });

    log::debug!(
        "cc edge-tiled asynchronous: tiles={} empty_merges={}",
        tiles.len(),
        empty_merges.reduce()
    );
    compress_all_labels(rt, &uf)
}

/// Mode of the component labels of randomly sampled nodes: the presumed
/// largest intermediate component.
fn approx_largest_component(uf: &UnionFind, num_nodes: usize, sample_frequency: u32) -> Node {
    let mut rng = rand::rng();
    let mut freq: FxHashMap<Node, u32> = FxHashMap::default();
    for _ in 0..sample_frequency {
        let n = rng.random_range(0..num_nodes) as Node;
        *freq.entry(uf.load(n)).or_insert(0) += 1;
    }
    freq.into_iter()
        .max_by_key(|&(comp, count)| (count, std::cmp::Reverse(comp)))
        .map(|(comp, _)| comp)
        .unwrap_or(0)
}

fn afforest<V: View>(
    rt: &Runtime,
    view: &V,
    num_nodes: usize,
    plan: &ConnectedComponentsPlan,
) -> Vec<u64> {
    let uf = UnionFind::new(num_nodes);

    // Neighbor sampling: round r links every node with its r-th neighbor.
    for r in 0..plan.neighbor_sample_size as usize {
        rt.do_all(0..num_nodes, |src| {
            let src = src as Node;
            let range = view.out_edges(src);
            let e = range.start + r as Edge;
            if e < range.end {
                uf.link(src, view.out_edge_dst(e));
            }
        });
        rt.do_all(0..num_nodes, |src| {
            uf.find_and_compress(src as Node);
        });
    }

    let giant = approx_largest_component(&uf, num_nodes, plan.component_sample_frequency);

    // Residual linking: nodes outside the presumed giant link their
    // remaining neighbors.
    rt.do_all(0..num_nodes, |src| {
        let src = src as Node;
        if uf.load(src) == giant {
            return;
        }
        let range = view.out_edges(src);
        let mut e = range.start + plan.neighbor_sample_size as Edge;
        while e < range.end {
            uf.link(src, view.out_edge_dst(e));
            e += 1;
        }
    });

    compress_all_labels(rt, &uf)
}

/// Check that every edge's endpoints share a label.
pub fn assert_valid<V: View>(rt: &Runtime, view: &V, labels: &[u64]) -> Result<()> {
    if labels.len() != view.num_nodes() as usize {
        return Err(Error::invalid(format!(
            "label array has {} entries for {} nodes",
            labels.len(),
            view.num_nodes()
        )));
    }
    let bad = ReduceLogicalOr::new();
    rt.do_all(0..labels.len(), |n| {
        let me = labels[n];
        for e in view.out_edges(n as Node) {
            let dst = view.out_edge_dst(e) as usize;
            if labels[dst] != me {
                bad.update(true);
                return;
            }
        }
    });
    if bad.reduce() {
        return Err(Error::assertion(
            "connected components: some edge spans two labels",
        ));
    }
    Ok(())
}

/// Aggregate statistics over a component labeling.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedComponentsStatistics {
    /// Total number of unique components in the graph.
    pub total_components: u64,
    /// Number of components with more than one node.
    pub total_non_trivial_components: u64,
    /// Node count of the largest component.
    pub largest_component_size: u64,
    /// Fraction of nodes in the largest component.
    pub largest_component_ratio: f64,
}

impl ConnectedComponentsStatistics {
    pub fn compute(rt: &Runtime, labels: &[u64]) -> Self {
        use crate::runtime::PerThreadStorage;

        let partial = PerThreadStorage::<FxHashMap<u64, u64>>::new(rt);
        rt.do_all(0..labels.len(), |n| {
            *partial.local().entry(labels[n]).or_insert(0) += 1;
        });

        let mut counts: FxHashMap<u64, u64> = FxHashMap::default();
        for tid in 0..partial.num_slots() {
            for (&label, &count) in partial.remote(tid).iter() {
                *counts.entry(label).or_insert(0) += count;
            }
        }

        let total_components = counts.len() as u64;
        let total_non_trivial_components = counts.values().filter(|&&c| c > 1).count() as u64;
        let largest_component_size = counts.values().copied().max().unwrap_or(0);
        let largest_component_ratio = if labels.is_empty() {
            0.0
        } else {
            largest_component_size as f64 / labels.len() as f64
        };

        ConnectedComponentsStatistics {
            total_components,
            total_non_trivial_components,
            largest_component_size,
            largest_component_ratio,
        }
    }
}

impl std::fmt::Display for ConnectedComponentsStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total components = {}", self.total_components)?;
        writeln!(
            f,
            "Total non-trivial components = {}",
            self.total_non_trivial_components
        )?;
        writeln!(f, "Largest component size = {}", self.largest_component_size)?;
        write!(
            f,
            "Largest component ratio = {:.4}",
            self.largest_component_ratio
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_builds_one_component() {
        let uf = UnionFind::new(5);
        assert!(uf.merge(0, 1));
        assert!(uf.merge(1, 2));
        assert!(!uf.merge(0, 2));
        assert!(uf.merge(3, 4));
        assert_eq!(uf.find_and_compress(2), 0);
        assert_eq!(uf.find_and_compress(4), 3);
        assert_ne!(uf.find(0), uf.find(3));
    }

    #[test]
    fn lower_id_root_wins() {
        let uf = UnionFind::new(4);
        uf.merge(3, 2);
        uf.merge(2, 1);
        uf.merge(1, 0);
        for n in 0..4 {
            assert_eq!(uf.find_and_compress(n), 0);
        }
    }

    #[test]
    fn hook_min_reports_victim() {
        let uf = UnionFind::new(6);
        // Component c = 0 absorbs root 5: victim is 5.
        assert_eq!(uf.hook_min(5, 0, 0), Some(5));
        // Already same component: no victim.
        assert_eq!(uf.hook_min(5, 0, 0), None);
        // Hook into a different component than c: no victim.
        assert_eq!(uf.hook_min(3, 2, 0), None);
    }

    #[test]
    fn concurrent_merges_terminate_and_agree() {
        let rt = Runtime::with_threads(4).unwrap();
        let n = 1000;
        let uf = UnionFind::new(n);
        // Chain the whole range in parallel.
        rt.do_all(0..n - 1, |i| {
            uf.merge(i as Node, (i + 1) as Node);
        });
        let root = uf.find_and_compress(0);
        for i in 0..n {
            assert_eq!(uf.find_and_compress(i as Node), root);
        }
    }
}
