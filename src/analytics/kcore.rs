//! k-core decomposition over a symmetric view.
//!
//! Degree counting, then a cascade of removals: a node whose degree drops
//! below `k` is dead and decrements its neighbors' degrees. The synchronous
//! variant drains one round of dead nodes at a time through paired bags; the
//! asynchronous variant chases the cascade through the worklist scheduler.
//! A node is in the core iff its final degree is at least `k`.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::Result;
use crate::runtime::{Accumulator, InsertBag, Runtime};
use crate::topology::views::View;
use crate::topology::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KCoreAlgorithm {
    Synchronous,
    Asynchronous,
}

#[derive(Debug, Clone, Copy)]
pub struct KCorePlan {
    algorithm: KCoreAlgorithm,
}

impl KCorePlan {
    pub fn synchronous() -> Self {
        KCorePlan {
            algorithm: KCoreAlgorithm::Synchronous,
        }
    }

    pub fn asynchronous() -> Self {
        KCorePlan {
            algorithm: KCoreAlgorithm::Asynchronous,
        }
    }

    pub fn algorithm(&self) -> KCoreAlgorithm {
        self.algorithm
    }
}

impl Default for KCorePlan {
    fn default() -> Self {
        Self::synchronous()
    }
}

/// Mark nodes of the k-core: returns 1 for nodes in the core, 0 otherwise.
pub fn k_core<V: View>(rt: &Runtime, view: &V, k: u32, plan: &KCorePlan) -> Result<Vec<u32>> {
    let num_nodes = view.num_nodes() as usize;
    let degrees: Vec<AtomicU32> = (0..num_nodes).map(|_| AtomicU32::new(0)).collect();

    rt.do_all(0..num_nodes, |n| {
        degrees[n].store(view.out_degree(n as Node) as u32, Ordering::Relaxed);
    });

    match plan.algorithm {
        KCoreAlgorithm::Synchronous => sync_cascade(rt, view, &degrees, k),
        KCoreAlgorithm::Asynchronous => async_cascade(rt, view, &degrees, k),
    }

    let alive: Vec<u32> = degrees
        .into_iter()
        .map(|d| u32::from(d.into_inner() >= k))
        .collect();
    Ok(alive)
}

fn initial_dead<V: View>(rt: &Runtime, view: &V, degrees: &[AtomicU32], k: u32) -> Vec<Node> {
    let bag = InsertBag::new(rt);
    rt.do_all(0..view.num_nodes() as usize, |n| {
        if degrees[n].load(Ordering::Relaxed) < k {
            bag.push(n as Node);
        }
    });
    bag.take_all()
}

fn sync_cascade<V: View>(rt: &Runtime, view: &V, degrees: &[AtomicU32], k: u32) {
    let mut current = initial_dead(rt, view, degrees, k);
    while !current.is_empty() {
        let next = InsertBag::new(rt);
        rt.install(|| {
            use rayon::prelude::*;
            current.par_iter().for_each(|&dead| {
                for e in view.out_edges(dead) {
                    let dst = view.out_edge_dst(e) as usize;
                    let old = degrees[dst].fetch_sub(1, Ordering::Relaxed);
                    // The thread that dropped the neighbor below k owns the
                    // push.
                    if old == k {
                        next.push(dst as Node);
                    }
                }
            })
        });
        current = next.take_all();
    }
}

fn async_cascade<V: View>(rt: &Runtime, view: &V, degrees: &[AtomicU32], k: u32) {
    let initial = initial_dead(rt, view, degrees, k);
    rt.for_each(initial, |dead, ctx| {
        for e in view.out_edges(dead) {
            let dst = view.out_edge_dst(e) as usize;
            let old = degrees[dst].fetch_sub(1, Ordering::Relaxed);
            if old == k {
                ctx.push(dst as Node);
            }
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KCoreStatistics {
    pub nodes_in_core: u64,
}

impl KCoreStatistics {
    pub fn compute(rt: &Runtime, alive: &[u32]) -> Self {
        let count = Accumulator::new();
        rt.do_all(0..alive.len(), |n| {
            if alive[n] != 0 {
                count.add(1);
            }
        });
        KCoreStatistics {
            nodes_in_core: count.reduce(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::views::PropertyGraph;
    use crate::topology::TopologyBuilder;

    /// Triangle 0-1-2 with a pendant node 3 hanging off node 0.
    fn triangle_with_tail() -> PropertyGraph {
        let mut b = TopologyBuilder::symmetric();
        b.add_nodes(4);
        b.add_edge(0, 1);
        b.add_edge(1, 2);
        b.add_edge(2, 0);
        b.add_edge(0, 3);
        PropertyGraph::new(b.convert_to_csr())
    }

    #[test]
    fn two_core_drops_the_tail() {
        let rt = Runtime::with_threads(2).unwrap();
        for plan in [KCorePlan::synchronous(), KCorePlan::asynchronous()] {
            let pg = triangle_with_tail();
            let alive = k_core(&rt, &pg.default_view(), 2, &plan).unwrap();
            assert_eq!(alive, vec![1, 1, 1, 0]);
            assert_eq!(KCoreStatistics::compute(&rt, &alive).nodes_in_core, 3);
        }
    }

    #[test]
    fn one_core_keeps_everything_connected() {
        let rt = Runtime::with_threads(2).unwrap();
        let pg = triangle_with_tail();
        let alive = k_core(&rt, &pg.default_view(), 1, &KCorePlan::default()).unwrap();
        assert_eq!(alive, vec![1, 1, 1, 1]);
    }
}
