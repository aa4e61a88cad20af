//! Breadth-first search writing a parent per node.
//!
//! Frontier-synchronous: each round expands the current frontier in
//! parallel; a node joins the next frontier when its parent slot is claimed
//! by CAS, so every reached node gets exactly one parent. The source's
//! parent is itself; unreached nodes keep [`UNREACHED`].

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Error, Result};
use crate::runtime::{Accumulator, InsertBag, Runtime};
use crate::topology::views::{BiDirectionalView, View};
use crate::topology::Node;

/// Parent value of a node BFS never reached.
pub const UNREACHED: Node = u32::MAX;

/// Compute BFS parents from `source`. Returns one parent per node.
pub fn bfs_node_parent<V: View>(rt: &Runtime, view: &V, source: Node) -> Result<Vec<Node>> {
    let num_nodes = view.num_nodes() as usize;
    if source as u64 >= view.num_nodes() {
        return Err(Error::invalid(format!(
            "bfs source {source} out of range [0, {})",
            view.num_nodes()
        )));
    }

    let parents: Vec<AtomicU32> = (0..num_nodes).map(|_| AtomicU32::new(UNREACHED)).collect();
    parents[source as usize].store(source, Ordering::Relaxed);

    let mut frontier = vec![source];
    while !frontier.is_empty() {
        let next = InsertBag::new(rt);
        rt.install(|| {
            use rayon::prelude::*;
            frontier.par_iter().for_each(|&src| {
                for e in view.out_edges(src) {
                    let dst = view.out_edge_dst(e);
                    if parents[dst as usize]
                        .compare_exchange(UNREACHED, src, Ordering::Relaxed, Ordering::Relaxed)
                        .is_ok()
                    {
                        next.push(dst);
                    }
                }
            })
        });
        frontier = next.take_all();
    }

    Ok(parents.into_iter().map(|p| p.into_inner()).collect())
}

/// Recompute levels and check every parent assignment against them: the
/// source is its own parent at level 0, every other reached node's parent is
/// one of its in-neighbors exactly one level up. Unvisited nodes are allowed
/// (with a warning), since the graph may not be connected.
pub fn bfs_assert_valid<V: BiDirectionalView>(
    rt: &Runtime,
    view: &V,
    source: Node,
    parents: &[Node],
) -> Result<()> {
    let num_nodes = view.num_nodes() as usize;
    if parents.len() != num_nodes {
        return Err(Error::invalid(format!(
            "parent array has {} entries for {num_nodes} nodes",
            parents.len()
        )));
    }
    if source as usize >= num_nodes {
        return Err(Error::invalid(format!("bfs source {source} out of range")));
    }

    let levels = compute_levels(rt, view, source);

    if levels[source as usize] != 0 || parents[source as usize] != source {
        return Err(Error::assertion("incorrect state of source"));
    }

    let num_unvisited = Accumulator::new();
    let found_wrong_level = crate::runtime::ReduceLogicalOr::new();
    let found_wrong_parent = crate::runtime::ReduceLogicalOr::new();
    let found_reachable_without_parent = crate::runtime::ReduceLogicalOr::new();

    rt.do_all(0..num_nodes, |u| {
        if u == source as usize {
            return;
        }
        let u_parent = parents[u];
        if u_parent != UNREACHED && levels[u] != u32::MAX {
            let mut parent_found = false;
            for e in view.in_edges(u as Node) {
                let v = view.in_edge_src(e);
                if v == u_parent {
                    parent_found = true;
                    if levels[u] != levels[v as usize].saturating_add(1) {
                        found_wrong_level.update(true);
                    }
                }
            }
            if !parent_found {
                found_wrong_parent.update(true);
            }
        } else if u_parent == UNREACHED && levels[u] != u32::MAX {
            found_reachable_without_parent.update(true);
        } else {
            num_unvisited.add(1);
        }
    });

    if found_wrong_level.reduce() {
        return Err(Error::assertion(
            "found a node or its parent with wrong level",
        ));
    }
    if found_wrong_parent.reduce() {
        return Err(Error::assertion(
            "found a node whose parent is not one of its incoming neighbors",
        ));
    }
    if found_reachable_without_parent.reduce() {
        return Err(Error::assertion(
            "found a reachable node with unassigned parent",
        ));
    }
    let unvisited = num_unvisited.reduce();
    if unvisited > 0 {
        log::warn!("bfs: found {unvisited} unreachable nodes, an error if the graph is connected");
    }
    Ok(())
}

fn compute_levels<V: View>(rt: &Runtime, view: &V, source: Node) -> Vec<u32> {
    let num_nodes = view.num_nodes() as usize;
    let levels: Vec<AtomicU32> = (0..num_nodes).map(|_| AtomicU32::new(u32::MAX)).collect();
    levels[source as usize].store(0, Ordering::Relaxed);

    let mut frontier = vec![source];
    let mut next_level = 0u32;
    while !frontier.is_empty() {
        next_level += 1;
        let next = InsertBag::new(rt);
        rt.install(|| {
            use rayon::prelude::*;
            frontier.par_iter().for_each(|&src| {
                for e in view.out_edges(src) {
                    let dst = view.out_edge_dst(e) as usize;
                    if levels[dst]
                        .compare_exchange(u32::MAX, next_level, Ordering::Relaxed, Ordering::Relaxed)
                        .is_ok()
                    {
                        next.push(dst as Node);
                    }
                }
            })
        });
        frontier = next.take_all();
    }

    levels.into_iter().map(|l| l.into_inner()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BfsStatistics {
    /// Number of nodes the search reached, the source included.
    pub n_reached_nodes: u64,
}

impl BfsStatistics {
    pub fn compute(rt: &Runtime, parents: &[Node]) -> Self {
        let reached = Accumulator::new();
        rt.do_all(0..parents.len(), |n| {
            if parents[n] != UNREACHED {
                reached.add(1);
            }
        });
        BfsStatistics {
            n_reached_nodes: reached.reduce(),
        }
    }
}
