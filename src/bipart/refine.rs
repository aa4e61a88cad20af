//! Refinement for BiPart: gain computation, pairwise swaps and balance
//! restoration, plus the level loop projecting partitions from coarse to
//! fine.
//!
//! Gain model: for a hyperedge with `p0`/`p1` members on each side, a sole
//! member on its side gains by moving (the cut would close), a member of a
//! one-sided hyperedge loses (a cut would open). Gains are aggregated into
//! per-thread vectors indexed by a per-level `list_index` and reduced once,
//! keeping atomic traffic off the hot gain fields.

use rayon::prelude::*;

use crate::bipart::coarsen::{construct_combined_lists, CombinedList, MetisGraph, BALANCE_RATIO};
use crate::bipart::hypergraph::{Gain, HyperGraph, Weight};
use crate::runtime::{Accumulator, InsertBag, PerThreadStorage, Runtime};
use crate::topology::Node;

const REFINE_MAX_LEVELS: u32 = 2;

/// Recompute gains of one graph. Positive and negative contributions fold
/// into `positive_gain`; `negative_gain` stays zero here.
pub(crate) fn init_gain_single(rt: &Runtime, g: &HyperGraph) {
    let num_hedges = g.num_hedges() as usize;
    let size = g.total_nodes() as usize;
    let num_hnodes = size - num_hedges;

    rt.do_all(num_hedges..size, |n| {
        let node = g.node(n as Node);
        node.set_positive_gain(0);
        node.set_negative_gain(0);
    });

    let local_gains = PerThreadStorage::<Vec<Gain>>::new(rt);
    for tid in 0..local_gains.num_slots() {
        local_gains.remote(tid).resize(num_hnodes, 0);
    }

    rt.do_all(0..num_hedges, |h| {
        let (p0, p1) = side_counts(g, h as Node);
        if (p0 > 1 && p1 > 1) || p0 + p1 <= 1 {
            return;
        }
        let mut local = local_gains.local();
        for e in g.edges(h as Node) {
            let member = g.edge_dst(e);
            let part = g.node(member).partition();
            let on_my_side = if part == 0 { p0 } else { p1 };
            let slot = (member as usize) - num_hedges;
            if on_my_side == 1 {
                local[slot] += 1;
            }
            if on_my_side == p0 + p1 {
                local[slot] -= 1;
            }
        }
    });

    let locals: Vec<Vec<Gain>> = (0..local_gains.num_slots())
        .map(|tid| std::mem::take(&mut *local_gains.remote(tid)))
        .collect();
    rt.do_all(num_hedges..size, |n| {
        let slot = n - num_hedges;
        let gain: Gain = locals.iter().map(|v| v[slot]).sum();
        g.node(n as Node).set_positive_gain(gain);
    });
}

/// Recompute gains across a whole batch through the combined lists. Assigns
/// each node its combined `list_index` and keeps positive and negative
/// contributions separate.
pub(crate) fn init_gain_combined(
    rt: &Runtime,
    edge_list: &CombinedList,
    node_list: &CombinedList,
    graphs: &[Option<&HyperGraph>],
) {
    let total_nodes = node_list.len();

    rt.do_all(0..total_nodes, |n| {
        let (node, i) = node_list[n];
        let data = graphs[i as usize].unwrap().node(node);
        data.set_positive_gain(0);
        data.set_negative_gain(0);
        data.set_list_index(n as u32);
    });

    let local_pos = PerThreadStorage::<Vec<Gain>>::new(rt);
    let local_neg = PerThreadStorage::<Vec<Gain>>::new(rt);
    for tid in 0..local_pos.num_slots() {
        local_pos.remote(tid).resize(total_nodes, 0);
        local_neg.remote(tid).resize(total_nodes, 0);
    }

    rt.do_all(0..edge_list.len(), |h| {
        let (hedge, i) = edge_list[h];
        let g = graphs[i as usize].unwrap();
        let (p0, p1) = side_counts(g, hedge);
        if (p0 > 1 && p1 > 1) || p0 + p1 <= 1 {
            return;
        }
        let mut pos = local_pos.local();
        let mut neg = local_neg.local();
        for e in g.edges(hedge) {
            let member_data = g.node(g.edge_dst(e));
            let part = member_data.partition();
            let on_my_side = if part == 0 { p0 } else { p1 };
            let slot = member_data.list_index() as usize;
            if on_my_side == 1 {
                pos[slot] += 1;
            }
            if on_my_side == p0 + p1 {
                neg[slot] += 1;
            }
        }
    });

    let pos_locals: Vec<Vec<Gain>> = (0..local_pos.num_slots())
        .map(|tid| std::mem::take(&mut *local_pos.remote(tid)))
        .collect();
    let neg_locals: Vec<Vec<Gain>> = (0..local_neg.num_slots())
        .map(|tid| std::mem::take(&mut *local_neg.remote(tid)))
        .collect();
    rt.do_all(0..total_nodes, |n| {
        let (node, i) = node_list[n];
        let data = graphs[i as usize].unwrap().node(node);
        data.set_positive_gain(pos_locals.iter().map(|v| v[n]).sum());
        data.set_negative_gain(neg_locals.iter().map(|v| v[n]).sum());
    });
}

/// Member counts of a hyperedge per partition; stops early once both sides
/// hold more than one member (the hyperedge then contributes no gain).
fn side_counts(g: &HyperGraph, hedge: Node) -> (u32, u32) {
    let mut p0 = 0u32;
    let mut p1 = 0u32;
    for e in g.edges(hedge) {
        if g.node(g.edge_dst(e)).partition() == 0 {
            p0 += 1;
        } else {
            p1 += 1;
        }
        if p0 > 1 && p1 > 1 {
            break;
        }
    }
    (p0, p1)
}

/// Sort a node prefix by gain-per-weight descending, ties by node id.
pub(crate) fn sort_nodes_by_gain_and_weight(g: &HyperGraph, nodes: &mut [Node]) {
    nodes.sort_by(|&l, &r| {
        let l_data = g.node(l);
        let r_data = g.node(r);
        let l_cost = l_data.gain() as f32 / l_data.weight() as f32;
        let r_cost = r_data.gain() as f32 / r_data.weight() as f32;
        if (l_cost - r_cost).abs() < 1.0e-5 {
            l_data.node_id().cmp(&r_data.node_id())
        } else {
            r_cost.partial_cmp(&l_cost).unwrap_or(std::cmp::Ordering::Equal)
        }
    });
}

fn reset_counters(rt: &Runtime, g: &HyperGraph) {
    rt.do_all(g.num_hedges() as usize..g.total_nodes() as usize, |n| {
        g.node(n as Node).reset_counter();
    });
}

/// Pair up the best positive-gain nodes of both sides and swap them,
/// incrementing each moved node's counter to discourage thrash.
pub(crate) fn parallel_swaps(
    rt: &Runtime,
    edge_list: &CombinedList,
    node_list: &CombinedList,
    graphs: &[Option<&HyperGraph>],
    refine_max_levels: u32,
) {
    for _pass in 0..refine_max_levels {
        init_gain_combined(rt, edge_list, node_list, graphs);

        for g in graphs.iter().flatten() {
            let zero_bag: InsertBag<Node> = InsertBag::new(rt);
            let one_bag: InsertBag<Node> = InsertBag::new(rt);

            rt.do_all(g.num_hedges() as usize..g.total_nodes() as usize, |n| {
                let data = g.node(n as Node);
                if data.positive_gain() == 0 && data.negative_gain() == 0 {
                    return;
                }
                if data.gain() < 0 {
                    return;
                }
                if data.partition() == 0 {
                    zero_bag.push(n as Node);
                } else {
                    one_bag.push(n as Node);
                }
            });

            let mut zero_nodes = zero_bag.take_all();
            let mut one_nodes = one_bag.take_all();
            sort_nodes_by_gain_and_weight(g, &mut zero_nodes);
            sort_nodes_by_gain_and_weight(g, &mut one_nodes);

            let num_swaps = zero_nodes.len().min(one_nodes.len());
            let swaps: Vec<Node> = one_nodes[..num_swaps]
                .iter()
                .chain(zero_nodes[..num_swaps].iter())
                .copied()
                .collect();
            rt.install(|| {
                swaps.par_iter().for_each(|&n| {
                    let data = g.node(n);
                    data.set_partition(1 - data.partition());
                    data.inc_counter();
                })
            });
        }
    }

    for g in graphs.iter().flatten() {
        reset_counters(rt, g);
    }
}

fn bucket_of(gain_ratio: f32) -> Option<usize> {
    if gain_ratio >= 1.0 {
        Some(0)
    } else if gain_ratio >= 0.0 {
        let d = (gain_ratio * 10.0) as i32;
        Some((10 - d) as usize)
    } else if gain_ratio > -9.0 {
        let d = (gain_ratio * 10.0 - 1.0) as i32;
        Some((10 - d) as usize)
    } else {
        None
    }
}

/// Move nodes off the overweight side, best gain-per-weight first, until the
/// side weights fit `[lo, hi]`. Candidates are bucketed by gain ratio into
/// 101 buckets over [-9, 1] plus a fallback bucket for anything below.
pub(crate) fn parallel_making_balance(rt: &Runtime, g: &HyperGraph, tol: f64) {
    let num_hedges = g.num_hedges() as usize;
    let size = g.total_nodes() as usize;
    let sqrt_hnodes = (g.num_hnodes() as f64).sqrt() as u32;

    let total_acc = Accumulator::new();
    let one_acc = Accumulator::new();
    rt.do_all(num_hedges..size, |n| {
        let data = g.node(n as Node);
        let w = data.weight() as u64;
        total_acc.add(w);
        if data.partition() > 0 {
            one_acc.add(w);
        }
    });

    let total = total_acc.reduce() as Weight;
    let hi = ((1.0 + tol) * total as f64 / (2.0 + tol)) as Weight;
    let lo = total - hi;
    let mut balance = one_acc.reduce() as Weight;

    loop {
        if balance >= lo && balance <= hi {
            break;
        }

        init_gain_single(rt, g);

        // True: partition 0 is overweight, move nodes into 1.
        let process_zero = balance < lo;
        let source = if process_zero { 0 } else { 1 };

        let bucket_bags: Vec<InsertBag<Node>> = (0..101).map(|_| InsertBag::new(rt)).collect();
        let below_bag: InsertBag<Node> = InsertBag::new(rt);

        rt.do_all(num_hedges..size, |n| {
            let data = g.node(n as Node);
            if data.partition() != source {
                return;
            }
            let ratio = data.gain() as f32 / data.weight() as f32;
            match bucket_of(ratio) {
                Some(idx) => bucket_bags[idx].push(n as Node),
                None => below_bag.push(n as Node),
            }
        });

        let mut buckets: Vec<Vec<Node>> = bucket_bags.iter().map(|b| b.take_all()).collect();
        rt.install(|| {
            buckets.par_iter_mut().for_each(|bucket| {
                if !bucket.is_empty() {
                    sort_nodes_by_gain_and_weight(g, bucket);
                }
            })
        });

        let mut moved = 0u32;
        let mut j = 0usize;
        while j <= 100 {
            if buckets[j].is_empty() {
                j += 1;
                continue;
            }
            for &node in &buckets[j] {
                let data = g.node(node);
                data.set_partition(1 - data.partition());
                if process_zero {
                    balance += data.weight();
                    if balance >= lo {
                        break;
                    }
                } else {
                    balance -= data.weight();
                    if balance <= hi {
                        break;
                    }
                }
                moved += 1;
                if moved > sqrt_hnodes {
                    break;
                }
            }
            if (process_zero && balance >= lo)
                || (!process_zero && balance <= hi)
                || moved > sqrt_hnodes
            {
                break;
            }
            j += 1;
        }

        if (process_zero && balance >= lo) || (!process_zero && balance <= hi) {
            break;
        }

        let mut below_nodes = below_bag.take_all();
        if moved > sqrt_hnodes || below_nodes.is_empty() {
            continue;
        }

        sort_nodes_by_gain_and_weight(g, &mut below_nodes);
        for &node in &below_nodes {
            let data = g.node(node);
            data.set_partition(1 - data.partition());
            if process_zero {
                balance += data.weight();
                if balance >= lo {
                    break;
                }
            } else {
                balance -= data.weight();
                if balance <= hi {
                    break;
                }
            }
            moved += 1;
            if moved > sqrt_hnodes {
                break;
            }
        }

        if (process_zero && balance >= lo) || (!process_zero && balance <= hi) {
            break;
        }
    }
}

/// Copy each fine node's partition down from its match in the coarser
/// graph.
pub(crate) fn project_partition(rt: &Runtime, fine: &HyperGraph, coarse: &HyperGraph) {
    rt.do_all(fine.num_hedges() as usize..fine.total_nodes() as usize, |n| {
        let data = fine.node(n as Node);
        let parent = data.parent();
        data.set_partition(coarse.node(parent).partition());
    });
}

/// Refine every hierarchy in the batch, level-synchronously from coarsest
/// to finest: swap, rebalance, then project partitions one level down.
pub fn refine(rt: &Runtime, graphs: &[Option<MetisGraph>]) {
    let tol = BALANCE_RATIO - 1.0;
    let mut cursor: Vec<isize> = graphs
        .iter()
        .map(|g| g.as_ref().map_or(-1, |g| g.num_levels() as isize - 1))
        .collect();

    loop {
        let current: Vec<Option<&HyperGraph>> = graphs
            .iter()
            .zip(cursor.iter())
            .map(|(g, &c)| {
                if c < 0 {
                    None
                } else {
                    g.as_ref().map(|g| g.level(c as usize))
                }
            })
            .collect();

        if current.iter().all(Option::is_none) {
            break;
        }

        let (edge_list, node_list) = construct_combined_lists(&current);
        parallel_swaps(rt, &edge_list, &node_list, &current, REFINE_MAX_LEVELS);

        for g in current.iter().flatten() {
            parallel_making_balance(rt, g, tol);
        }

        for (i, g) in graphs.iter().enumerate() {
            let Some(g) = g else { continue };
            let c = cursor[i];
            if c > 0 {
                project_partition(rt, g.level(c as usize - 1), g.level(c as usize));
            }
        }

        for c in cursor.iter_mut() {
            if *c >= 0 {
                *c -= 1;
            }
        }
    }
}
