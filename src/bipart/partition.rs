//! Initial partitioning of the coarsest graphs.
//!
//! Every node starts in partition 1; anything touched by a hyperedge flips
//! to 0, biasing the split toward has-neighbors versus isolated. The heavier
//! side then sheds its best gain-per-weight nodes in bounded rounds until
//! the target weight for the upper half of the recursion is reached.

use crate::bipart::coarsen::{construct_combined_lists, CombinedList, MetisGraph};
use crate::bipart::hypergraph::{HyperGraph, Weight};
use crate::bipart::refine::{init_gain_single, sort_nodes_by_gain_and_weight};
use crate::runtime::{Accumulator, InsertBag, Runtime};
use crate::topology::Node;

/// Per-node degree = number of hyperedges containing it (lone hyperedges
/// excluded).
pub(crate) fn compute_degrees(
    rt: &Runtime,
    graphs: &[Option<&HyperGraph>],
    edge_list: &CombinedList,
    node_list: &CombinedList,
) {
    rt.do_all(0..node_list.len(), |n| {
        let (node, i) = node_list[n];
        graphs[i as usize].unwrap().node(node).set_degree(0);
    });

    rt.do_all(0..edge_list.len(), |h| {
        let (hedge, i) = edge_list[h];
        let g = graphs[i as usize].unwrap();
        if g.degree(hedge) <= 1 {
            return;
        }
        for e in g.edges(hedge) {
            g.node(g.edge_dst(e)).add_degree(1);
        }
    });
}

/// Bisect the coarsest graph of every live hierarchy toward the weight
/// target for `target_partitions[i]` parts.
pub fn partition_coarsest_graphs(
    rt: &Runtime,
    graphs: &[Option<MetisGraph>],
    target_partitions: &[u32],
) {
    debug_assert_eq!(graphs.len(), target_partitions.len());
    let coarsest: Vec<Option<&HyperGraph>> =
        graphs.iter().map(|g| g.as_ref().map(|g| g.coarsest())).collect();

    let (edge_list, node_list) = construct_combined_lists(&coarsest);

    let num_slots = coarsest.len();
    let total_weight_acc: Vec<Accumulator> = (0..num_slots).map(|_| Accumulator::new()).collect();
    let zero_weight_acc: Vec<Accumulator> = (0..num_slots).map(|_| Accumulator::new()).collect();
    let zero_bags: Vec<InsertBag<Node>> = (0..num_slots).map(|_| InsertBag::new(rt)).collect();
    let nzero_bags: Vec<InsertBag<Node>> = (0..num_slots).map(|_| InsertBag::new(rt)).collect();

    rt.do_all(0..node_list.len(), |n| {
        let (node, i) = node_list[n];
        let data = coarsest[i as usize].unwrap().node(node);
        total_weight_acc[i as usize].add(data.weight() as u64);
        data.init_refine(1);
    });

    rt.do_all(0..edge_list.len(), |h| {
        let (hedge, i) = edge_list[h];
        let g = coarsest[i as usize].unwrap();
        for e in g.edges(hedge) {
            g.node(g.edge_dst(e)).set_partition(0);
        }
    });

    rt.do_all(0..node_list.len(), |n| {
        let (node, i) = node_list[n];
        let data = coarsest[i as usize].unwrap().node(node);
        if data.partition() == 0 {
            zero_bags[i as usize].push(node);
            zero_weight_acc[i as usize].add(data.weight() as u64);
        } else {
            nzero_bags[i as usize].push(node);
        }
    });

    compute_degrees(rt, &coarsest, &edge_list, &node_list);

    for i in 0..num_slots {
        let Some(g) = coarsest[i] else { continue };
        let k = target_partitions[i];

        let total_weight = total_weight_acc[i].reduce() as Weight;
        let zero_weight = zero_weight_acc[i].reduce() as Weight;
        let one_weight = total_weight - zero_weight;
        // The heavier side is the source of moves.
        let process_zero = zero_weight > one_weight;
        let sqrt_size = (total_weight as f64).sqrt() as u32;
        let curr_partition = if process_zero { 0 } else { 1 };

        let k_upper = (k + 1) / 2;
        let mut target_weight =
            (total_weight as u64 * k_upper as u64 / k as u64) as Weight;
        if process_zero {
            target_weight = total_weight - target_weight;
        }

        let mut node_vec = if process_zero {
            zero_bags[i].take_all()
        } else {
            nzero_bags[i].take_all()
        };
        let mut moved_weight = if process_zero { one_weight } else { zero_weight };

        loop {
            init_gain_single(rt, g);

            // Keep only the nodes still on the source side.
            node_vec.retain(|&n| g.node(n).partition() == curr_partition);
            sort_nodes_by_gain_and_weight(g, &mut node_vec);

            let mut moved_nodes = 0u32;
            for &node in node_vec.iter() {
                let data = g.node(node);
                data.set_partition(1 - curr_partition);
                moved_weight += data.weight();
                // Degree-zero nodes do not count against the move budget.
                if data.degree() >= 1 {
                    moved_nodes += 1;
                }
                if moved_weight >= target_weight {
                    break;
                }
                if moved_nodes > sqrt_size {
                    break;
                }
            }

            if moved_weight >= target_weight {
                break;
            }
        }
    }
}
