//! K-way driver: recursive bisection over the multi-level pipeline.
//!
//! The whole graph is bisected once, then each level of the recursion
//! extracts the induced subgraph of every partition that still needs
//! splitting (hyperedges spanning partitions stay cut and are dropped from
//! the subgraph), bisects the whole batch at once, and maps the local labels
//! back. The upper half of an odd target count goes to the first side, so a
//! partition with target `t` splits into `(t+1)/2` and `t/2`.

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::bipart::coarsen::{coarsen, MatchingPolicy, MetisGraph};
use crate::bipart::hypergraph::{HyperGraph, INF_PARTITION};
use crate::bipart::partition::partition_coarsest_graphs;
use crate::bipart::refine::refine;
use crate::error::{Error, Result};
use crate::runtime::{Accumulator, Runtime};
use crate::topology::Node;

#[derive(Debug, Clone, Copy)]
pub struct BipartConfig {
    /// Number of partitions to produce.
    pub num_partitions: u32,
    /// Maximum number of coarsening levels per bisection.
    pub max_coarse_graph_size: u32,
    pub matching_policy: MatchingPolicy,
}

impl Default for BipartConfig {
    fn default() -> Self {
        BipartConfig {
            num_partitions: 2,
            max_coarse_graph_size: 25,
            matching_policy: MatchingPolicy::HigherDegree,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BipartResult {
    /// Partition id in `[0, K)` per original (non-hyperedge) node.
    pub partitions: Vec<u32>,
    /// Hyperedges whose members span more than one partition.
    pub edge_cut: u32,
}

/// One bisection pass over a batch: coarsen, split the coarsest graphs,
/// refine back down.
pub fn partition_batch(
    rt: &Runtime,
    graphs: &mut [Option<MetisGraph>],
    max_coarsen_level: u32,
    policy: MatchingPolicy,
    target_partitions: &[u32],
) {
    coarsen(rt, graphs, max_coarsen_level, policy);
    partition_coarsest_graphs(rt, graphs, target_partitions);
    refine(rt, graphs);
}

/// Number of hyperedges whose members do not all share a partition.
pub fn compute_edge_cut(rt: &Runtime, graph: &HyperGraph) -> u32 {
    let cut = Accumulator::new();
    rt.do_all(0..graph.num_hedges() as usize, |h| {
        let mut edges = graph.edges(h as Node);
        let Some(first) = edges.next() else { return };
        let first_partition = graph.node(graph.edge_dst(first)).partition();
        for e in edges {
            if graph.node(graph.edge_dst(e)).partition() != first_partition {
                cut.add(1);
                return;
            }
        }
    });
    cut.reduce() as u32
}

/// Partition a hypergraph into `K` parts by recursive bisection.
pub fn create_k_partitions(
    rt: &Runtime,
    graph: HyperGraph,
    config: &BipartConfig,
) -> Result<BipartResult> {
    let k = config.num_partitions;
    if k < 1 {
        return Err(Error::invalid(format!("num_partitions must be >= 1, got {k}")));
    }

    let num_hedges = graph.num_hedges();
    let num_hnodes = graph.num_hnodes();
    if k == 1 || num_hnodes == 0 {
        let partitions = vec![0u32; num_hnodes as usize];
        return Ok(BipartResult {
            partitions,
            edge_cut: 0,
        });
    }

    // Initial bisection of the whole graph.
    let mut batch = vec![Some(MetisGraph::new(graph))];
    partition_batch(
        rt,
        &mut batch,
        config.max_coarse_graph_size,
        config.matching_policy,
        &[k],
    );
    let graph = batch
        .into_iter()
        .next()
        .unwrap()
        .unwrap()
        .into_finest();

    // Nodes labeled 1 move to the first id of the second half.
    let second_partition = (k + 1) / 2;
    let mut to_process = vec![0u32; k as usize];
    to_process[0] = second_partition;
    to_process[second_partition as usize] = k / 2;

    rt.do_all(num_hedges as usize..graph.total_nodes() as usize, |n| {
        let data = graph.node(n as Node);
        if data.partition() == 1 {
            data.set_partition(second_partition);
        }
    });

    let mut current_level: BTreeSet<u32> = BTreeSet::new();
    current_level.insert(0);
    current_level.insert(second_partition);

    // ceil(log2(k)) recursion levels; the initial bisection was level 0.
    let num_levels = u32::BITS - (k - 1).leading_zeros();
    for _level in 1..num_levels {
        let mut pgraph_index = vec![0u32; k as usize];
        for (idx, &i) in current_level.iter().enumerate() {
            pgraph_index[i as usize] = idx as u32;
        }

        // Members of each partition.
        let mut mem_nodes: Vec<Vec<Node>> = vec![Vec::new(); k as usize];
        let mut mem_hedges: Vec<Vec<Node>> = vec![Vec::new(); k as usize];
        for n in graph.hnodes() {
            let p = graph.node(n).partition() as usize;
            mem_nodes[p].push(n);
            graph.node(n).set_graph_index(pgraph_index[p]);
        }

        // A hyperedge is partitionable only when all its members agree.
        rt.do_all(0..num_hedges as usize, |h| {
            let hedge = h as Node;
            let mut edges = graph.edges(hedge);
            let partition = match edges.next() {
                None => INF_PARTITION,
                Some(first) => {
                    let first_partition = graph.node(graph.edge_dst(first)).partition();
                    if edges.all(|e| graph.node(graph.edge_dst(e)).partition() == first_partition)
                    {
                        first_partition
                    } else {
                        INF_PARTITION
                    }
                }
            };
            graph.node(hedge).set_partition(partition);
        });

        for h in graph.hedges() {
            let p = graph.node(h).partition();
            if p != INF_PARTITION {
                mem_hedges[p as usize].push(h);
                graph.node(h).set_graph_index(pgraph_index[p as usize]);
            }
        }

        // Dense child ids per partition: hyperedges first, then nodes.
        let num_active = current_level.len();
        let mut hedge_counts = vec![0u32; num_active];
        let mut node_counts = vec![0u32; num_active];
        for &i in &current_level {
            let index = pgraph_index[i as usize] as usize;
            let mut id = 0u32;
            for &h in &mem_hedges[i as usize] {
                graph.node(h).set_child_id(id);
                id += 1;
            }
            hedge_counts[index] = id;
            let hedge_count = id;
            for &n in &mem_nodes[i as usize] {
                graph.node(n).set_child_id(id);
                id += 1;
            }
            node_counts[index] = id - hedge_count;
        }

        let slot_active: Vec<bool> = current_level
            .iter()
            .map(|&i| to_process[i as usize] > 1)
            .collect();

        // Extract the induced subgraphs: one adjacency row per kept
        // hyperedge, in child-id space.
        let mut edge_lists: Vec<Vec<Vec<Node>>> = (0..num_active)
            .map(|index| {
                if slot_active[index] {
                    vec![Vec::new(); (hedge_counts[index] + node_counts[index]) as usize]
                } else {
                    Vec::new()
                }
            })
            .collect();

        let rows: Vec<Option<(usize, Node, Vec<Node>)>> = rt.install(|| {
            (0..num_hedges as usize)
                .into_par_iter()
                .map(|h| {
                    let hedge = h as Node;
                    let p = graph.node(hedge).partition();
                    if p == INF_PARTITION {
                        return None;
                    }
                    let index = pgraph_index[p as usize] as usize;
                    if !slot_active[index] {
                        return None;
                    }
                    let slot = graph.node(hedge).child_id();
                    let members: Vec<Node> = graph
                        .edges(hedge)
                        .map(|e| graph.node(graph.edge_dst(e)).child_id())
                        .collect();
                    Some((index, slot, members))
                })
                .collect()
        });
        for (index, slot, members) in rows.into_iter().flatten() {
            edge_lists[index][slot as usize] = members;
        }

        let mut sub_batch: Vec<Option<MetisGraph>> = (0..num_active)
            .map(|index| {
                if !slot_active[index] {
                    return None;
                }
                let sub = HyperGraph::from_adjacency(
                    rt,
                    &edge_lists[index],
                    hedge_counts[index],
                    node_counts[index],
                );
                sub.init_nodes(rt);
                Some(MetisGraph::new(sub))
            })
            .collect();

        let targets: Vec<u32> = current_level
            .iter()
            .map(|&i| to_process[i as usize])
            .collect();

        partition_batch(
            rt,
            &mut sub_batch,
            config.max_coarse_graph_size,
            config.matching_policy,
            &targets,
        );

        // Map local bisection labels back and split the bookkeeping.
        let mut next_level: BTreeSet<u32> = BTreeSet::new();
        for &i in &current_level {
            let t = to_process[i as usize];
            if t <= 1 {
                next_level.insert(i);
                continue;
            }
            let half = (t + 1) / 2;
            to_process[i as usize] = half;
            to_process[(i + half) as usize] = t / 2;
            next_level.insert(i);
            next_level.insert(i + half);

            let index = pgraph_index[i as usize] as usize;
            let sub = sub_batch[index].as_ref().unwrap().finest();
            rt.install(|| {
                mem_nodes[i as usize].par_iter().for_each(|&n| {
                    let child = graph.node(n).child_id();
                    match sub.node(child).partition() {
                        0 => graph.node(n).set_partition(i),
                        1 => graph.node(n).set_partition(i + half),
                        _ => {}
                    }
                })
            });
        }

        current_level = next_level;
    }

    let partitions: Vec<u32> = graph
        .hnodes()
        .map(|n| graph.node(n).partition())
        .collect();
    let edge_cut = compute_edge_cut(rt, &graph);
    log::debug!("bipart: k={k} edge_cut={edge_cut}");

    Ok(BipartResult {
        partitions,
        edge_cut,
    })
}
