//! Multi-graph batched coarsening for BiPart.
//!
//! All live graphs in the batch coarsen together each level: hyperedges get
//! a deterministic priority (policy value, hashed tiebreak, id tiebreak)
//! propagated to their members by atomic minimum, so every node agrees on
//! which hyperedge may claim it. Claimed nodes contract into a match; the
//! leftovers get a second chance inside otherwise-matched hyperedges, and
//! nodes outside every hyperedge collapse in buckets. A hyperedge survives
//! into the coarser graph only while it still spans two matches.

use rayon::prelude::*;

use crate::bitset::DynamicBitset;
use crate::bipart::hypergraph::{
    HyperGraph, Netnum, Netval, Weight, NETNUM_MAX, NETVAL_MAX, NETVAL_MIN,
};
use crate::runtime::{Accumulator, InsertBag, Runtime};
use crate::topology::Node;

/// How hyperedges are prioritized when competing for nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingPolicy {
    /// Higher priority for high-degree hyperedges.
    HigherDegree,
    /// Higher priority for low-degree hyperedges.
    LowerDegree,
    /// Higher priority for hyperedges with heavy members.
    HigherWeight,
    /// Higher priority for hyperedges with light members.
    LowerWeight,
    /// Priority from a deterministic hash of hyperedge ids.
    Random,
}

/// Hierarchy of coarsening levels; `levels[0]` is the finest (input) graph.
pub struct MetisGraph {
    levels: Vec<HyperGraph>,
}

impl MetisGraph {
    pub fn new(finest: HyperGraph) -> Self {
        MetisGraph {
            levels: vec![finest],
        }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn finest(&self) -> &HyperGraph {
        &self.levels[0]
    }

    pub fn coarsest(&self) -> &HyperGraph {
        self.levels.last().unwrap()
    }

    pub fn level(&self, i: usize) -> &HyperGraph {
        &self.levels[i]
    }

    pub fn into_finest(mut self) -> HyperGraph {
        self.levels.truncate(1);
        self.levels.pop().unwrap()
    }

    pub(crate) fn push_level(&mut self, coarser: HyperGraph) {
        self.levels.push(coarser);
    }
}

// Coarsening stops once a graph is this small.
const COARSEST_HEDGE_LIMIT: u32 = 1000;
const COARSEST_NODE_LIMIT: u32 = 300;
// Lone nodes collapse in buckets of their id modulo this factor.
const LONE_NODES_COARSEN_FACTOR: u32 = 1000;

pub(crate) const BALANCE_RATIO: f64 = 52.5 / 47.5;

/// `(hyperedge-or-node id, batch slot)` pairs concatenated over every live
/// graph in the batch.
pub(crate) type CombinedList = Vec<(Node, u32)>;

pub(crate) fn construct_combined_lists(
    graphs: &[Option<&HyperGraph>],
) -> (CombinedList, CombinedList) {
    let mut edge_list = Vec::new();
    let mut node_list = Vec::new();
    for (i, graph) in graphs.iter().enumerate() {
        if let Some(g) = graph {
            for h in g.hedges() {
                edge_list.push((h, i as u32));
            }
            for n in g.hnodes() {
                node_list.push((n, i as u32));
            }
        }
    }
    (edge_list, node_list)
}

fn hash_netnum(val: Netnum) -> Netval {
    let seed = val as i64 * 1103515245 + 12345;
    (seed / 65536) % 32768
}

fn assign_priority(g: &HyperGraph, hedge: Node, policy: MatchingPolicy) {
    let data = g.node(hedge);
    match policy {
        MatchingPolicy::HigherDegree => data.set_netval(-(g.degree(hedge) as Netval)),
        MatchingPolicy::LowerDegree => data.set_netval(g.degree(hedge) as Netval),
        MatchingPolicy::HigherWeight => {
            let mut w: Netval = 0;
            for e in g.edges(hedge) {
                w += g.node(g.edge_dst(e)).weight() as Netval;
            }
            data.set_netval(-w);
        }
        MatchingPolicy::LowerWeight => {
            let mut w: Netval = 0;
            for e in g.edges(hedge) {
                w += g.node(g.edge_dst(e)).weight() as Netval;
            }
            data.set_netval(w);
        }
        MatchingPolicy::Random => {
            data.set_netval(-data.netrand());
            data.set_netrand(-(data.netnum() as Netval));
        }
    }
}

/// Deterministic priority assignment: hash tiebreak, policy value, then
/// three min-propagation passes so every node agrees on its best hyperedge.
fn parallel_prio_rand(
    rt: &Runtime,
    fine: &[Option<&HyperGraph>],
    edge_list: &CombinedList,
    policy: MatchingPolicy,
) {
    rt.do_all(0..edge_list.len(), |h| {
        let (hedge, i) = edge_list[h];
        let g = fine[i as usize].unwrap();
        let data = g.node(hedge);
        data.set_netrand(hash_netnum(data.netnum()));
    });

    rt.do_all(0..edge_list.len(), |h| {
        let (hedge, i) = edge_list[h];
        let g = fine[i as usize].unwrap();
        assign_priority(g, hedge, policy);
        let netval = g.node(hedge).netval();
        for e in g.edges(hedge) {
            g.node(g.edge_dst(e)).atomic_min_netval(netval);
        }
    });

    rt.do_all(0..edge_list.len(), |h| {
        let (hedge, i) = edge_list[h];
        let g = fine[i as usize].unwrap();
        let hedge_data = g.node(hedge);
        for e in g.edges(hedge) {
            let dst = g.node(g.edge_dst(e));
            if dst.netval() == hedge_data.netval() {
                dst.atomic_min_netrand(hedge_data.netrand());
            }
        }
    });

    rt.do_all(0..edge_list.len(), |h| {
        let (hedge, i) = edge_list[h];
        let g = fine[i as usize].unwrap();
        let hedge_data = g.node(hedge);
        for e in g.edges(hedge) {
            let dst = g.node(g.edge_dst(e));
            if dst.netrand() == hedge_data.netrand() {
                dst.atomic_min_netnum(hedge_data.netnum());
            }
        }
    });
}

/// Per-slot scratch for one coarsening level.
struct LevelState {
    /// Representatives of formed matches.
    match_reps: Vec<DynamicBitset>,
    /// Hyperedges that survive into the coarser graph.
    surviving_hedges: Vec<DynamicBitset>,
    /// Total weight of each match, dense over fine member nodes.
    match_weight: Vec<Vec<Weight>>,
}

/// Multi-node matching: each hyperedge tries to claim its members whose
/// propagated priority equals its own, bounded by the per-slot weight limit.
/// The minimum claimed node id becomes the representative.
fn parallel_hmatch_and_create_nodes(
    rt: &Runtime,
    fine: &[Option<&HyperGraph>],
    edge_list: &CombinedList,
    state: &mut LevelState,
    limit_weights: &[Weight],
    policy: MatchingPolicy,
) {
    parallel_prio_rand(rt, fine, edge_list, policy);

    let rep_bag: InsertBag<(u32, Node, Weight)> = InsertBag::new(rt);
    let hedge_bag: InsertBag<(u32, Node)> = InsertBag::new(rt);

    rt.do_all(0..edge_list.len(), |h| {
        let (hedge, i) = edge_list[h];
        let g = fine[i as usize].unwrap();
        let hedge_data = g.node(hedge);

        let mut members: Vec<Node> = Vec::new();
        let mut rep = Node::MAX;
        let mut outside_match = false;
        let mut total_weight: Weight = 0;

        for e in g.edges(hedge) {
            let dst = g.edge_dst(e);
            let dst_data = g.node(dst);
            if dst_data.is_matched() {
                outside_match = true;
                continue;
            }
            if dst_data.netnum() == hedge_data.netnum() {
                let w = dst_data.weight();
                if total_weight + w > limit_weights[i as usize] {
                    break;
                }
                members.push(dst);
                total_weight += w;
                rep = rep.min(dst);
            } else {
                outside_match = true;
            }
        }

        if members.is_empty() {
            return;
        }
        // A single claimed node inside an otherwise-taken hyperedge is left
        // for the second-chance pass.
        if outside_match && members.len() == 1 {
            return;
        }

        hedge_data.set_matched();
        if outside_match {
            // Some members belong to other matches: the hyperedge stays a
            // separate coarse node.
            hedge_bag.push((i, hedge));
        }
        let mut match_weight: Weight = 0;
        for &member in &members {
            let member_data = g.node(member);
            match_weight += member_data.weight();
            member_data.set_matched();
            member_data.set_parent(rep);
            member_data.set_netnum(hedge_data.netnum());
        }
        rep_bag.push((i, rep, match_weight));
    });

    for (i, rep, weight) in rep_bag.take_all() {
        let g = fine[i as usize].unwrap();
        state.match_reps[i as usize].set(rep as usize);
        state.match_weight[i as usize][(rep - g.num_hedges()) as usize] = weight;
    }
    for (i, hedge) in hedge_bag.take_all() {
        state.surviving_hedges[i as usize].set(hedge as usize);
    }
}

/// Second-chance coarsening: unmatched nodes inside otherwise-matched
/// hyperedges are absorbed into the lightest matched member's match.
fn more_coarse(
    rt: &Runtime,
    fine: &[Option<&HyperGraph>],
    edge_list: &CombinedList,
    state: &mut LevelState,
) {
    // Tag matched members of still-unmatched hyperedges.
    rt.do_all(0..edge_list.len(), |h| {
        let (hedge, i) = edge_list[h];
        let g = fine[i as usize].unwrap();
        if g.node(hedge).is_matched() {
            return;
        }
        for e in g.edges(hedge) {
            let dst = g.node(g.edge_dst(e));
            if dst.is_matched() {
                dst.set_netval(NETVAL_MIN);
            }
        }
    });

    let absorbed_bag: InsertBag<(u32, Node)> = InsertBag::new(rt);

    rt.do_all(0..edge_list.len(), |h| {
        let (hedge, i) = edge_list[h];
        let g = fine[i as usize].unwrap();
        let hedge_data = g.node(hedge);
        if hedge_data.is_matched() {
            return;
        }

        let mut best_weight = Weight::MAX;
        let mut best_node: Node = 0;
        let mut candidates: Vec<Node> = Vec::new();

        for e in g.edges(hedge) {
            let member = g.edge_dst(e);
            let member_data = g.node(member);
            if member_data.is_matched() {
                if member_data.netval() == NETVAL_MIN {
                    let w = member_data.weight();
                    if w < best_weight {
                        best_weight = w;
                        best_node = member;
                    } else if w == best_weight && member < best_node {
                        best_node = member;
                    }
                }
            } else if member_data.netnum() == hedge_data.netnum() {
                candidates.push(member);
            }
        }

        if !candidates.is_empty() && best_weight < Weight::MAX {
            let best_data = g.node(best_node);
            let parent = best_data.parent();
            let netnum = best_data.netnum();
            for node in candidates {
                let node_data = g.node(node);
                node_data.set_matched();
                node_data.set_parent(parent);
                node_data.set_netnum(netnum);
                absorbed_bag.push((i, node));
            }
        }
    });

    for (i, node) in absorbed_bag.take_all() {
        let g = fine[i as usize].unwrap();
        let parent = g.node(node).parent();
        state.match_weight[i as usize][(parent - g.num_hedges()) as usize] +=
            g.node(node).weight();
    }
}

/// After absorption, decide which still-unmatched hyperedges survive: a
/// hyperedge dies only when all its members are matched and share one
/// parent.
fn coarse_unmatched_nodes(
    rt: &Runtime,
    fine: &[Option<&HyperGraph>],
    edge_list: &CombinedList,
    state: &mut LevelState,
) {
    more_coarse(rt, fine, edge_list, state);

    let hedge_bag: InsertBag<(u32, Node)> = InsertBag::new(rt);
    rt.do_all(0..edge_list.len(), |h| {
        let (hedge, i) = edge_list[h];
        let g = fine[i as usize].unwrap();
        if g.node(hedge).is_matched() {
            return;
        }

        let mut expected_parent: Node = 0;
        let mut count = 0usize;
        for e in g.edges(hedge) {
            let member_data = g.node(g.edge_dst(e));
            if member_data.is_matched() {
                let parent = member_data.parent();
                if count == 0 {
                    expected_parent = parent;
                    count += 1;
                } else if expected_parent != parent {
                    count += 1;
                    break;
                }
            } else {
                count = 0;
                break;
            }
        }
        if count != 1 {
            hedge_bag.push((i, hedge));
        }
    });

    for (i, hedge) in hedge_bag.take_all() {
        state.surviving_hedges[i as usize].set(hedge as usize);
    }
}

/// Flag nodes that appear in at least one hyperedge.
fn find_lone_nodes(
    rt: &Runtime,
    fine: &[Option<&HyperGraph>],
    edge_list: &CombinedList,
    node_list: &CombinedList,
) {
    rt.do_all(0..node_list.len(), |n| {
        let (node, i) = node_list[n];
        fine[i as usize].unwrap().node(node).unset_not_alone();
    });
    rt.do_all(0..edge_list.len(), |h| {
        let (hedge, i) = edge_list[h];
        let g = fine[i as usize].unwrap();
        for e in g.edges(hedge) {
            g.node(g.edge_dst(e)).set_not_alone();
        }
    });
}

/// Build the coarse graphs: dense ids for matches then surviving
/// hyperedges, deduplicated member lists, carried weights and netnums.
fn parallel_create_edges(
    rt: &Runtime,
    fine: &[Option<&HyperGraph>],
    edge_list: &CombinedList,
    node_list: &CombinedList,
    state: &mut LevelState,
) -> Vec<Option<HyperGraph>> {
    let num_slots = fine.len();

    // Count surviving hyperedges per slot.
    let wip_counters: Vec<Accumulator> = (0..num_slots).map(|_| Accumulator::new()).collect();
    {
        let surviving = &state.surviving_hedges;
        rt.do_all(0..edge_list.len(), |h| {
            let (hedge, i) = edge_list[h];
            if surviving[i as usize].test(hedge as usize) {
                wip_counters[i as usize].add(1);
            }
        });
    }

    find_lone_nodes(rt, fine, edge_list, node_list);

    // Unmatched nodes that touch some hyperedge become their own match;
    // nodes outside every hyperedge are postponed for bucketing.
    let own_match_bag: InsertBag<(u32, Node)> = InsertBag::new(rt);
    let postponed_bag: InsertBag<(u32, Node)> = InsertBag::new(rt);
    rt.do_all(0..node_list.len(), |n| {
        let (node, i) = node_list[n];
        let g = fine[i as usize].unwrap();
        let node_data = g.node(node);
        if !node_data.is_matched() && node_data.is_not_alone() {
            node_data.set_matched();
            node_data.set_parent(node);
            node_data.set_netnum(NETNUM_MAX);
            own_match_bag.push((i, node));
        } else if !node_data.is_matched() && !node_data.is_not_alone() {
            postponed_bag.push((i, node));
        }
    });

    for (i, node) in own_match_bag.take_all() {
        let g = fine[i as usize].unwrap();
        state.match_reps[i as usize].set(node as usize);
        state.match_weight[i as usize][(node - g.num_hedges()) as usize] =
            g.node(node).weight();
    }

    // Lone nodes collapse by id bucket.
    let mut postponed_per_slot: Vec<Vec<Node>> = vec![Vec::new(); num_slots];
    for (i, node) in postponed_bag.take_all() {
        postponed_per_slot[i as usize].push(node);
    }
    for (i, postponed) in postponed_per_slot.iter().enumerate() {
        if postponed.is_empty() {
            continue;
        }
        let g = fine[i].unwrap();
        let mut reps = vec![Node::MAX; LONE_NODES_COARSEN_FACTOR as usize];
        let mut bucket_used = DynamicBitset::with_size(LONE_NODES_COARSEN_FACTOR as usize);
        for &n in postponed {
            let bucket = (n % LONE_NODES_COARSEN_FACTOR) as usize;
            bucket_used.set(bucket);
            if reps[bucket] > n {
                reps[bucket] = n;
            }
        }
        for bucket in 0..LONE_NODES_COARSEN_FACTOR as usize {
            if bucket_used.test(bucket) {
                state.match_reps[i].set(reps[bucket] as usize);
            }
        }
        for &n in postponed {
            let rep = reps[(n % LONE_NODES_COARSEN_FACTOR) as usize];
            let node_data = g.node(n);
            node_data.set_matched();
            node_data.set_parent(rep);
            node_data.set_netnum(NETNUM_MAX);
            state.match_weight[i][(rep - g.num_hedges()) as usize] += node_data.weight();
        }
    }

    // Dense coarse ids: surviving hyperedges take [0, hnum), matches take
    // [hnum, hnum + num_matches) in ascending fine-id order.
    let mut hnum = vec![0u32; num_slots];
    let mut num_matches = vec![0u32; num_slots];
    let mut idmap: Vec<Vec<Node>> = vec![Vec::new(); num_slots];
    let mut new_weight: Vec<Vec<Weight>> = vec![Vec::new(); num_slots];
    for i in 0..num_slots {
        let Some(g) = fine[i] else { continue };
        hnum[i] = wip_counters[i].reduce() as u32;
        num_matches[i] = state.match_reps[i].serial_count() as u32;
        idmap[i] = vec![0; g.num_hnodes() as usize];
        new_weight[i] = vec![0; num_matches[i] as usize];
    }

    for i in 0..num_slots {
        let Some(g) = fine[i] else { continue };
        let mut current_id = hnum[i];
        for n in g.hnodes() {
            if state.match_reps[i].test(n as usize) {
                idmap[i][(n - g.num_hedges()) as usize] = current_id;
                new_weight[i][(current_id - hnum[i]) as usize] =
                    state.match_weight[i][(n - g.num_hedges()) as usize];
                current_id += 1;
            }
        }
        debug_assert_eq!(current_id, hnum[i] + num_matches[i]);
    }

    // Point every fine node at its coarse id.
    {
        let idmap = &idmap;
        rt.do_all(0..node_list.len(), |n| {
            let (node, i) = node_list[n];
            let g = fine[i as usize].unwrap();
            let node_data = g.node(node);
            let parent = node_data.parent();
            node_data.set_parent(idmap[i as usize][(parent - g.num_hedges()) as usize]);
        });
    }

    // Surviving hyperedges get their coarse id and carry their netnum over.
    let mut old_netnum: Vec<Vec<Netnum>> = vec![Vec::new(); num_slots];
    for i in 0..num_slots {
        let Some(g) = fine[i] else { continue };
        old_netnum[i] = vec![0; hnum[i] as usize];
        let mut h_id: Node = 0;
        for h in g.hedges() {
            if state.surviving_hedges[i].test(h as usize) {
                old_netnum[i][h_id as usize] = g.node(h).netnum();
                g.node(h).set_node_id(h_id);
                h_id += 1;
            }
        }
        debug_assert_eq!(h_id, hnum[i]);
    }

    // Collect each surviving hyperedge's distinct member matches.
    let surviving = &state.surviving_hedges;
    let coarse_rows: Vec<Option<(u32, Node, Vec<Node>)>> = rt.install(|| {
        edge_list
            .par_iter()
            .map(|&(hedge, i)| {
                let g = fine[i as usize].unwrap();
                if !surviving[i as usize].test(hedge as usize) {
                    return None;
                }
                let id = g.node(hedge).node_id();
                let mut members: Vec<Node> = Vec::new();
                for e in g.edges(hedge) {
                    let pid = g.node(g.edge_dst(e)).parent();
                    if !members.contains(&pid) {
                        members.push(pid);
                    }
                }
                Some((i, id, members))
            })
            .collect()
    });

    let mut edge_lists_per_slot: Vec<Vec<Vec<Node>>> = (0..num_slots)
        .map(|i| {
            if fine[i].is_some() {
                vec![Vec::new(); (hnum[i] + num_matches[i]) as usize]
            } else {
                Vec::new()
            }
        })
        .collect();
    for row in coarse_rows.into_iter().flatten() {
        let (i, id, members) = row;
        edge_lists_per_slot[i as usize][id as usize] = members;
    }

    // Assemble the coarse CSRs and seed their node metadata.
    let mut coarse: Vec<Option<HyperGraph>> = Vec::with_capacity(num_slots);
    for i in 0..num_slots {
        if fine[i].is_none() {
            coarse.push(None);
            continue;
        }
        let graph =
            HyperGraph::from_adjacency(rt, &edge_lists_per_slot[i], hnum[i], num_matches[i]);
        let hedge_count = hnum[i];
        {
            let old_netnum = &old_netnum[i];
            let new_weight = &new_weight[i];
            rt.do_all(0..graph.total_nodes() as usize, |n| {
                let node_data = graph.node(n as Node);
                node_data.set_netval(NETVAL_MAX);
                if (n as u32) < hedge_count {
                    node_data.set_netnum(old_netnum[n]);
                    node_data.set_node_id(n as Node);
                } else {
                    node_data.set_netnum(NETNUM_MAX);
                    node_data.set_netrand(NETVAL_MAX);
                    node_data.set_node_id(n as Node);
                    node_data.set_weight(new_weight[n - hedge_count as usize]);
                }
            });
        }
        coarse.push(Some(graph));
    }
    coarse
}

/// Run one matching round over the batch and build each live graph's next
/// coarser level.
fn coarsen_once(
    rt: &Runtime,
    fine: &[Option<&HyperGraph>],
    policy: MatchingPolicy,
    limit_weights: &[Weight],
) -> Vec<Option<HyperGraph>> {
    let (edge_list, node_list) = construct_combined_lists(fine);

    let mut state = LevelState {
        match_reps: fine
            .iter()
            .map(|g| DynamicBitset::with_size(g.map_or(0, |g| g.total_nodes() as usize)))
            .collect(),
        surviving_hedges: fine
            .iter()
            .map(|g| DynamicBitset::with_size(g.map_or(0, |g| g.num_hedges() as usize)))
            .collect(),
        match_weight: fine
            .iter()
            .map(|g| vec![0; g.map_or(0, |g| g.num_hnodes() as usize)])
            .collect(),
    };

    parallel_hmatch_and_create_nodes(rt, fine, &edge_list, &mut state, limit_weights, policy);
    coarse_unmatched_nodes(rt, fine, &edge_list, &mut state);
    parallel_create_edges(rt, fine, &edge_list, &node_list, &mut state)
}

/// Coarsen every live graph in the batch until it is small enough, stops
/// shrinking, or the level budget runs out.
pub fn coarsen(
    rt: &Runtime,
    graphs: &mut [Option<MetisGraph>],
    max_coarsen_level: u32,
    policy: MatchingPolicy,
) {
    let num_slots = graphs.len();
    let mut done = DynamicBitset::with_size(num_slots);
    let mut prev_nodes = vec![0u32; num_slots];
    let mut cur_nodes = vec![0u32; num_slots];

    for (i, g) in graphs.iter().enumerate() {
        if let Some(g) = g {
            cur_nodes[i] = g.coarsest().num_hnodes();
            prev_nodes[i] = cur_nodes[i];
        } else {
            done.set(i);
        }
    }

    // Per-slot match weight cap, fixed from the initial node counts.
    let tol = BALANCE_RATIO - 1.0;
    let limit_weights: Vec<Weight> = (0..num_slots)
        .map(|i| {
            let hi = ((1.0 + tol) * cur_nodes[i] as f64 / (2.0 + tol)) as Weight;
            hi / 4
        })
        .collect();

    let mut iter_num = 0u32;
    loop {
        if iter_num > max_coarsen_level {
            break;
        }
        if iter_num > 2 {
            for i in 0..num_slots {
                if !done.test(i) && cur_nodes[i] >= prev_nodes[i] {
                    done.set(i);
                }
            }
        }
        if (0..num_slots).all(|i| done.test(i)) {
            break;
        }
        for i in 0..num_slots {
            if !done.test(i) {
                prev_nodes[i] = graphs[i].as_ref().unwrap().coarsest().num_hnodes();
            }
        }

        let fine: Vec<Option<&HyperGraph>> = graphs
            .iter()
            .enumerate()
            .map(|(i, g)| {
                if done.test(i) {
                    None
                } else {
                    g.as_ref().map(|g| g.coarsest())
                }
            })
            .collect();

        let coarse = coarsen_once(rt, &fine, policy, &limit_weights);
        drop(fine);

        for (i, coarser) in coarse.into_iter().enumerate() {
            let Some(coarser) = coarser else { continue };
            cur_nodes[i] = coarser.num_hnodes();
            let num_hedges = coarser.num_hedges();
            graphs[i].as_mut().unwrap().push_level(coarser);
            if num_hedges < COARSEST_HEDGE_LIMIT || cur_nodes[i] < COARSEST_NODE_LIMIT {
                done.set(i);
            }
        }

        iter_num += 1;
    }

    for (i, g) in graphs.iter().enumerate() {
        if let Some(g) = g {
            log::debug!(
                "coarsen slot {i}: {} levels, coarsest {} hedges / {} nodes",
                g.num_levels(),
                g.coarsest().num_hedges(),
                g.coarsest().num_hnodes()
            );
        }
    }
}
