//! PageRank, pull-topological variant.
//!
//! Each round recomputes every node's rank from its in-neighbors' current
//! ranks (read-only over the previous vector, so the round is trivially
//! data-parallel), accumulating the total residual; iteration stops when the
//! residual drops below the tolerance or the round budget runs out.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::runtime::Runtime;
use crate::topology::views::{BiDirectionalView, View};
use crate::topology::Node;

#[derive(Debug, Clone, Copy)]
pub struct PagerankPlan {
    tolerance: f32,
    max_iterations: u32,
    alpha: f32,
}

impl PagerankPlan {
    pub const DEFAULT_TOLERANCE: f32 = 1.0e-3;
    pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;
    pub const DEFAULT_ALPHA: f32 = 0.85;

    pub fn pull_topological(tolerance: f32, max_iterations: u32, alpha: f32) -> Self {
        PagerankPlan {
            tolerance,
            max_iterations,
            alpha,
        }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl Default for PagerankPlan {
    fn default() -> Self {
        Self::pull_topological(
            Self::DEFAULT_TOLERANCE,
            Self::DEFAULT_MAX_ITERATIONS,
            Self::DEFAULT_ALPHA,
        )
    }
}

/// Compute PageRank over a bidirectional view. Returns one score per node
/// (unnormalized, fixed point of `(1 - alpha) + alpha * pulled`).
pub fn pagerank<V: BiDirectionalView>(rt: &Runtime, view: &V, plan: &PagerankPlan) -> Result<Vec<f32>> {
    let num_nodes = view.num_nodes() as usize;
    if num_nodes == 0 {
        return Ok(Vec::new());
    }

    let base = 1.0 - plan.alpha;
    let mut ranks = vec![base; num_nodes];
    let mut next = vec![0.0f32; num_nodes];

    for round in 0..plan.max_iterations {
        // f32 residual accumulated as bits of a fixed-point u64 to stay
        // commutative across workers.
        let residual_micros = AtomicU64::new(0);
        {
            let ranks = &ranks;
            let residual = &residual_micros;
            rt.install(|| {
                use rayon::prelude::*;
                next.par_iter_mut().enumerate().for_each(|(v, slot)| {
                    let mut pulled = 0.0f32;
                    for e in view.in_edges(v as Node) {
                        let u = view.in_edge_src(e);
                        let deg = view.out_degree(u);
                        if deg > 0 {
                            pulled += ranks[u as usize] / deg as f32;
                        }
                    }
                    let updated = base + plan.alpha * pulled;
                    let delta = (updated - ranks[v]).abs();
                    residual.fetch_add((delta * 1.0e6) as u64, Ordering::Relaxed);
                    *slot = updated;
                })
            });
        }
        std::mem::swap(&mut ranks, &mut next);

        let residual = residual_micros.load(Ordering::Relaxed) as f32 * 1.0e-6;
        if residual <= plan.tolerance {
            log::debug!("pagerank converged after {} rounds", round + 1);
            break;
        }
    }

    Ok(ranks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::views::PropertyGraph;
    use crate::topology::TopologyBuilder;

    #[test]
    fn ranks_follow_in_degree() {
        let rt = Runtime::with_threads(2).unwrap();
        // Star pointing at node 0: everyone links to 0.
        let mut b = TopologyBuilder::asymmetric();
        b.add_nodes(5);
        for n in 1..5 {
            b.add_edge(n, 0);
        }
        let mut pg = PropertyGraph::new(b.convert_to_csr());
        let view = pg.bidirectional_view(&rt).unwrap();
        let ranks = pagerank(&rt, &view, &PagerankPlan::default()).unwrap();
        for n in 1..5 {
            assert!(ranks[0] > ranks[n], "hub must outrank leaf {n}");
        }
    }

    #[test]
    fn empty_graph_yields_empty_ranks() {
        let rt = Runtime::with_threads(2).unwrap();
        let mut pg = PropertyGraph::new(crate::topology::GraphTopology::default());
        let view = pg.bidirectional_view(&rt).unwrap();
        assert!(pagerank(&rt, &view, &PagerankPlan::default()).unwrap().is_empty());
    }
}
