//! BiPart: a multi-level hypergraph partitioner.
//!
//! Pipeline: coarsen a batch of hypergraphs level by level with priority
//! matching, bisect the coarsest graphs toward a balance target, refine with
//! gain-based swaps plus balance restoration while projecting partitions
//! back down, and recurse over the bisections to reach K parts.

pub mod coarsen;
pub mod driver;
pub mod hypergraph;
pub mod partition;
pub mod refine;

pub use coarsen::{MatchingPolicy, MetisGraph};
pub use driver::{compute_edge_cut, create_k_partitions, BipartConfig, BipartResult};
pub use hypergraph::{
    read_hmetis, read_hmetis_file, write_partitions, DegreeSummary, HyperGraph, MetisNode,
};
