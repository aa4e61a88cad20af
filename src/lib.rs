//! Butterfly-Graph: shared-memory parallel graph analytics
//!
//! Core pieces:
//! - Topology layer: immutable CSR topologies (plain, edge-sorted,
//!   edge-type-aware, transposed, fully shuffled) sharing storage where
//!   possible, produced by pure transformations and memoized by a per-graph
//!   view cache
//! - Concurrent dynamic bitset: block-atomic set/reset/test, word-wise set
//!   operations, parallel popcount and offset extraction
//! - Parallel analytics over uniform views: connected components (six
//!   cooperating strategies), BFS, PageRank, k-core
//! - BiPart: a multi-level hypergraph partitioner (batched coarsening,
//!   balanced bisection, two-phase refinement, k-way recursion)
//!
//! All parallelism runs on an explicit [`runtime::Runtime`] handle built
//! once before the first algorithm call.

pub mod analytics;
pub mod bipart;
pub mod bitset;
pub mod error;
pub mod properties;
pub mod runtime;
pub mod topology;

pub use bitset::DynamicBitset;
pub use error::{Error, Result};
pub use runtime::Runtime;
pub use topology::views::PropertyGraph;
pub use topology::{GraphTopology, TopologyBuilder};
