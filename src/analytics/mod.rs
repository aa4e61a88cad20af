//! Parallel graph analytics over the view layer.
//!
//! Every algorithm takes the runtime handle, a view exposing the minimum
//! query surface it needs, and a plan describing the variant and its
//! parameters. Outputs are plain per-node vectors; validators check outputs
//! against the graph and return `AssertionFailed` on violation, leaving the
//! graph untouched.

pub mod bfs;
pub mod components;
pub mod kcore;
pub mod pagerank;
