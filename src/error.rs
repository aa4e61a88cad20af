//! Error types for the butterfly-graph library.
//!
//! Typed errors (`thiserror`) are used throughout: every externally visible
//! operation returns [`Result`]. Data-parallel loop bodies never fail; their
//! preconditions are checked at the call boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied argument violated an invariant: malformed CSR arrays,
    /// an out-of-range source node, `K < 1`, a bad hypergraph input line.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A requested variant exists in the API surface but is not wired yet
    /// (e.g. node-type-sorted edge ordering).
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A validator post-condition failed. The graph state itself remains
    /// valid; only the checked output is wrong.
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn assertion<S: Into<String>>(msg: S) -> Self {
        Error::AssertionFailed(msg.into())
    }
}
