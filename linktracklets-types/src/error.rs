//! The error taxonomy shared by every linker crate.

use thiserror::Error;

/// Errors raised while loading input, validating configuration, or running
/// the linker. `Timeout` is deliberately not fatal: the driver logs it and
/// continues with remaining endpoint pairs.
#[derive(Debug, Error)]
pub enum LinkError {
    /// A malformed input line, a duplicate detection id, a negative error
    /// threshold, or `maxLeafSize == 0`.
    #[error("bad input: {0}")]
    BadInput(String),

    /// Contradictory configuration, e.g. `latestFirstEndpointTime >
    /// earliestLastEndpointTime`, or a negative acceleration bound.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A projection shrank a range, a recursion reached a leaf when it
    /// should not have, or a cache violated monotonicity. Always a bug.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

pub type LinkResult<T> = Result<T, LinkError>;
