//! Error types for model construction and evaluation.

use thiserror::Error;

/// Errors surfaced by the public API.
///
/// Construction-time failures (`InvalidArgument`) mean the node was not added
/// and the graph is unchanged. State-time failures (`DomainViolation`) mean
/// the mutation was rejected before any buffer was written, so the state is
/// exactly as it was before the call.
///
/// Violations of internal invariants (buffer length out of sync with shape,
/// a node propagated before its predecessors) are programming errors and are
/// handled with debug assertions rather than error values.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ModelError {
    /// A node constructor was given incompatible arguments: mismatched
    /// operand shapes, a predecessor without an array output, a missing
    /// reduction init over a possibly-empty operand, and so on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A decision-variable mutation fell outside the variable's declared
    /// domain (out-of-range value, duplicate set element, bad index).
    #[error("domain violation: {0}")]
    DomainViolation(String),
}

impl ModelError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ModelError::InvalidArgument(msg.into())
    }

    pub(crate) fn domain(msg: impl Into<String>) -> Self {
        ModelError::DomainViolation(msg.into())
    }
}
