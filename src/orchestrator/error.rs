// ABOUTME: Error taxonomy for registry validation, oracle calls, and worker invocation.
// ABOUTME: Only validation and unrecovered arbitration errors reach the caller of handle().

use std::time::Duration;

use thiserror::Error;

/// Malformed registration input. Rejected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Worker identity must not be empty")]
    EmptyIdentity,

    #[error("Priority must be non-negative, got {0}")]
    NegativePriority(i32),

    #[error("Capability {dimension} contains a blank term")]
    BlankTerm { dimension: &'static str },
}

/// Failure talking to the decision oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Oracle returned a malformed response: {0}")]
    Malformed(String),
}

/// Stage-2 arbitration could not produce a selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Arbitration failed: {0}")]
pub struct ArbitrationError(#[from] pub OracleError);

/// Query decomposition could not produce sub-queries. Never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Decomposition failed: {0}")]
pub struct DecompositionError(#[from] pub OracleError);

/// A single worker invocation failed. Isolated to that worker's result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),

    #[error("worker is not available")]
    NotFound,

    #[error("worker task crashed")]
    Panicked,
}

/// Errors surfaced to callers of the router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Arbitration(#[from] ArbitrationError),
}
