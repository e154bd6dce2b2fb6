// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Homeostat Kernel Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all Homeostat kernel failures.
///
/// Degenerate computations (zero `dt`, empty sample windows) never show up
/// here: they resolve to documented defaults inside the math.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HomeostatError {
    /// Negative gain, out-of-range target/threshold, non-finite input.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Breaker state-machine contract violation. State is left unchanged.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// No circuit-breaker event with the given identifier.
    #[error("unknown circuit-breaker event: {0}")]
    UnknownEvent(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Audit/persistence sink failed. Never propagated into a transition.
    #[error("sink error: {0}")]
    Sink(String),
}

pub type HomeostatResult<T> = Result<T, HomeostatError>;
