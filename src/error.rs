//! Error taxonomy surfaced to callers (§7).
//!
//! Every fallible operation in `registry`/`conference`/`participant` returns `Result<T,
//! CoreError>`. The dispatcher never invents its own error strings: it calls
//! [`CoreError::wire_message`] and puts that directly in the ack.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    LimitExceeded(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl CoreError {
    /// The string that goes in the wire ack's `error` field. Never leaks internal detail beyond
    /// what §7 calls for.
    pub fn wire_message(&self) -> String {
        self.to_string()
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        CoreError::Validation(what.into())
    }

    pub fn precondition(what: impl Into<String>) -> Self {
        CoreError::PreconditionFailed(what.into())
    }

    /// Wrap an error surfaced by the underlying `mediasoup` engine call. Call sites use
    /// `.map_err(CoreError::engine)` rather than `?` because the engine's own error types differ
    /// per call (`create_router`, `produce`, `consume`, ...) and don't share a common trait object
    /// we'd want to lock this crate's public API to.
    pub fn engine(err: impl std::fmt::Display) -> Self {
        CoreError::Engine(err.to_string())
    }
}
