//! The crate-wide error taxonomy (spec.md §7).
//!
//! Every subsystem crate defines its own `thiserror` type for its local failure modes and
//! converts into one of these kinds at its boundary, so a caller several layers up can still
//! answer "is this retryable / is this my fault / should this page someone" without knowing the
//! originating crate.

use serde::Serialize;

/// One of the seven error kinds the core must distinguish (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad parameters, missing required field, out-of-range numeric. Never retried.
    Validation,
    /// Exchange rate-limit, storage connection drop, LLM timeout. Retried with backoff.
    Transient,
    /// Missing bars discovered during ingestion. Triggers repair, never fails downstream.
    DataGap,
    /// Non-finite inputs or negative-variance drift inside a calculator.
    CalculatorDomain,
    /// Bus overflow at a subscriber. Counted, never propagated to the publisher.
    BusOverflow,
    /// Cooperative task cancellation. Not an error; terminal state is `cancelled`.
    Cancelled,
    /// A handler error past the consecutive-error threshold. The node stops.
    Fatal,
}

/// A structured, user-visible failure as returned by the request/response surface (spec.md §7).
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct VertexError {
    pub kind: ErrorKind,
    pub message: String,
}

impl VertexError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Transient | ErrorKind::DataGap)
    }
}

pub type Result<T> = std::result::Result<T, VertexError>;
