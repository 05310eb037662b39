//! Shared low-level primitives: time/clock abstractions, correlation identifiers and the
//! crate-wide error taxonomy. Every other `vertex-*` crate depends on this one.

mod error;
mod ids;
mod time;

pub use error::{ErrorKind, Result, VertexError};
pub use ids::{RunId, TaskId};
pub use time::{Clock, LiveClock, TestClock, UnixSeconds};
