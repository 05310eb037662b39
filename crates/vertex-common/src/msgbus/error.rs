//! Bus-local error type (spec.md §4.1, §7).

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// `subscribe` was called after the bus was shut down (spec.md §4.1: "publish never fails on
    /// a closed topic ... Subscribe on a torn-down bus fails with `BusShutDown`").
    #[error("message bus has been shut down")]
    BusShutDown,
}
