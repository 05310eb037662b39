//! Shared runtime infrastructure used by every node and engine in the Vertex trading platform:
//! the pub/sub message bus (spec.md §4.1) and the node lifecycle runtime (spec.md §4.2).

pub mod msgbus;
pub mod node;

pub use msgbus::{BusError, BusMessage, MessageBus, Subscription, SubscriptionHandle, SubscriptionId};
pub use node::{NodeHandler, NodeRuntime, NodeState, DEFAULT_MAX_CONSECUTIVE_ERRORS, DEFAULT_STOP_TIMEOUT};
