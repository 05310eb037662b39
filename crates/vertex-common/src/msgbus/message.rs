//! The envelope carried across the bus.

use bytes::Bytes;
use vertex_model::Topic;

/// A message in flight on the bus: a topic plus an opaque, already-serialized payload.
///
/// Payloads are opaque on purpose (spec.md §4.1): the bus routes by topic only and never
/// inspects or deserializes a payload. `stream_id` is set when the message came from (or was
/// appended to) a topic's retention ring; it is `None` for topics with no retention configured.
#[derive(Clone, Debug)]
pub struct BusMessage {
    pub topic: Topic,
    pub payload: Bytes,
    pub stream_id: Option<u64>,
}

impl BusMessage {
    #[must_use]
    pub fn new(topic: Topic, payload: Bytes) -> Self {
        Self { topic, payload, stream_id: None }
    }
}
