//! Per-topic retention: a bounded, replayable ring of past messages (spec.md §4.1's "retention
//! stream", the "per-topic retention as an arena" design note in spec.md §9).

use std::collections::VecDeque;

use bytes::Bytes;

/// The default ring capacity for a high-rate topic (spec.md §4.1: "on the order of 10^3").
pub const DEFAULT_RETENTION_CAPACITY: usize = 1024;

/// A fixed-capacity ring of `(stream_id, payload)` pairs. `stream_id` is a 64-bit counter,
/// monotonic and unique within this topic, assigned on append and never reused even after the
/// entry ages out of the ring. IDs are 1-based: the Nth message published to a topic carries
/// `stream_id` N (spec.md §8 scenario 1), so `from(from_stream_id)` can be called with the ID of
/// the next message a subscriber still wants, without an off-by-one against a 0-based counter.
#[derive(Debug)]
pub struct RetentionRing {
    capacity: usize,
    next_id: u64,
    entries: VecDeque<(u64, Bytes)>,
}

impl RetentionRing {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), next_id: 1, entries: VecDeque::new() }
    }

    /// Appends `payload`, evicting the oldest entry if the ring is at capacity. Returns the
    /// freshly assigned `stream_id`.
    pub fn push(&mut self, payload: Bytes) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((id, payload));
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` retained entries, oldest first.
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<(u64, Bytes)> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Entries with `stream_id` in `[from, to]` inclusive, oldest first.
    #[must_use]
    pub fn range(&self, from: u64, to: u64) -> Vec<(u64, Bytes)> {
        self.entries
            .iter()
            .filter(|(id, _)| *id >= from && *id <= to)
            .cloned()
            .collect()
    }

    /// All retained entries with `stream_id >= from`, oldest first. Used to replay the tail on
    /// `subscribe(topic, from_stream_id)` (spec.md §4.1, §8 retention-replay test).
    #[must_use]
    pub fn from(&self, from: u64) -> Vec<(u64, Bytes)> {
        self.entries.iter().filter(|(id, _)| *id >= from).cloned().collect()
    }
}
