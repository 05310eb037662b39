//! The exchange collaborator an ingestion node pulls bars from. Out of scope to implement here
//! (spec.md §1): a real adapter talking to a specific venue lives outside this crate.

use async_trait::async_trait;
use futures::stream::BoxStream;
use vertex_core::{UnixSeconds, VertexError};
use vertex_model::{Bar, SeriesKey};

/// One live bar event: a closed bar (persisted and published) or a still-forming partial bar
/// (published only, to `bar.<...>.tick`, spec.md §4.4).
#[derive(Clone, Copy, Debug)]
pub enum LiveBarEvent {
    Closed(Bar),
    Partial(Bar),
}

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Fetches `[from, to]` for `key`, internally chunking at
    /// [`ExchangeAdapter::max_bars_per_request`].
    async fn fetch_range(&self, key: SeriesKey, from: UnixSeconds, to: UnixSeconds) -> Result<Vec<Bar>, VertexError>;

    /// Upper bound on bars a single `fetch_range` chunk may request (spec.md §4.4: "typically
    /// around 10^3").
    fn max_bars_per_request(&self) -> usize {
        1000
    }

    /// A stream of live bar events across all of `keys`, multiplexed. Ends when the underlying
    /// connection drops; the ingestion node treats stream end as a disconnect to recover from.
    async fn live_bars(&self, keys: Vec<SeriesKey>) -> BoxStream<'static, LiveBarEvent>;
}
