//! Gap-fill: compute expected bar timestamps over a window, diff against what's persisted, and
//! backfill the missing spans from the exchange adapter in ascending order (spec.md §4.4).

use std::collections::HashSet;

use vertex_core::{UnixSeconds, VertexError};
use vertex_model::{SeriesKey, Topic};

use super::IngestionNode;

/// Groups a sorted list of missing, evenly-spaced timestamps into contiguous runs.
fn contiguous_spans(missing: &[i64], step: i64) -> Vec<Vec<i64>> {
    let mut spans: Vec<Vec<i64>> = Vec::new();
    for &ts in missing {
        match spans.last_mut() {
            Some(span) if *span.last().expect("span is never empty") + step == ts => span.push(ts),
            _ => spans.push(vec![ts]),
        }
    }
    spans
}

pub(crate) async fn backfill(node: &IngestionNode, key: SeriesKey) -> Result<(), VertexError> {
    let now = node.clock().now();
    let from = now - node.config().backfill_window_secs;
    let step = key.timeframe.duration_secs();

    let existing = node.store().range(key, from, now).await?;
    let existing_ts: HashSet<i64> = existing.iter().map(|b| b.timestamp.0).collect();

    let aligned_from = from.0.div_euclid(step) * step;
    let missing: Vec<i64> = (aligned_from..=now.0).step_by(step as usize).filter(|ts| !existing_ts.contains(ts)).collect();
    if missing.is_empty() {
        return Ok(());
    }

    for span in contiguous_spans(&missing, step) {
        for chunk in span.chunks(node.adapter().max_bars_per_request()) {
            let chunk_from = UnixSeconds(*chunk.first().expect("chunk is never empty"));
            let chunk_to = UnixSeconds(*chunk.last().expect("chunk is never empty"));
            let mut bars = node.adapter().fetch_range(key, chunk_from, chunk_to).await?;
            bars.sort_by_key(|b| b.timestamp.0);
            for bar in bars {
                node.store().persist(bar).await?;
                node.bus().publish_json(Topic::bar(bar.key()), &bar);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_group_consecutive_timestamps_only() {
        let missing = vec![60, 120, 180, 300, 360];
        let spans = contiguous_spans(&missing, 60);
        assert_eq!(spans, vec![vec![60, 120, 180], vec![300, 360]]);
    }

    #[test]
    fn single_gap_is_one_span() {
        let missing = vec![60];
        assert_eq!(contiguous_spans(&missing, 60), vec![vec![60]]);
    }
}
