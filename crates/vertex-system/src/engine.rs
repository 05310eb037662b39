//! Orchestrates exactly one strategy instance, one position manager and one data source through
//! spec.md §4.9's six-step run loop, live or replay.

use std::{
    collections::HashMap,
    pin::Pin,
    sync::{atomic::{AtomicBool, Ordering}, Arc},
};

use async_trait::async_trait;
use futures::stream::{BoxStream, Peekable, StreamExt};
use rust_decimal::Decimal;
use ustr::Ustr;
use vertex_analysis::PerformanceReport;
use vertex_common::MessageBus;
use vertex_core::UnixSeconds;
use vertex_data::DataSource;
use vertex_model::{Bar, BacktestResult, IndicatorRecord, Position, SeriesKey, Signal, Topic};
use vertex_trading::{Enhancer, PositionManager, Strategy};

use crate::tasks::ProgressTracker;

/// The live-mode counterpart to replay's inline fill simulation: forwards a confirmed signal and
/// the position it produced to whatever executes against the exchange (out of scope here,
/// spec.md §1/§4.9).
#[async_trait]
pub trait OrderRouter: Send + Sync {
    async fn submit(&self, signal: &Signal, position: &Position);
}

enum EngineEvent {
    Bar(Bar),
    Indicator(IndicatorRecord),
}

/// Built once per run; `run` consumes it. Live and replay share this exact same dispatch path —
/// only `replay` toggles whether fills are simulated inline or forwarded to an [`OrderRouter`],
/// and whether open positions are force-closed at the end.
pub struct TradingEngine {
    strategy_name: Ustr,
    strategy: Box<dyn Strategy>,
    positions: PositionManager,
    data_source: Box<dyn DataSource>,
    bus: Arc<MessageBus>,
    keys: Vec<SeriesKey>,
    replay: bool,
    order_router: Option<Arc<dyn OrderRouter>>,
    enhancer: Option<Arc<dyn Enhancer>>,
}

impl TradingEngine {
    #[must_use]
    pub fn new(
        strategy_name: impl Into<Ustr>,
        strategy: Box<dyn Strategy>,
        positions: PositionManager,
        data_source: Box<dyn DataSource>,
        bus: Arc<MessageBus>,
        keys: Vec<SeriesKey>,
        replay: bool,
    ) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            strategy,
            positions,
            data_source,
            bus,
            keys,
            replay,
            order_router: None,
            enhancer: None,
        }
    }

    #[must_use]
    pub fn with_order_router(mut self, router: Arc<dyn OrderRouter>) -> Self {
        self.order_router = Some(router);
        self
    }

    #[must_use]
    pub fn with_enhancer(mut self, enhancer: Arc<dyn Enhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    #[must_use]
    pub fn total_points(&self) -> Option<u64> {
        self.data_source.total_points()
    }

    /// Consumes the merged bars+indicators stream in timestamp order, dispatching each bar
    /// together with the indicator record computed for that same timestamp to the strategy and
    /// any resulting signal to the position manager (spec.md §4.9 steps 3-4), closes every
    /// remaining position at the last bar in replay mode (step 5), and returns the result bundle
    /// (step 6). `progress`, if given, is advanced once per processed bar.
    ///
    /// Bars and indicator records are read off two separate streams and merged by timestamp
    /// (ties go to the bar), reconstructing the single chronological order `ReplayDataSource`
    /// itself preloaded them in — `futures::stream::select`'s fair round-robin would ignore
    /// timestamps entirely and could let a not-yet-warmed-up indicator far in the future outrun
    /// its own bar. Even with that merge, a bar and its same-timestamp indicator aren't adjacent
    /// events (the bar always comes first), so a bar is never dispatched the moment it's read: it
    /// sits in `pending_bar` per symbol until either the matching indicator record (same
    /// timestamp) arrives, or a newer bar for the same symbol shows up first, at which point it's
    /// dispatched against whatever indicator is newest so far (spec.md §4.6, §4.9: a strategy
    /// sees "the current bar and current indicator record" together, never last bar paired with
    /// this bar's not-yet-computed indicator).
    ///
    /// Takes `self` by value and destructures it up front: the bar/indicator streams borrow
    /// `data_source`/`keys` for the whole loop, and the dispatch step needs to mutate `strategy`
    /// and `positions` on every iteration, so those have to live as independent local bindings
    /// rather than fields behind one shared borrow of `self`.
    ///
    /// `cancel`, if given, is consulted once per suspension point (spec.md §5: "every
    /// long-running task has a single cancellation signal observed at each suspension point") —
    /// a set flag stops the loop after the in-flight bar finishes dispatching, leaving whatever
    /// positions are open at that point for the result bundle rather than force-closing them. Any
    /// bar still buffered in `pending_bar` when that happens is left undispatched too.
    pub async fn run<F: FnMut(f64)>(
        self,
        mut progress: Option<ProgressTracker<F>>,
        cancel: Option<Arc<AtomicBool>>,
    ) -> BacktestResult {
        let TradingEngine { strategy_name, mut strategy, positions, data_source, bus, keys, replay, order_router, enhancer } = self;

        let mut bars = data_source.bars(&keys).map(|(_, bar)| bar).boxed().peekable();
        let mut indicators = data_source.indicators(&keys).map(|(_, rec)| rec).boxed().peekable();

        let mut latest_ind: HashMap<Ustr, IndicatorRecord> = HashMap::new();
        let mut prev_ind: HashMap<Ustr, IndicatorRecord> = HashMap::new();
        let mut pending_bar: HashMap<Ustr, Bar> = HashMap::new();
        let mut last_bar: HashMap<Ustr, Bar> = HashMap::new();
        let mut equity_curve: Vec<(UnixSeconds, f64)> = Vec::new();
        let mut cancelled = false;

        'run: while let Some(event) = next_engine_event(&mut bars, &mut indicators).await {
            match event {
                EngineEvent::Bar(bar) => {
                    if let Some(stale) = pending_bar.insert(bar.symbol, bar) {
                        cancelled = dispatch_and_record(
                            &mut *strategy, &positions, &bus, strategy_name, &order_router, &enhancer, replay,
                            stale, &latest_ind, &prev_ind, &mut last_bar, &mut equity_curve, &mut progress, &cancel,
                        )
                        .await;
                        if cancelled {
                            break 'run;
                        }
                    }
                }
                EngineEvent::Indicator(record) => {
                    if let Some(pending) = pending_bar.get(&record.symbol).copied() {
                        if pending.timestamp < record.timestamp {
                            pending_bar.remove(&record.symbol);
                            cancelled = dispatch_and_record(
                                &mut *strategy, &positions, &bus, strategy_name, &order_router, &enhancer, replay,
                                pending, &latest_ind, &prev_ind, &mut last_bar, &mut equity_curve, &mut progress, &cancel,
                            )
                            .await;
                            if cancelled {
                                break 'run;
                            }
                        }
                    }

                    if let Some(previous) = latest_ind.insert(record.symbol, record) {
                        prev_ind.insert(record.symbol, previous);
                    }

                    if pending_bar.get(&record.symbol).is_some_and(|b| b.timestamp == record.timestamp) {
                        let bar = pending_bar.remove(&record.symbol).expect("just matched above");
                        cancelled = dispatch_and_record(
                            &mut *strategy, &positions, &bus, strategy_name, &order_router, &enhancer, replay,
                            bar, &latest_ind, &prev_ind, &mut last_bar, &mut equity_curve, &mut progress, &cancel,
                        )
                        .await;
                        if cancelled {
                            break 'run;
                        }
                    }
                }
            }
        }
        drop(bars);
        drop(indicators);

        if !cancelled {
            for (_, bar) in pending_bar.drain().collect::<Vec<_>>() {
                cancelled = dispatch_and_record(
                    &mut *strategy, &positions, &bus, strategy_name, &order_router, &enhancer, replay,
                    bar, &latest_ind, &prev_ind, &mut last_bar, &mut equity_curve, &mut progress, &cancel,
                )
                .await;
                if cancelled {
                    break;
                }
            }
        }

        if replay {
            close_all_at_last_bar(&positions, &keys, strategy_name, &last_bar, &mut equity_curve);
        }

        let unrealized_pnl = unrealized_pnl(&positions, &keys, strategy_name, &last_bar);
        let trades = positions.take_trades();
        let report = PerformanceReport::compute(&trades, &equity_curve);
        let realized_pnl: f64 = trades.iter().map(|t| t.realized_pnl).sum();

        if let Some(tracker) = progress.as_mut() {
            tracker.finish();
        }

        BacktestResult {
            final_equity: Decimal::from_f64_retain(positions.equity()).unwrap_or_default(),
            realized_pnl: Decimal::from_f64_retain(realized_pnl).unwrap_or_default(),
            unrealized_pnl: Decimal::from_f64_retain(unrealized_pnl).unwrap_or_default(),
            trades,
            win_rate: report.win_rate,
            profit_factor: report.profit_factor,
            sharpe_ratio: report.sharpe_ratio,
            max_drawdown: report.max_drawdown,
        }
    }
}

/// Pulls whichever of `bars`/`indicators` has the earlier timestamp, breaking ties toward the
/// bar — the same tie-break `ReplayDataSource` itself uses when it preloads a single chronological
/// event log, so merging the two streams this way reconstructs that exact order instead of the
/// arbitrary interleaving a fair round-robin (`futures::stream::select`) would produce between two
/// streams that are both always immediately ready.
async fn next_engine_event(
    bars: &mut Peekable<BoxStream<'_, Bar>>,
    indicators: &mut Peekable<BoxStream<'_, IndicatorRecord>>,
) -> Option<EngineEvent> {
    let take_bar = match (Pin::new(&mut *bars).peek().await, Pin::new(&mut *indicators).peek().await) {
        (None, None) => return None,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (Some(bar), Some(rec)) => bar.timestamp <= rec.timestamp,
    };
    if take_bar {
        bars.next().await.map(EngineEvent::Bar)
    } else {
        indicators.next().await.map(EngineEvent::Indicator)
    }
}

/// Resolves the indicator record paired with `bar` (the current one if the matching record has
/// already been folded into `latest_ind`, else a default — spec.md §4.9: a bar with no indicator
/// computed yet for its timestamp still dispatches, just without indicator-driven signals), runs
/// it through [`dispatch_bar`], and folds the result back into the running equity curve and
/// progress tracker. Returns whether the caller should stop the run after this dispatch.
#[allow(clippy::too_many_arguments)]
async fn dispatch_and_record<F: FnMut(f64)>(
    strategy: &mut dyn Strategy,
    positions: &PositionManager,
    bus: &Arc<MessageBus>,
    strategy_name: Ustr,
    order_router: &Option<Arc<dyn OrderRouter>>,
    enhancer: &Option<Arc<dyn Enhancer>>,
    replay: bool,
    bar: Bar,
    latest_ind: &HashMap<Ustr, IndicatorRecord>,
    prev_ind: &HashMap<Ustr, IndicatorRecord>,
    last_bar: &mut HashMap<Ustr, Bar>,
    equity_curve: &mut Vec<(UnixSeconds, f64)>,
    progress: &mut Option<ProgressTracker<F>>,
    cancel: &Option<Arc<AtomicBool>>,
) -> bool {
    let ind = latest_ind.get(&bar.symbol).copied().unwrap_or_default();
    let prev = prev_ind.get(&bar.symbol);
    dispatch_bar(strategy, positions, bus, strategy_name, order_router, enhancer, replay, bar.symbol, &bar, &ind, prev).await;
    equity_curve.push((bar.timestamp, positions.equity()));
    last_bar.insert(bar.symbol, bar);
    if let Some(tracker) = progress.as_mut() {
        tracker.record_item();
    }
    cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// One tick of the dispatch loop (spec.md §4.9 step 3): update watermarks and check for an exit
/// if a position is open, otherwise check for an entry. Either path that produces a signal
/// publishes it on `sig.<strategy>.<symbol>` for external visibility (spec.md §4.11) before
/// acting on it directly against the position manager — a deliberate simplification over
/// round-tripping back through the bus, which would race against step 5's end-of-run close
/// against a handler this same loop already owns synchronously.
#[allow(clippy::too_many_arguments)]
async fn dispatch_bar(
    strategy: &mut dyn Strategy,
    positions: &PositionManager,
    bus: &Arc<MessageBus>,
    strategy_name: Ustr,
    order_router: &Option<Arc<dyn OrderRouter>>,
    enhancer: &Option<Arc<dyn Enhancer>>,
    replay: bool,
    symbol: Ustr,
    bar: &Bar,
    ind: &IndicatorRecord,
    prev: Option<&IndicatorRecord>,
) {
    let topic = Topic::signal(strategy_name.as_str(), symbol.as_str());

    if let Some(mut position) = positions.position(strategy_name, symbol) {
        positions.update_watermarks(strategy_name, symbol, bar.high, bar.low);
        position.update_watermarks(bar.high, bar.low);

        if let Some(signal) = strategy.check_exit_signal(symbol, bar, ind, prev, &position) {
            bus.publish_json(topic, &signal);
            if positions.close(strategy_name, symbol, signal.price, signal.timestamp).is_ok() && !replay {
                if let Some(router) = order_router.clone() {
                    router.submit(&signal, &position).await;
                }
            }
        }
    } else if let Some(mut signal) = strategy.check_entry_signal(symbol, bar, ind, prev) {
        let confirmed = strategy.confirm_signal(&mut signal, bar, ind, enhancer.as_deref()).await;
        if confirmed {
            bus.publish_json(topic, &signal);
            if let Ok(position) = positions.open(&signal, ind) {
                if !replay {
                    if let Some(router) = order_router.clone() {
                        router.submit(&signal, &position).await;
                    }
                }
            }
        }
    }
}

fn close_all_at_last_bar(
    positions: &PositionManager,
    keys: &[SeriesKey],
    strategy_name: Ustr,
    last_bar: &HashMap<Ustr, Bar>,
    equity_curve: &mut Vec<(UnixSeconds, f64)>,
) {
    let mut latest_ts = None;
    for key in keys {
        let Some(bar) = last_bar.get(&key.symbol) else { continue };
        latest_ts = Some(latest_ts.map_or(bar.timestamp, |ts: UnixSeconds| ts.max(bar.timestamp)));
        if positions.position(strategy_name, key.symbol).is_some() {
            let _ = positions.close(strategy_name, key.symbol, bar.close, bar.timestamp);
        }
    }
    if let Some(ts) = latest_ts {
        equity_curve.push((ts, positions.equity()));
    }
}

fn unrealized_pnl(positions: &PositionManager, keys: &[SeriesKey], strategy_name: Ustr, last_bar: &HashMap<Ustr, Bar>) -> f64 {
    keys.iter()
        .filter_map(|key| {
            let position = positions.position(strategy_name, key.symbol)?;
            let bar = last_bar.get(&key.symbol)?;
            Some(position.realized_pnl(bar.close))
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use vertex_core::UnixSeconds as Ts;
    use vertex_model::{Action, MarketKind, SignalKind, Timeframe};
    use vertex_persistence::{BarStore, InMemoryStore};
    use vertex_trading::{SizingPreset, SizingStrategy};

    use super::*;

    fn bar(symbol: &str, ts: i64, price: f64) -> Bar {
        Bar {
            symbol: symbol.into(),
            timeframe: Timeframe::Minute1,
            market_kind: MarketKind::Spot,
            timestamp: Ts(ts),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 10.0,
        }
    }

    /// Opens LONG on the first bar, closes on the second — a strategy test double standing in
    /// for a real crossover strategy so this test exercises only the engine's orchestration.
    struct ScriptedStrategy;

    #[async_trait]
    impl Strategy for ScriptedStrategy {
        fn name(&self) -> &str {
            "scripted"
        }

        fn check_entry_signal(&mut self, symbol: Ustr, bar: &Bar, _ind: &IndicatorRecord, _prev: Option<&IndicatorRecord>) -> Option<Signal> {
            (bar.timestamp == Ts(0)).then(|| Signal {
                strategy_name: Ustr::from("scripted"),
                symbol,
                timestamp: bar.timestamp,
                price: bar.close,
                signal_kind: SignalKind::OpenLong,
                side: vertex_model::Side::Long,
                action: Action::Open,
                reason: "scripted entry".into(),
                confidence: None,
                stop_loss: None,
                take_profit: None,
                enhancement: None,
            })
        }

        fn check_exit_signal(
            &mut self,
            symbol: Ustr,
            bar: &Bar,
            _ind: &IndicatorRecord,
            _prev: Option<&IndicatorRecord>,
            _position: &Position,
        ) -> Option<Signal> {
            (bar.timestamp == Ts(60)).then(|| Signal {
                strategy_name: Ustr::from("scripted"),
                symbol,
                timestamp: bar.timestamp,
                price: bar.close,
                signal_kind: SignalKind::CloseLong,
                side: vertex_model::Side::Long,
                action: Action::Close,
                reason: "scripted exit".into(),
                confidence: None,
                stop_loss: None,
                take_profit: None,
                enhancement: None,
            })
        }

        async fn confirm_signal(&mut self, _signal: &mut Signal, _bar: &Bar, _ind: &IndicatorRecord, _enhancer: Option<&dyn Enhancer>) -> bool {
            true
        }
    }

    /// Literal scenario 5 from spec.md §8: two bars, one symbol, LONG opened at 100 and closed
    /// at 110, size 1 unit -> total_trades=1, winning_trades=1, realized_pnl=10,
    /// final_equity=initial+10.
    #[tokio::test]
    async fn deterministic_two_bar_backtest_matches_the_literal_scenario() {
        let store = InMemoryStore::new();
        BarStore::persist(&store, bar("BTCUSDT", 0, 100.0)).await.unwrap();
        BarStore::persist(&store, bar("BTCUSDT", 60, 110.0)).await.unwrap();

        let key = SeriesKey::new("BTCUSDT", Timeframe::Minute1, MarketKind::Spot);
        let source = Box::new(
            vertex_data::ReplayDataSource::load(&store, &store, &[key], Ts(0), Ts(120)).await.unwrap(),
        );

        let preset = SizingPreset {
            strategy: SizingStrategy::FixedAmount { amount: 100.0 },
            max_positions: 5,
            max_total_exposure_fraction: 1.0,
            single_position_max_fraction: 1.0,
        };
        let positions = PositionManager::new(Decimal::new(10_000, 0), preset);
        let bus = Arc::new(MessageBus::new(64, 0));

        let engine = TradingEngine::new(Ustr::from("scripted"), Box::new(ScriptedStrategy), positions, source, bus, vec![key], true);
        let result = engine.run::<fn(f64)>(None, None).await;

        assert_eq!(result.total_trades(), 1);
        assert_eq!(result.winning_trades(), 1);
        assert_eq!(result.realized_pnl, Decimal::new(10, 0));
        assert_eq!(result.final_equity, Decimal::new(10_010, 0));
    }

    fn indicator(symbol: &str, ts: i64, ma5: f64) -> IndicatorRecord {
        IndicatorRecord {
            symbol: symbol.into(),
            timeframe: Timeframe::Minute1,
            market_kind: MarketKind::Spot,
            timestamp: Ts(ts),
            engine_version_major: vertex_model::indicator::indicator_engine_major_version(),
            ma5: Some(ma5),
            ..Default::default()
        }
    }

    /// Never trades; just records the indicator it was handed alongside each bar, so the test can
    /// check that every bar is paired with the indicator computed for its own timestamp rather
    /// than the one before it.
    struct RecordingStrategy {
        seen: std::sync::Arc<std::sync::Mutex<Vec<(i64, Option<f64>)>>>,
    }

    #[async_trait]
    impl Strategy for RecordingStrategy {
        fn name(&self) -> &str {
            "recording"
        }

        fn check_entry_signal(&mut self, _symbol: Ustr, bar: &Bar, ind: &IndicatorRecord, _prev: Option<&IndicatorRecord>) -> Option<Signal> {
            self.seen.lock().unwrap().push((bar.timestamp.0, ind.ma5));
            None
        }

        fn check_exit_signal(&mut self, _symbol: Ustr, _bar: &Bar, _ind: &IndicatorRecord, _prev: Option<&IndicatorRecord>, _position: &Position) -> Option<Signal> {
            None
        }

        async fn confirm_signal(&mut self, _signal: &mut Signal, _bar: &Bar, _ind: &IndicatorRecord, _enhancer: Option<&dyn Enhancer>) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn each_bar_is_paired_with_the_indicator_computed_for_its_own_timestamp() {
        let store = InMemoryStore::new();
        for (ts, price) in [(0, 100.0), (60, 110.0), (120, 120.0)] {
            BarStore::persist(&store, bar("BTCUSDT", ts, price)).await.unwrap();
        }
        for (ts, ma5) in [(0, 1.0), (60, 2.0), (120, 3.0)] {
            vertex_persistence::IndicatorStore::persist(&store, indicator("BTCUSDT", ts, ma5)).await.unwrap();
        }

        let key = SeriesKey::new("BTCUSDT", Timeframe::Minute1, MarketKind::Spot);
        let source = Box::new(
            vertex_data::ReplayDataSource::load(&store, &store, &[key], Ts(0), Ts(120)).await.unwrap(),
        );

        let preset = SizingPreset {
            strategy: SizingStrategy::FixedAmount { amount: 100.0 },
            max_positions: 5,
            max_total_exposure_fraction: 1.0,
            single_position_max_fraction: 1.0,
        };
        let positions = PositionManager::new(Decimal::new(10_000, 0), preset);
        let bus = Arc::new(MessageBus::new(64, 0));

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let strategy = Box::new(RecordingStrategy { seen: seen.clone() });
        let engine = TradingEngine::new(Ustr::from("recording"), strategy, positions, source, bus, vec![key], true);
        engine.run::<fn(f64)>(None, None).await;

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec![(0, Some(1.0)), (60, Some(2.0)), (120, Some(3.0))]);
    }
}
