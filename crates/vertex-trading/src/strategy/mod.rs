//! The strategy contract (spec.md §4.6): entry/exit signal generation plus a second-stage
//! confirmation filter, dispatched by a node-level handler on every new bar+indicator pair.

mod dual_ma_cross;
mod registry;
mod rsi_mean_reversion;

pub use dual_ma_cross::DualMaCrossStrategy;
pub use registry::StrategyRegistry;
pub use rsi_mean_reversion::RsiMeanReversionStrategy;

use std::time::Duration;

use async_trait::async_trait;
use ustr::Ustr;
use vertex_model::{Action, Bar, Enhancement, IndicatorRecord, Position, Side, Signal, SignalKind};

/// Stop/target distance parameters shared by every strategy's exit logic (spec.md §4.6).
#[derive(Clone, Copy, Debug)]
pub struct StopTargetParams {
    pub atr_stop_mult: f64,
    pub atr_target_mult: f64,
    pub pct_stop: f64,
    pub pct_target: f64,
}

impl Default for StopTargetParams {
    fn default() -> Self {
        Self { atr_stop_mult: 2.0, atr_target_mult: 3.0, pct_stop: 0.02, pct_target: 0.04 }
    }
}

/// How far price must retreat from its favorable watermark before `default_exit` treats it as a
/// trailing-stop hit. Not given a literal value in spec.md; 3% is chosen as a middle ground
/// between the default fixed stop (2%) and target (4%) distances.
pub const TRAILING_STOP_PCT: f64 = 0.03;

/// Computes `(stop_loss, take_profit)` for a new position: ATR-scaled when available, a fixed
/// percentage of entry price otherwise (spec.md §4.6).
#[must_use]
pub fn compute_stop_target(entry_price: f64, side: Side, atr14: Option<f64>, params: StopTargetParams) -> (f64, f64) {
    let (stop_dist, target_dist) = match atr14 {
        Some(atr) if atr > 0.0 => (atr * params.atr_stop_mult, atr * params.atr_target_mult),
        _ => (entry_price * params.pct_stop, entry_price * params.pct_target),
    };
    match side {
        Side::Long => (entry_price - stop_dist, entry_price + target_dist),
        Side::Short => (entry_price + stop_dist, entry_price - target_dist),
    }
}

pub(crate) fn close_signal(position: &Position, bar: &Bar, reason: &str) -> Signal {
    let signal_kind = match position.side {
        Side::Long => SignalKind::CloseLong,
        Side::Short => SignalKind::CloseShort,
    };
    Signal {
        strategy_name: position.strategy,
        symbol: position.symbol,
        timestamp: bar.timestamp,
        price: bar.close,
        signal_kind,
        side: position.side,
        action: Action::Close,
        reason: reason.to_string(),
        confidence: None,
        stop_loss: None,
        take_profit: None,
        enhancement: None,
    }
}

/// Stop-loss, take-profit, and trailing-stop-via-watermark exit check shared by every strategy
/// (spec.md §4.6). Strategies call this from their own `check_exit_signal` after their
/// strategy-specific exit conditions (reverse cross, reversion to band middle, ...) come up empty.
#[must_use]
pub fn default_exit(position: &Position, bar: &Bar) -> Option<Signal> {
    match position.side {
        Side::Long => {
            let trailing = position.high_watermark * (1.0 - TRAILING_STOP_PCT);
            if position.stop_loss.is_some_and(|sl| bar.low <= sl) {
                Some(close_signal(position, bar, "stop_loss"))
            } else if position.take_profit.is_some_and(|tp| bar.high >= tp) {
                Some(close_signal(position, bar, "take_profit"))
            } else if bar.low <= trailing {
                Some(close_signal(position, bar, "trailing_stop"))
            } else {
                None
            }
        }
        Side::Short => {
            let trailing = position.low_watermark * (1.0 + TRAILING_STOP_PCT);
            if position.stop_loss.is_some_and(|sl| bar.high >= sl) {
                Some(close_signal(position, bar, "stop_loss"))
            } else if position.take_profit.is_some_and(|tp| bar.low <= tp) {
                Some(close_signal(position, bar, "take_profit"))
            } else if bar.high >= trailing {
                Some(close_signal(position, bar, "trailing_stop"))
            } else {
                None
            }
        }
    }
}

/// What an [`Enhancer`] sees: the candidate signal plus the bar/indicator context it fired on.
#[derive(Clone)]
pub struct EnhancementContext {
    pub signal: Signal,
    pub bar: Bar,
    pub indicator: IndicatorRecord,
}

/// An optional LLM-backed second opinion on a confirmed signal (spec.md §4.6, §9). Never allowed
/// to block or fail the trading decision: callers wrap `enhance` in a timeout and treat timeout,
/// error, or `None` identically to "no enhancement available."
#[async_trait]
pub trait Enhancer: Send + Sync {
    async fn enhance(&self, ctx: EnhancementContext) -> Option<Enhancement>;
}

/// Volume/volatility thresholds for [`default_confirm_signal`] (spec.md §4.6).
#[derive(Clone, Copy, Debug)]
pub struct ConfirmParams {
    pub volume_floor_mult: f64,
    pub atr_ceiling_mult: f64,
}

impl Default for ConfirmParams {
    fn default() -> Self {
        Self { volume_floor_mult: 0.5, atr_ceiling_mult: 0.05 }
    }
}

/// Shared second-stage filter every strategy's `confirm_signal` delegates to (spec.md §4.6):
/// reject on thin volume or excessive volatility, otherwise optionally attach an LLM enhancement
/// within a 5s timeout. Never rejects because of the enhancer; absence, timeout, or error all
/// leave `confirmed = true` with the signal unmodified.
pub async fn default_confirm_signal(
    signal: &mut Signal,
    bar: &Bar,
    ind: &IndicatorRecord,
    enhancer: Option<&dyn Enhancer>,
    params: ConfirmParams,
) -> bool {
    if let Some(volume_ma5) = ind.volume_ma5 {
        if bar.volume < params.volume_floor_mult * volume_ma5 {
            return false;
        }
    }
    if let (Some(atr14), Some(ma20)) = (ind.atr14, ind.ma20) {
        if atr14 > params.atr_ceiling_mult * ma20 {
            return false;
        }
    }
    if let Some(enhancer) = enhancer {
        let ctx = EnhancementContext { signal: signal.clone(), bar: *bar, indicator: *ind };
        if let Ok(Some(enhancement)) = tokio::time::timeout(Duration::from_secs(5), enhancer.enhance(ctx)).await {
            signal.enhancement = Some(enhancement);
        }
    }
    true
}

/// Exactly spec.md §4.6's contract. Implementations keep whatever position-shadowing state they
/// need for their own entry/exit logic; authoritative sizing lives in the position manager.
#[async_trait]
pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Returns an OPEN signal, or `None` if no entry condition is met.
    fn check_entry_signal(
        &mut self,
        symbol: Ustr,
        bar: &Bar,
        ind: &IndicatorRecord,
        prev_ind: Option<&IndicatorRecord>,
    ) -> Option<Signal>;

    /// Returns a CLOSE signal, or `None` if the position should stay open.
    fn check_exit_signal(
        &mut self,
        symbol: Ustr,
        bar: &Bar,
        ind: &IndicatorRecord,
        prev_ind: Option<&IndicatorRecord>,
        position: &Position,
    ) -> Option<Signal>;

    /// Second-stage filter; may mutate `signal` to attach enhancement metadata.
    async fn confirm_signal(&mut self, signal: &mut Signal, bar: &Bar, ind: &IndicatorRecord, enhancer: Option<&dyn Enhancer>) -> bool;
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use vertex_core::UnixSeconds;

    use super::*;

    fn position(side: Side, entry: f64, stop: Option<f64>, target: Option<f64>) -> Position {
        Position::new(Ustr::from("s"), Ustr::from("BTCUSDT"), side, 1.0, Decimal::new(1000, 0), entry, UnixSeconds(0), stop, target)
    }

    fn bar(low: f64, high: f64, close: f64) -> Bar {
        Bar {
            symbol: "BTCUSDT".into(),
            timeframe: vertex_model::Timeframe::Minute1,
            market_kind: vertex_model::MarketKind::Spot,
            timestamp: UnixSeconds(60),
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn long_stop_loss_triggers_on_bar_low() {
        let pos = position(Side::Long, 100.0, Some(95.0), Some(120.0));
        let signal = default_exit(&pos, &bar(94.0, 101.0, 96.0)).unwrap();
        assert_eq!(signal.reason, "stop_loss");
        assert_eq!(signal.signal_kind, SignalKind::CloseLong);
    }

    #[test]
    fn long_take_profit_triggers_on_bar_high() {
        let pos = position(Side::Long, 100.0, Some(95.0), Some(120.0));
        let signal = default_exit(&pos, &bar(99.0, 121.0, 110.0)).unwrap();
        assert_eq!(signal.reason, "take_profit");
    }

    #[test]
    fn no_exit_while_inside_all_bands() {
        let pos = position(Side::Long, 100.0, Some(90.0), Some(130.0));
        assert!(default_exit(&pos, &bar(99.0, 101.0, 100.0)).is_none());
    }

    #[test]
    fn compute_stop_target_prefers_atr_when_present() {
        let (stop, target) = compute_stop_target(100.0, Side::Long, Some(2.0), StopTargetParams::default());
        assert_eq!(stop, 96.0);
        assert_eq!(target, 106.0);
    }

    #[test]
    fn compute_stop_target_falls_back_to_fixed_percentage() {
        let (stop, target) = compute_stop_target(100.0, Side::Long, None, StopTargetParams::default());
        assert_eq!(stop, 98.0);
        assert_eq!(target, 104.0);
    }

    #[tokio::test]
    async fn confirm_signal_rejects_thin_volume() {
        let mut ind = IndicatorRecord::default();
        ind.volume_ma5 = Some(100.0);
        let mut signal = close_signal(&position(Side::Long, 100.0, None, None), &bar(99.0, 101.0, 100.0), "test");
        let confirmed = default_confirm_signal(&mut signal, &bar(99.0, 101.0, 100.0), &ind, None, ConfirmParams::default()).await;
        assert!(!confirmed);
    }

    #[tokio::test]
    async fn confirm_signal_passes_with_no_enhancer() {
        let ind = IndicatorRecord::default();
        let mut signal = close_signal(&position(Side::Long, 100.0, None, None), &bar(99.0, 101.0, 100.0), "test");
        let confirmed = default_confirm_signal(&mut signal, &bar(99.0, 101.0, 100.0), &ind, None, ConfirmParams::default()).await;
        assert!(confirmed);
        assert!(signal.enhancement.is_none());
    }
}
