//! Fast/slow moving-average crossover (spec.md §4.6, supplemented from
//! `examples/original_source`'s dual-MA strategy sketch). Entry on a cross of `ma5` over `ma20`;
//! exit on the reverse cross or the shared stop/target/trailing rules.

use async_trait::async_trait;
use ustr::Ustr;
use vertex_model::{Action, Bar, IndicatorRecord, Position, Side, Signal, SignalKind};

use super::{close_signal, compute_stop_target, default_confirm_signal, default_exit, ConfirmParams, Enhancer, Strategy, StopTargetParams};

pub struct DualMaCrossStrategy {
    name: String,
    stop_target: StopTargetParams,
    confirm: ConfirmParams,
}

impl DualMaCrossStrategy {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), stop_target: StopTargetParams::default(), confirm: ConfirmParams::default() }
    }
}

#[async_trait]
impl Strategy for DualMaCrossStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_entry_signal(&mut self, symbol: Ustr, bar: &Bar, ind: &IndicatorRecord, prev_ind: Option<&IndicatorRecord>) -> Option<Signal> {
        let prev = prev_ind?;
        let (fast, slow, prev_fast, prev_slow) = (ind.ma5?, ind.ma20?, prev.ma5?, prev.ma20?);

        let side = if prev_fast <= prev_slow && fast > slow {
            Side::Long
        } else if prev_fast >= prev_slow && fast < slow {
            Side::Short
        } else {
            return None;
        };

        let (stop_loss, take_profit) = compute_stop_target(bar.close, side, ind.atr14, self.stop_target);
        let signal_kind = match side {
            Side::Long => SignalKind::OpenLong,
            Side::Short => SignalKind::OpenShort,
        };
        Some(Signal {
            strategy_name: Ustr::from(&self.name),
            symbol,
            timestamp: bar.timestamp,
            price: bar.close,
            signal_kind,
            side,
            action: Action::Open,
            reason: "ma5_ma20_cross".to_string(),
            confidence: None,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            enhancement: None,
        })
    }

    fn check_exit_signal(
        &mut self,
        _symbol: Ustr,
        bar: &Bar,
        ind: &IndicatorRecord,
        prev_ind: Option<&IndicatorRecord>,
        position: &Position,
    ) -> Option<Signal> {
        if let Some(prev) = prev_ind {
            if let (Some(fast), Some(slow), Some(prev_fast), Some(prev_slow)) = (ind.ma5, ind.ma20, prev.ma5, prev.ma20) {
                let reversed = match position.side {
                    Side::Long => prev_fast >= prev_slow && fast < slow,
                    Side::Short => prev_fast <= prev_slow && fast > slow,
                };
                if reversed {
                    return Some(close_signal(position, bar, "reverse_cross"));
                }
            }
        }
        default_exit(position, bar)
    }

    async fn confirm_signal(&mut self, signal: &mut Signal, bar: &Bar, ind: &IndicatorRecord, enhancer: Option<&dyn Enhancer>) -> bool {
        default_confirm_signal(signal, bar, ind, enhancer, self.confirm).await
    }
}

#[cfg(test)]
mod tests {
    use vertex_core::UnixSeconds;
    use vertex_model::{MarketKind, Timeframe};

    use super::*;

    fn ind(ma5: f64, ma20: f64) -> IndicatorRecord {
        IndicatorRecord { ma5: Some(ma5), ma20: Some(ma20), ..Default::default() }
    }

    fn bar(close: f64) -> Bar {
        Bar {
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::Minute1,
            market_kind: MarketKind::Spot,
            timestamp: UnixSeconds(60),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn golden_cross_opens_long() {
        let mut strategy = DualMaCrossStrategy::new("dual_ma");
        let prev = ind(99.0, 100.0);
        let now = ind(101.0, 100.0);
        let signal = strategy.check_entry_signal(Ustr::from("BTCUSDT"), &bar(100.0), &now, Some(&prev)).unwrap();
        assert_eq!(signal.side, Side::Long);
        assert_eq!(signal.signal_kind, SignalKind::OpenLong);
    }

    #[test]
    fn no_cross_no_signal() {
        let mut strategy = DualMaCrossStrategy::new("dual_ma");
        let prev = ind(101.0, 100.0);
        let now = ind(102.0, 100.0);
        assert!(strategy.check_entry_signal(Ustr::from("BTCUSDT"), &bar(100.0), &now, Some(&prev)).is_none());
    }
}
