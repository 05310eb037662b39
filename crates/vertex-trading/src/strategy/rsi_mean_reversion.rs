//! RSI-extreme entry, Bollinger-middle reversion exit (spec.md §4.6, supplemented from
//! `examples/original_source`'s RSI/Bollinger strategy sketch).

use async_trait::async_trait;
use ustr::Ustr;
use vertex_model::{Action, Bar, IndicatorRecord, Position, Side, Signal, SignalKind};

use super::{close_signal, compute_stop_target, default_confirm_signal, default_exit, ConfirmParams, Enhancer, Strategy, StopTargetParams};

pub struct RsiMeanReversionStrategy {
    name: String,
    oversold: f64,
    overbought: f64,
    stop_target: StopTargetParams,
    confirm: ConfirmParams,
}

impl RsiMeanReversionStrategy {
    #[must_use]
    pub fn new(name: impl Into<String>, oversold: f64, overbought: f64) -> Self {
        Self {
            name: name.into(),
            oversold,
            overbought,
            stop_target: StopTargetParams::default(),
            confirm: ConfirmParams::default(),
        }
    }
}

#[async_trait]
impl Strategy for RsiMeanReversionStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_entry_signal(&mut self, symbol: Ustr, bar: &Bar, ind: &IndicatorRecord, _prev_ind: Option<&IndicatorRecord>) -> Option<Signal> {
        let rsi = ind.rsi14?;
        let side = if rsi <= self.oversold {
            Side::Long
        } else if rsi >= self.overbought {
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
            reason: format!("rsi14={rsi:.1}"),
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
        _prev_ind: Option<&IndicatorRecord>,
        position: &Position,
    ) -> Option<Signal> {
        if let Some(bands) = ind.bollinger {
            let reverted = match position.side {
                Side::Long => bar.close >= bands.middle,
                Side::Short => bar.close <= bands.middle,
            };
            if reverted {
                return Some(close_signal(position, bar, "reverted_to_band_middle"));
            }
        }
        default_exit(position, bar)
    }

    async fn confirm_signal(&mut self, signal: &mut Signal, bar: &Bar, ind: &IndicatorRecord, enhancer: Option<&dyn Enhancer>) -> bool {
        default_confirm_signal(signal, bar, ind, enhancer, self.confirm).await
    }
}
