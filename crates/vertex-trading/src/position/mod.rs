//! Translates an emitted signal into a sized order against a running cash model and books the
//! resulting position (spec.md §4.7).

mod sizing;

pub use sizing::SizingStrategy;

use std::collections::HashMap;
use std::sync::Mutex;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use ustr::Ustr;
use vertex_core::{ErrorKind, UnixSeconds, VertexError};
use vertex_model::{IndicatorRecord, Position, Side, Signal, Trade};

/// Risk limits and sizing rule bundled as a named preset (spec.md §3, §4.7).
#[derive(Clone, Debug)]
pub struct SizingPreset {
    pub strategy: SizingStrategy,
    pub max_positions: usize,
    pub max_total_exposure_fraction: f64,
    pub single_position_max_fraction: f64,
}

struct State {
    cash: Decimal,
    positions: HashMap<(Ustr, Ustr), Position>,
    trades: Vec<Trade>,
}

impl State {
    /// Account equity, valuing any open position at its entry price: exact immediately after
    /// open, approximate thereafter since this manager doesn't independently track live marks
    /// (the engine may choose to value more precisely by closing-and-reopening the books itself).
    fn equity(&self) -> f64 {
        let cash = self.cash.to_f64().unwrap_or(0.0);
        let open_value: f64 = self.positions.values().map(|p| p.quantity * p.entry_price).sum();
        cash + open_value
    }

    fn exposure(&self) -> f64 {
        self.positions.values().map(|p| p.usd_amount.to_f64().unwrap_or(0.0)).sum()
    }
}

/// Single-threaded with respect to a given account: callers serialize signals per account
/// (spec.md §4.7). Cash and positions live behind one lock so open/close see a consistent view.
pub struct PositionManager {
    state: Mutex<State>,
    preset: SizingPreset,
}

impl PositionManager {
    #[must_use]
    pub fn new(starting_cash: Decimal, preset: SizingPreset) -> Self {
        Self { state: Mutex::new(State { cash: starting_cash, positions: HashMap::new(), trades: Vec::new() }), preset }
    }

    #[must_use]
    pub fn cash(&self) -> Decimal {
        self.state.lock().expect("position manager mutex poisoned").cash
    }

    #[must_use]
    pub fn equity(&self) -> f64 {
        self.state.lock().expect("position manager mutex poisoned").equity()
    }

    #[must_use]
    pub fn position(&self, strategy: Ustr, symbol: Ustr) -> Option<Position> {
        self.state.lock().expect("position manager mutex poisoned").positions.get(&(strategy, symbol)).cloned()
    }

    #[must_use]
    pub fn open_position_count(&self) -> usize {
        self.state.lock().expect("position manager mutex poisoned").positions.len()
    }

    /// Drains every trade recorded since the last call (spec.md §4.9: consumed by the analysis
    /// layer at run end).
    pub fn take_trades(&self) -> Vec<Trade> {
        std::mem::take(&mut self.state.lock().expect("position manager mutex poisoned").trades)
    }

    /// Updates the trailing watermarks of an open position from the latest bar, the first step
    /// of the strategy dispatch loop (spec.md §4.6 step 1). A no-op if no position is open.
    pub fn update_watermarks(&self, strategy: Ustr, symbol: Ustr, bar_high: f64, bar_low: f64) {
        let mut state = self.state.lock().expect("position manager mutex poisoned");
        if let Some(position) = state.positions.get_mut(&(strategy, symbol)) {
            position.update_watermarks(bar_high, bar_low);
        }
    }

    /// Exactly spec.md §4.7's five-step open algorithm.
    ///
    /// # Errors
    ///
    /// Rejects (without mutating any state) when the position-count limit is reached, or when
    /// the remaining exposure capacity after capping falls below half the originally sized amount.
    pub fn open(&self, signal: &Signal, ind: &IndicatorRecord) -> Result<Position, VertexError> {
        if signal.price <= 0.0 {
            return Err(VertexError::new(ErrorKind::Validation, "signal price must be positive"));
        }
        let mut state = self.state.lock().expect("position manager mutex poisoned");
        let key = (signal.strategy_name, signal.symbol);

        if state.positions.len() >= self.preset.max_positions {
            return Err(VertexError::new(ErrorKind::Validation, "max concurrent positions reached"));
        }

        let equity = state.equity();
        let raw = self.preset.strategy.raw_size(equity, signal, ind);
        let capped = raw.min(self.preset.single_position_max_fraction * equity);

        let exposure = state.exposure();
        let max_exposure = self.preset.max_total_exposure_fraction * equity;
        let sized = if exposure + capped > max_exposure {
            let remaining = (max_exposure - exposure).max(0.0);
            if remaining < 0.5 * capped {
                return Err(VertexError::new(ErrorKind::Validation, "remaining exposure capacity below half the sized amount"));
            }
            remaining
        } else {
            capped
        };

        if sized <= 0.0 {
            return Err(VertexError::new(ErrorKind::Validation, "sized amount is non-positive"));
        }

        let quantity = sized / signal.price;
        let usd_amount = Decimal::from_f64_retain(sized).unwrap_or_default();
        let position = Position::new(
            signal.strategy_name,
            signal.symbol,
            signal.side,
            quantity,
            usd_amount,
            signal.price,
            signal.timestamp,
            signal.stop_loss,
            signal.take_profit,
        );
        state.cash -= usd_amount;
        state.positions.insert(key, position.clone());
        Ok(position)
    }

    /// Realized P&L is `(exit − entry)·qty` for LONG, reversed for SHORT (spec.md §4.7); cash is
    /// credited the original sized amount plus that P&L, the position removed, the trade recorded.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no position is open for `(strategy, symbol)`.
    pub fn close(&self, strategy: Ustr, symbol: Ustr, exit_price: f64, exit_time: UnixSeconds) -> Result<Trade, VertexError> {
        let mut state = self.state.lock().expect("position manager mutex poisoned");
        let position = state
            .positions
            .remove(&(strategy, symbol))
            .ok_or_else(|| VertexError::new(ErrorKind::Validation, "no open position for strategy/symbol"))?;

        let realized_pnl = position.realized_pnl(exit_price);
        state.cash += position.usd_amount + Decimal::from_f64_retain(realized_pnl).unwrap_or_default();

        let trade = Trade {
            strategy: position.strategy,
            symbol: position.symbol,
            side: position.side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            entry_time: position.entry_time,
            exit_price,
            exit_time,
            realized_pnl,
        };
        state.trades.push(trade.clone());
        Ok(trade)
    }
}

#[cfg(test)]
mod tests {
    use vertex_model::{Action, SignalKind};

    use super::*;

    fn preset(strategy: SizingStrategy) -> SizingPreset {
        SizingPreset { strategy, max_positions: 5, max_total_exposure_fraction: 1.0, single_position_max_fraction: 1.0 }
    }

    fn open_signal(symbol: &str, side: Side, price: f64, stop_loss: Option<f64>) -> Signal {
        let signal_kind = match side {
            Side::Long => SignalKind::OpenLong,
            Side::Short => SignalKind::OpenShort,
        };
        Signal {
            strategy_name: Ustr::from("s"),
            symbol: Ustr::from(symbol),
            timestamp: UnixSeconds(0),
            price,
            signal_kind,
            side,
            action: Action::Open,
            reason: "test".into(),
            confidence: None,
            stop_loss,
            take_profit: None,
            enhancement: None,
        }
    }

    /// Scenario 4: equity=10000, risk=0.02, price=50000, stop=49000 → usd_amount=5000,
    /// quantity=0.1 (spec.md §4.7 table, literal example).
    #[test]
    fn risk_based_sizing_matches_the_literal_scenario() {
        let manager = PositionManager::new(Decimal::new(10_000, 0), preset(SizingStrategy::RiskBased { risk_fraction: 0.02 }));
        let signal = open_signal("BTCUSDT", Side::Long, 50_000.0, Some(49_000.0));
        let position = manager.open(&signal, &IndicatorRecord::default()).unwrap();
        assert_eq!(position.usd_amount, Decimal::new(5_000, 0));
        assert!((position.quantity - 0.1).abs() < 1e-9);
    }

    #[test]
    fn fixed_amount_is_capped_at_half_equity() {
        let manager = PositionManager::new(Decimal::new(1_000, 0), preset(SizingStrategy::FixedAmount { amount: 10_000.0 }));
        let signal = open_signal("BTCUSDT", Side::Long, 100.0, None);
        let position = manager.open(&signal, &IndicatorRecord::default()).unwrap();
        assert_eq!(position.usd_amount, Decimal::new(500, 0));
    }

    #[test]
    fn rejects_when_at_max_positions() {
        let manager = PositionManager::new(Decimal::new(10_000, 0), SizingPreset { max_positions: 1, ..preset(SizingStrategy::FixedPercentage { fraction: 0.1 }) });
        manager.open(&open_signal("BTCUSDT", Side::Long, 100.0, None), &IndicatorRecord::default()).unwrap();
        let err = manager.open(&open_signal("ETHUSDT", Side::Long, 100.0, None), &IndicatorRecord::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn reduces_to_remaining_exposure_capacity() {
        let preset = SizingPreset {
            strategy: SizingStrategy::FixedPercentage { fraction: 0.5 },
            max_positions: 5,
            max_total_exposure_fraction: 0.75,
            single_position_max_fraction: 1.0,
        };
        let manager = PositionManager::new(Decimal::new(10_000, 0), preset);
        manager.open(&open_signal("BTCUSDT", Side::Long, 100.0, None), &IndicatorRecord::default()).unwrap();
        // First open used 0.5*10000=5000, exposure cap is 0.6*equity. Equity now drops toward
        // cash+open_value so the second signal's raw 5000 would blow past the cap and must be
        // trimmed to whatever capacity remains.
        let position = manager.open(&open_signal("ETHUSDT", Side::Long, 100.0, None), &IndicatorRecord::default()).unwrap();
        assert!(position.usd_amount < Decimal::new(5_000, 0));
    }

    #[test]
    fn close_credits_cash_and_records_a_trade() {
        let manager = PositionManager::new(Decimal::new(10_000, 0), preset(SizingStrategy::FixedAmount { amount: 1_000.0 }));
        manager.open(&open_signal("BTCUSDT", Side::Long, 100.0, None), &IndicatorRecord::default()).unwrap();
        let trade = manager.close(Ustr::from("s"), Ustr::from("BTCUSDT"), 110.0, UnixSeconds(60)).unwrap();
        assert_eq!(trade.realized_pnl, 100.0);
        assert_eq!(manager.cash(), Decimal::new(10_100, 0));
        assert_eq!(manager.open_position_count(), 0);
        assert_eq!(manager.take_trades().len(), 1);
    }
}
