//! Open positions and closed trades (spec.md §3).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ustr::Ustr;
use vertex_core::UnixSeconds;

use crate::signal::Side;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Position {
    pub strategy: Ustr,
    pub symbol: Ustr,
    pub side: Side,
    pub quantity: f64,
    pub usd_amount: Decimal,
    pub entry_price: f64,
    pub entry_time: UnixSeconds,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub high_watermark: f64,
    pub low_watermark: f64,
}

impl Position {
    #[must_use]
    pub fn new(
        strategy: Ustr,
        symbol: Ustr,
        side: Side,
        quantity: f64,
        usd_amount: Decimal,
        entry_price: f64,
        entry_time: UnixSeconds,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Self {
        Self {
            strategy,
            symbol,
            side,
            quantity,
            usd_amount,
            entry_price,
            entry_time,
            stop_loss,
            take_profit,
            high_watermark: entry_price,
            low_watermark: entry_price,
        }
    }

    /// Updates the trailing watermarks on each subsequent bar (spec.md §3 lifecycle, §4.6).
    pub fn update_watermarks(&mut self, bar_high: f64, bar_low: f64) {
        self.high_watermark = self.high_watermark.max(bar_high);
        self.low_watermark = self.low_watermark.min(bar_low);
    }

    /// Realized P&L for closing the whole position at `exit_price` (spec.md §4.7).
    #[must_use]
    pub fn realized_pnl(&self, exit_price: f64) -> f64 {
        match self.side {
            Side::Long => (exit_price - self.entry_price) * self.quantity,
            Side::Short => (self.entry_price - exit_price) * self.quantity,
        }
    }
}

/// A completed round-trip, recorded by the position manager on close (spec.md §4.7, §8).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Trade {
    pub strategy: Ustr,
    pub symbol: Ustr,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: UnixSeconds,
    pub exit_price: f64,
    pub exit_time: UnixSeconds,
    pub realized_pnl: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_pnl_is_exit_minus_entry_times_qty() {
        let pos = Position::new(
            Ustr::from("s"),
            Ustr::from("BTCUSDT"),
            Side::Long,
            1.0,
            Decimal::new(10000, 0),
            100.0,
            UnixSeconds(0),
            None,
            None,
        );
        assert_eq!(pos.realized_pnl(110.0), 10.0);
    }

    #[test]
    fn short_pnl_is_reversed() {
        let pos = Position::new(
            Ustr::from("s"),
            Ustr::from("BTCUSDT"),
            Side::Short,
            1.0,
            Decimal::new(10000, 0),
            100.0,
            UnixSeconds(0),
            None,
            None,
        );
        assert_eq!(pos.realized_pnl(90.0), 10.0);
        assert_eq!(pos.realized_pnl(110.0), -10.0);
    }

    #[test]
    fn watermarks_only_move_favorably() {
        let mut pos = Position::new(
            Ustr::from("s"),
            Ustr::from("BTCUSDT"),
            Side::Long,
            1.0,
            Decimal::new(10000, 0),
            100.0,
            UnixSeconds(0),
            None,
            None,
        );
        pos.update_watermarks(105.0, 98.0);
        assert_eq!(pos.high_watermark, 105.0);
        assert_eq!(pos.low_watermark, 98.0);
        pos.update_watermarks(102.0, 99.0);
        assert_eq!(pos.high_watermark, 105.0);
        assert_eq!(pos.low_watermark, 98.0);
    }
}
