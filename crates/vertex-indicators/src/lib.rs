//! Incremental indicator calculators (spec.md §4.3): one stateful object per calculator, O(1)
//! per-bar updates, no rescanning of history.

pub mod average;
pub mod calculator_set;
pub mod indicator;
pub mod momentum;
pub mod volatility;
pub mod volume;

pub use average::{ExponentialMovingAverage, SimpleMovingAverage};
pub use calculator_set::CalculatorSet;
pub use indicator::{CompositeCalculator, Indicator, ScalarCalculator};
pub use momentum::{MovingAverageConvergenceDivergence, RelativeStrengthIndex};
pub use volatility::{AverageTrueRange, BollingerBandsCalculator};
pub use volume::VolumeMovingAverage;
