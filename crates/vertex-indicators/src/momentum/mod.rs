mod macd;
mod rsi;

pub use macd::MovingAverageConvergenceDivergence;
pub use rsi::RelativeStrengthIndex;
