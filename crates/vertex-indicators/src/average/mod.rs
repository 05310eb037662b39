mod ema;
mod sma;

pub use ema::ExponentialMovingAverage;
pub use sma::SimpleMovingAverage;
