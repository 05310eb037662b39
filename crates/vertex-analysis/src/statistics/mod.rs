mod max_drawdown;
mod profit_factor;
mod sharpe_ratio;
mod win_rate;

pub use max_drawdown::MaxDrawdown;
pub use profit_factor::ProfitFactor;
pub use sharpe_ratio::SharpeRatio;
pub use win_rate::WinRate;
