//! Command-line argument parsing (spec.md §6, §9: "grounded on `nautilus-cli`").

use std::path::PathBuf;

use clap::Parser;

/// Main CLI structure for parsing command-line arguments and options.
#[derive(Debug, Parser)]
#[clap(version, about, author)]
pub struct VertexCli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Available top-level commands for the Vertex CLI.
#[derive(Parser, Debug)]
pub enum Commands {
    /// Runs the live gateway: bus, in-memory stores, task manager, HTTP/WS surface.
    Serve(ServeOpt),
    /// Runs a single replay backtest and prints the resulting `BacktestResult` as JSON.
    Backtest(BacktestOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct ServeOpt {
    /// Path to a TOML document describing strategies/presets/indicator metadata (spec.md §6).
    #[arg(long)]
    pub config: PathBuf,
    /// Address the HTTP/WS surface binds to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: String,
}

#[derive(Parser, Debug, Clone)]
pub struct BacktestOpt {
    /// Path to a TOML document describing strategies/presets/indicator metadata.
    #[arg(long)]
    pub config: PathBuf,
    /// Path to a JSON-lines file of `Bar` records to seed the replay `BarStore` (one per line).
    #[arg(long)]
    pub bars: PathBuf,
    /// Strategy name, matched against the config document's strategy definitions.
    #[arg(long)]
    pub strategy: String,
    /// Instrument symbol, e.g. `BTC-USD`.
    #[arg(long)]
    pub symbol: String,
    /// Bar timeframe: `minute1`, `minute5`, `minute15`, `hour1`, `hour4`, `day1`.
    #[arg(long)]
    pub timeframe: String,
    /// `spot` or `perpetual` (defaults to `spot`).
    #[arg(long)]
    pub market_kind: Option<String>,
    /// Position sizing preset name, matched against the config document.
    #[arg(long)]
    pub position_preset: String,
    /// Unix-seconds start of the replay window, inclusive.
    #[arg(long)]
    pub start: i64,
    /// Unix-seconds end of the replay window, inclusive.
    #[arg(long)]
    pub end: i64,
    /// Starting cash balance.
    #[arg(long, default_value_t = 10_000.0)]
    pub initial_balance: f64,
    /// Strategy parameter overrides, `key=value`, repeatable.
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, f64)>,
}

fn parse_param(raw: &str) -> Result<(String, f64), String> {
    let (key, value) = raw.split_once('=').ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value: f64 = value.parse().map_err(|_| format!("'{value}' is not a number"))?;
    Ok((key.to_string(), value))
}
