//! The Vertex trading platform's command-line entry point: loads a config document, constructs
//! the bus/stores/nodes, and runs either `serve` (live gateway) or `backtest` (replay) — grounded
//! on the teacher's own CLI crate.

pub mod backtest;
pub mod config;
pub mod opt;
pub mod serve;

use opt::{Commands, VertexCli};

pub async fn run(cli: VertexCli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(opt) => serve::run(opt).await,
        Commands::Backtest(opt) => backtest::run(opt).await,
    }
}
