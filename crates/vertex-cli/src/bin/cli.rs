use clap::Parser;
use vertex_cli::opt::VertexCli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = vertex_cli::run(VertexCli::parse()).await {
        tracing::error!(%err, "vertex command failed");
        std::process::exit(1);
    }
}
