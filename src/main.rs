//! Main entry point for the tb-exporter CLI

use clap::Parser;
use tb_exporter::cli::Cli;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
///
/// Logs go to stderr so they never interleave with the report on stdout.
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tb_exporter=warn"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = cli.execute().await.map_err(|e| anyhow::anyhow!(e)) {
        error!("Export failed: {:#}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
