use anyhow::{Context, Result};
use clap::Parser;
use locus_config::RuntimeConfig;
use std::path::PathBuf;

/// Drains GPS and mobile-inspector location queues, ships them to blob
/// storage and a data warehouse on a fixed cadence.
#[derive(Parser)]
#[command(name = "locus")]
#[command(version)]
#[command(about = "Atomic drain-and-ship pipeline for location events", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (overrides LOCUS_CONFIG).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config).
    #[arg(short, long, value_name = "ADDR")]
    listen_addr: Option<String>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        std::env::set_var("LOCUS_CONFIG", path);
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = RuntimeConfig::load().context("failed to load configuration")?;

    if let Some(listen_addr) = cli.listen_addr {
        config.server.listen_addr = listen_addr;
    }
    if let Some(log_level) = cli.log_level {
        config.server.log_level = log_level;
    }

    locus::init_tracing(&config.server);
    locus::run(config).await
}
