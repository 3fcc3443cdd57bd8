//! chatgate binary entry point.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatgate::config::Config;
use cli::{Cli, Commands};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("CHATGATE_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Loads `.env` before the log filter reads RUST_LOG.
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing();

    match cli.command {
        None => cli::serve::cmd_serve(config, None, None).await,
        Some(Commands::Serve { bind, port }) => cli::serve::cmd_serve(config, bind, port).await,
        Some(Commands::Quota { action }) => cli::quota::cmd_quota(&config, action),
    }
}
