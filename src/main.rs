use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use llm_relay::config::RelayConfig;
use llm_relay::server::{self, AppState};

#[derive(Parser)]
#[command(name = "llm-relay", about = "Streaming relay for OpenAI, Claude, Gemini and vLLM")]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "LLM_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RelayConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RelayConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    let addr = config.listen_addr()?;
    let state = AppState::from_config(&config)?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    server::serve(listener, state).await?;
    Ok(())
}
