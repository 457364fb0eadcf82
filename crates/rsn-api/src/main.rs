//! rsn-node binary: runs one validator node of a settlement zone.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rsn_api::{app, node, NodeManifest};

#[derive(Parser)]
#[command(name = "rsn-node", version, about = "Roaming settlement network node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the node from a manifest file.
    Start {
        /// Path to the YAML node manifest.
        #[arg(long, default_value = "rsn-node.yaml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Start { config } => start(config).await,
    }
}

async fn start(config: PathBuf) -> anyhow::Result<()> {
    let mut manifest = NodeManifest::load(&config)
        .with_context(|| format!("loading manifest from {}", config.display()))?;
    manifest.apply_env();

    let state = node::build_state(&manifest).context("assembling node state")?;
    tracing::info!(
        node_id = %state.node_id,
        validators = manifest.validators.len(),
        quorum = manifest.quorum_size(),
        threshold_cents = manifest.threshold_cents,
        "node assembled"
    );

    node::spawn_tick_loop(state.clone(), manifest.tick_interval_secs);

    let router = app(state, manifest.auth_token.clone());
    let listener = tokio::net::TcpListener::bind(&manifest.listen_addr)
        .await
        .with_context(|| format!("binding {}", manifest.listen_addr))?;
    tracing::info!(addr = %manifest.listen_addr, "listening");
    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}
