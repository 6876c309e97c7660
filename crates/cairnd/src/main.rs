//! `cairnd` — the cairn content-index publisher daemon.
//!
//! Ties the components into a running publisher:
//!
//! - an embedded chain backend under the data directory,
//! - the batcher fed by a local ingest API,
//! - the consumer-facing HTTP publisher serving the chain,
//! - head announcements to the configured endpoints.
//!
//! # Usage
//!
//! ```text
//! cairnd start                 # start with defaults under ~/.cairn
//! cairnd start -c cairn.toml   # start with a config file
//! ```

mod config;
mod ingest;
mod telemetry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cairn_announce::{AnnounceSender, HttpSender, NoopSender};
use cairn_backend::KvBackend;
use cairn_batch::{BatchConfig, CatalogBatcher};
use cairn_chain::{ChainAssembler, ChainConfig};
use cairn_http::{HttpPublisher, HttpPublisherConfig};
use cairn_schema::ProviderId;
use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tracing::info;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "cairnd", version, about = "cairn content-index publisher daemon")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the publisher.
    Start,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Start => start(cli.config.as_deref()).await,
    }
}

async fn start(config_path: Option<&Path>) -> Result<()> {
    let config = CliConfig::load(config_path)?;
    telemetry::init(&config.log.level);

    std::fs::create_dir_all(&config.node.data_dir)
        .with_context(|| format!("creating data dir {}", config.node.data_dir.display()))?;

    let provider_key = load_or_generate_key(&config.provider_key_file())?;
    let provider_id = ProviderId::from(&provider_key.verifying_key());
    info!(provider = %provider_id, "provider identity loaded");

    let backend = Arc::new(KvBackend::open(config.chain_dir())?);

    let chain_config = ChainConfig {
        ad_entries_chunk_size: config.ad_entries_chunk_size(),
        provider_id,
        provider_key: provider_key.clone(),
        provider_addrs: config.provider.addrs.clone(),
        publisher_http_addrs: config.chain.publisher_http_addrs.clone(),
        metadata: config.metadata()?,
        link_codec: config.link_codec(),
    };
    let assembler = Arc::new(ChainAssembler::new(chain_config, backend.clone()));

    let announcer: Arc<dyn AnnounceSender> = if config.announce.endpoints.is_empty() {
        Arc::new(NoopSender)
    } else {
        Arc::new(HttpSender::new(config.announce.endpoints.clone()))
    };

    let batcher = Arc::new(CatalogBatcher::start(
        BatchConfig {
            count_threshold: config.count_threshold(),
            max_mhs_per_advertisement: config.max_mhs_per_advertisement(),
            max_delay: config.max_delay(),
        },
        assembler,
        announcer,
        config.chain.publisher_http_addrs.clone(),
    ));

    let publisher = HttpPublisher::new(HttpPublisherConfig {
        backend,
        topic: config.topic(),
        provider_key,
    });

    // One ctrl-c fans out to both servers through a watch cell.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
        let _ = shutdown_tx.send(true);
    });

    let chain_addr = config.node.listen_addr.clone();
    let ingest_addr = config.node.ingest_addr.clone();
    info!(chain_addr = %chain_addr, ingest_addr = %ingest_addr, "starting publisher");

    let mut chain_shutdown = shutdown_rx.clone();
    let chain_server = publisher.serve_with_shutdown(&chain_addr, async move {
        let _ = chain_shutdown.wait_for(|stop| *stop).await;
    });

    let ingest_router = ingest::router(batcher);
    let mut ingest_shutdown = shutdown_rx;
    let ingest_listener = tokio::net::TcpListener::bind(&ingest_addr).await?;
    let ingest_server = axum::serve(ingest_listener, ingest_router).with_graceful_shutdown(
        async move {
            let _ = ingest_shutdown.wait_for(|stop| *stop).await;
        },
    );

    tokio::try_join!(chain_server, ingest_server)?;
    Ok(())
}

/// Load the provider's ed25519 seed, generating one on first start.
fn load_or_generate_key(path: &Path) -> Result<SigningKey> {
    if path.exists() {
        let encoded = std::fs::read_to_string(path)
            .with_context(|| format!("reading provider key {}", path.display()))?;
        let seed: [u8; 32] = hex::decode(encoded.trim())
            .context("provider key is not valid hex")?
            .try_into()
            .map_err(|_| anyhow::anyhow!("provider key must be a 32-byte seed"))?;
        return Ok(SigningKey::from_bytes(&seed));
    }

    let key = SigningKey::generate(&mut OsRng);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, hex::encode(key.to_bytes()))
        .with_context(|| format!("writing provider key {}", path.display()))?;
    info!(path = %path.display(), "generated new provider key");
    Ok(key)
}
