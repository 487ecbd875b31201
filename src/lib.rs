//! NFT collection metadata publishing service.
//!
//! Wires the chain client, SQLite store, media store, and listing
//! orchestrator together and serves the HTTP API. The library crate holds
//! the wiring and the HTTP surface; the domain logic lives in the
//! `publisher-*` crates.

pub mod http;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::info;

use publisher_chain::EthCallClient;
use publisher_common::HttpMetadataClient;
use publisher_core::{ListingConfig, ListingService};
use publisher_storage::{LocalMediaStore, SqliteCollectionStore};

pub use http::{create_router, AppState};

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub host: String,
    pub port: u16,
    pub secure_token: String,
    pub node_url: String,
    pub caller_address: String,
    pub database_url: String,
    pub media_root: String,
    pub listing: ListingConfig,
}

/// Build the service and serve the HTTP API until shutdown.
pub async fn run(config: PublisherConfig) -> Result<()> {
    let store = Arc::new(SqliteCollectionStore::connect(&config.database_url).await?);
    let media = Arc::new(LocalMediaStore::new(&config.media_root)?);
    let chain = Arc::new(EthCallClient::new(
        config.node_url.clone(),
        config.caller_address.clone(),
    )?);
    let metadata = Arc::new(HttpMetadataClient::new()?);

    let service = ListingService::new(chain, metadata, store, media, config.listing.clone());

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    let state = AppState::new(service, &config.secure_token, Some(metrics));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(target: "publisher", %addr, "publisher listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!(target: "publisher", "shutdown signal received");
}
