//! Configuration for the publisher server.

use std::time::Duration;

use clap::Parser;

use publisher::PublisherConfig;
use publisher_common::DEFAULT_IPFS_GATEWAY;
use publisher_core::ListingConfig;

/// NFT collection publisher
///
/// Lists NFT collections: enumerates the collection contract, fetches and
/// parses every token's metadata, mirrors referenced media, and persists
/// the results.
///
/// # Examples
///
/// ```bash
/// # List against a local node, storing under ./publisher-data
/// publisher-server --node-url http://localhost:8545 --secure-token s3cret
///
/// # Production-ish: env-driven secrets, custom gateway
/// NODE_URL=https://rpc.example SECURE_TOKEN=... publisher-server \
///     --ipfs-gateway https://cloudflare-ipfs.com
/// ```
#[derive(Parser, Debug)]
#[command(name = "publisher-server")]
#[command(about = "Publish NFT collection metadata", long_about = None)]
pub struct Config {
    /// Listen host
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(long, default_value = "8080")]
    pub port: u16,

    /// Shared secret expected in the x-secure-token header
    #[arg(long, env = "SECURE_TOKEN", hide_env_values = true)]
    pub secure_token: String,

    /// EVM JSON-RPC node URL
    #[arg(long, env = "NODE_URL")]
    pub node_url: String,

    /// Address used as the eth_call sender
    #[arg(
        long,
        env = "CALLER_ADDRESS",
        default_value = "0x0000000000000000000000000000000000000000"
    )]
    pub caller_address: String,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://publisher.db")]
    pub database_url: String,

    /// Directory for downloaded media
    #[arg(long, default_value = "./publisher-data/media")]
    pub media_root: String,

    /// IPFS gateway used to rewrite ipfs:// token URIs
    #[arg(long, default_value = DEFAULT_IPFS_GATEWAY)]
    pub ipfs_gateway: String,

    /// Worker pool width per listing job
    #[arg(long, default_value = "15")]
    pub worker_count: usize,

    /// Maximum listing jobs running at once
    #[arg(long, default_value = "10")]
    pub max_concurrent_listings: usize,

    /// Listing request rate limit: bucket capacity
    #[arg(long, default_value = "20")]
    pub rate_capacity: u32,

    /// Listing request rate limit: tokens refilled per minute
    #[arg(long, default_value = "20")]
    pub rate_refill: u32,
}

impl Config {
    pub fn into_publisher_config(self) -> PublisherConfig {
        PublisherConfig {
            host: self.host,
            port: self.port,
            secure_token: self.secure_token,
            node_url: self.node_url,
            caller_address: self.caller_address,
            database_url: self.database_url,
            media_root: self.media_root,
            listing: ListingConfig {
                worker_count: self.worker_count,
                max_concurrent_listings: self.max_concurrent_listings,
                rate_capacity: self.rate_capacity,
                rate_refill: self.rate_refill,
                rate_interval: Duration::from_secs(60),
                ipfs_gateway: self.ipfs_gateway,
                ..ListingConfig::default()
            },
        }
    }
}
