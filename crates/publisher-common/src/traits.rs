//! Collaborator traits consumed by the listing orchestrator.
//!
//! The orchestrator only ever sees these narrow interfaces; the concrete
//! JSON-RPC, HTTP, and SQL implementations live in their own crates.

use anyhow::Result;
use async_trait::async_trait;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::metadata::TokenMetadata;

/// On-chain contract reads needed to enumerate a collection.
///
/// All errors are environment-caused (node down, malformed response) and
/// surface as `anyhow::Error`; the caller decides whether they terminate an
/// enumeration or fail a single token.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `totalSupply()` of the collection contract.
    async fn total_supply(&self, address: &str) -> Result<U256>;

    /// `tokenByIndex(index)` — resolves an enumeration index to a token id.
    async fn token_id_at(&self, address: &str, index: U256) -> Result<U256>;

    /// `tokenURI(token_id)` — the raw metadata URI.
    async fn token_uri(&self, address: &str, token_id: U256) -> Result<String>;
}

/// Response from a metadata document fetch.
#[derive(Debug, Clone)]
pub struct MetadataResponse {
    pub status: u16,
    pub body: String,
}

impl MetadataResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// HTTP fetch of a metadata document.
///
/// A transport error or a non-200 status is a transient failure from the
/// orchestrator's point of view.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<MetadataResponse>;
}

/// Collection fields supplied by the listing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCollection {
    pub address: String,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub symbol: String,
    pub only_gif: bool,
    pub modified_name: bool,
}

/// A persisted collection row.
#[derive(Debug, Clone)]
pub struct CollectionRecord {
    pub id: String,
    pub address: String,
    pub total_supply: u64,
    /// Media flags captured at listing time, needed again when relisting.
    pub only_gif: bool,
    pub modified_name: bool,
}

/// Document-store persistence. All writes are idempotent upserts.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn find_collection(&self, address: &str) -> Result<Option<CollectionRecord>>;

    /// Insert the collection row if absent; returns the existing or new row.
    async fn store_collection_if_absent(
        &self,
        data: &NewCollection,
        total_supply: u64,
    ) -> Result<CollectionRecord>;

    async fn update_total_supply(&self, collection_id: &str, total_supply: u64) -> Result<()>;

    async fn store_token(&self, collection_id: &str, token: &TokenMetadata) -> Result<()>;

    /// Persist the comma-joined failure report for a finished job.
    async fn store_failed_ids(&self, collection_id: &str, ids: &str) -> Result<()>;

    async fn delete_collection(&self, collection_id: &str) -> Result<()>;
}

/// Media variant selector for token image uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Png,
    Gif,
}

impl MediaKind {
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Png => "png",
            MediaKind::Gif => "gif",
        }
    }
}

/// Object-storage upload of referenced media.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload_token_image(
        &self,
        collection_address: &str,
        source_url: &str,
        token_id: &str,
        kind: MediaKind,
    ) -> Result<()>;

    /// Collection-level images (avatar, banner); `name` is the target file name.
    async fn upload_collection_image(
        &self,
        collection_address: &str,
        source_url: &str,
        name: &str,
    ) -> Result<()>;
}
