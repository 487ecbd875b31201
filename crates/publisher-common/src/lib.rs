//! Common types and collaborator traits for the NFT publisher.
//!
//! Defines the narrow interfaces the listing orchestrator consumes (chain
//! calls, metadata fetching, persistence, media upload) plus shared helpers
//! for URL normalization and metadata parsing.

pub mod data_uri;
pub mod http;
pub mod metadata;
pub mod traits;
pub mod url;

pub use data_uri::decode_data_uri;
pub use http::HttpMetadataClient;
pub use metadata::{parse_token_metadata, Attribute, TokenMetadata};
pub use traits::{
    ChainClient, CollectionRecord, CollectionStore, MediaKind, MediaStore, MetadataClient,
    MetadataResponse, NewCollection,
};
pub use url::{normalize_token_uri, DEFAULT_IPFS_GATEWAY};

/// Normalize a contract address for use as an identity key.
///
/// Addresses arrive in mixed case from callers; every lookup and admission
/// check goes through the lower-cased form.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}
