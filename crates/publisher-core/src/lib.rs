//! Listing orchestration for the NFT publisher.
//!
//! A listing job enumerates a collection contract, fetches and parses every
//! token's metadata document on a bounded worker pool, uploads referenced
//! media, and persists the results. Individual token failures are retried a
//! fixed number of times and aggregated into a per-collection failure report
//! once the job's completion barrier drains.

pub mod admission;
pub mod context;
pub mod error;
pub mod fetcher;
pub mod ratelimit;
pub mod report;
pub mod service;
pub mod task;

pub use admission::{Admission, AdmissionCache};
pub use context::JobContext;
pub use error::RejectReason;
pub use fetcher::TokenFetcher;
pub use ratelimit::RateLimiter;
pub use service::{CollectionKind, ListingConfig, ListingRequest, ListingService};
pub use task::{ResponseCache, TokenTask};
