//! The listing service: admission, job spawning, and the three enumeration
//! strategies.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use primitive_types::U256;
use tracing::{error, info, warn};

use publisher_common::{
    normalize_address, normalize_token_uri, ChainClient, CollectionRecord, CollectionStore,
    MediaStore, MetadataClient, NewCollection, DEFAULT_IPFS_GATEWAY,
};

use crate::admission::{Admission, AdmissionCache, DEFAULT_ADMISSION_TTL};
use crate::context::{JobContext, DEFAULT_WORKER_COUNT};
use crate::error::RejectReason;
use crate::fetcher::TokenFetcher;
use crate::ratelimit::RateLimiter;
use crate::report::persist_failure_report;
use crate::task::{ResponseCache, TokenTask};

/// How the collection contract is enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// ERC721Enumerable: `totalSupply` then `tokenByIndex` per slot.
    Enumerable,
    /// Sequential ids with a caller-supplied count.
    Bounded,
    /// Sequential ids probed until `tokenURI` stops answering.
    Unbounded,
}

/// A validated listing request, ready for admission.
#[derive(Debug, Clone)]
pub struct ListingRequest {
    pub collection: NewCollection,
    pub kind: CollectionKind,
    /// First token id (bounded/unbounded) or enumeration index (enumerable).
    pub start_index: u64,
    /// Token count for [`CollectionKind::Bounded`]; ignored otherwise.
    pub count: u64,
    pub avatar_url: String,
    pub banner_url: String,
}

#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub worker_count: usize,
    pub max_concurrent_listings: usize,
    pub admission_ttl: Duration,
    pub rate_capacity: u32,
    pub rate_refill: u32,
    pub rate_interval: Duration,
    pub ipfs_gateway: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            max_concurrent_listings: 10,
            admission_ttl: DEFAULT_ADMISSION_TTL,
            rate_capacity: 20,
            rate_refill: 20,
            rate_interval: Duration::from_secs(60),
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_owned(),
        }
    }
}

pub struct ListingService {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn CollectionStore>,
    media: Arc<dyn MediaStore>,
    fetcher: Arc<TokenFetcher>,
    admission: AdmissionCache,
    limiter: RateLimiter,
    config: ListingConfig,
}

impl ListingService {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        metadata: Arc<dyn MetadataClient>,
        store: Arc<dyn CollectionStore>,
        media: Arc<dyn MediaStore>,
        config: ListingConfig,
    ) -> Arc<Self> {
        let fetcher = Arc::new(TokenFetcher::new(
            Arc::clone(&chain),
            metadata,
            Arc::clone(&store),
            Arc::clone(&media),
            Arc::new(ResponseCache::new()),
            config.ipfs_gateway.clone(),
        ));
        Arc::new(Self {
            chain,
            store,
            media,
            fetcher,
            admission: AdmissionCache::new(config.max_concurrent_listings, config.admission_ttl),
            limiter: RateLimiter::new(config.rate_capacity, config.rate_refill, config.rate_interval),
            config,
        })
    }

    /// Admit a listing request and spawn its background job.
    ///
    /// Checks run in order: rate limit, per-address mutual exclusion and
    /// capacity, then the already-listed lookup. `Ok` means the job was
    /// accepted, not that it finished.
    pub async fn request_listing(
        self: &Arc<Self>,
        mut request: ListingRequest,
    ) -> std::result::Result<(), RejectReason> {
        request.collection.address = normalize_address(&request.collection.address);
        let key = request.collection.address.clone();

        if !self.limiter.try_consume(1) {
            return Err(RejectReason::RateLimited);
        }
        match self.admission.try_acquire(&key) {
            Admission::Admitted => {}
            Admission::AlreadyInProgress => return Err(RejectReason::AlreadyInProgress),
            Admission::CapacityExceeded => return Err(RejectReason::CapacityExceeded),
        }

        match self.store.find_collection(&key).await {
            Ok(None) => {}
            Ok(Some(_)) => {
                self.admission.release(&key);
                return Err(RejectReason::AlreadyListed);
            }
            Err(e) => {
                self.admission.release(&key);
                error!(
                    target: "publisher_core::listing",
                    collection = %key,
                    error = format!("{e:#}"),
                    "collection lookup failed"
                );
                return Err(RejectReason::Internal);
            }
        }

        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.run_listing_job(request).await;
            service.admission.release(&key);
        });
        Ok(())
    }

    async fn run_listing_job(self: &Arc<Self>, request: ListingRequest) {
        let address = request.collection.address.clone();
        info!(
            target: "publisher_core::listing",
            collection = %address,
            kind = ?request.kind,
            "fetching tokens for collection started"
        );

        let ctx = JobContext::new(self.config.worker_count);
        self.submit_collection_images(&ctx, &request);

        let outcome = match request.kind {
            CollectionKind::Enumerable => self.list_enumerable(&ctx, &request).await,
            CollectionKind::Bounded => self.list_bounded(&ctx, &request).await,
            CollectionKind::Unbounded => self.list_unbounded(&ctx, &request).await,
        };

        let collection_id = match outcome {
            Ok(id) => id,
            Err(e) => {
                error!(
                    target: "publisher_core::listing",
                    collection = %address,
                    error = format!("{e:#}"),
                    "collection listing aborted"
                );
                // finish whatever was already scheduled
                ctx.drain().await;
                return;
            }
        };

        ctx.drain().await;
        info!(
            target: "publisher_core::listing",
            collection = %address,
            elapsed_secs = ctx.elapsed().as_secs(),
            failed = ctx.failed_ids().len(),
            "fetching tokens for collection finished"
        );
        persist_failure_report(self.store.as_ref(), &collection_id, &ctx.failed_ids()).await;
    }

    async fn list_enumerable(
        &self,
        ctx: &Arc<JobContext>,
        request: &ListingRequest,
    ) -> Result<String> {
        let address = &request.collection.address;
        let supply = self
            .chain
            .total_supply(address)
            .await
            .context("totalSupply call failed")?
            .low_u64();

        let record = self
            .store
            .store_collection_if_absent(&request.collection, supply)
            .await?;

        for index in request.start_index..supply {
            match self.chain.token_id_at(address, U256::from(index)).await {
                Ok(token_id) => {
                    self.fetcher
                        .schedule(ctx, task_for(&record, request, token_id.to_string(), None), 0);
                }
                Err(e) => {
                    // the slot stays unlisted; no token id to put in the report
                    warn!(
                        target: "publisher_core::listing",
                        collection = %address,
                        index,
                        error = format!("{e:#}"),
                        "failed to resolve token id at index"
                    );
                }
            }
        }
        Ok(record.id)
    }

    async fn list_bounded(
        &self,
        ctx: &Arc<JobContext>,
        request: &ListingRequest,
    ) -> Result<String> {
        let record = self
            .store
            .store_collection_if_absent(&request.collection, request.count)
            .await?;

        let end = request.start_index.saturating_add(request.count);
        for token_id in request.start_index..end {
            self.fetcher
                .schedule(ctx, task_for(&record, request, token_id.to_string(), None), 0);
        }
        Ok(record.id)
    }

    /// Probe sequential ids until `tokenURI` fails, then record the probed
    /// count as the supply. A transient node error ends the enumeration the
    /// same way; the failing id itself is not scheduled.
    async fn list_unbounded(
        &self,
        ctx: &Arc<JobContext>,
        request: &ListingRequest,
    ) -> Result<String> {
        let address = &request.collection.address;
        let record = self
            .store
            .store_collection_if_absent(&request.collection, request.start_index)
            .await?;

        let mut token_id = request.start_index;
        loop {
            match self.chain.token_uri(address, U256::from(token_id)).await {
                Ok(raw) => {
                    let uri = normalize_token_uri(&raw, &self.config.ipfs_gateway);
                    self.fetcher
                        .schedule(ctx, task_for(&record, request, token_id.to_string(), Some(uri)), 0);
                    token_id += 1;
                }
                Err(e) => {
                    info!(
                        target: "publisher_core::listing",
                        collection = %address,
                        token_id,
                        error = format!("{e:#}"),
                        "token URI probe failed, treating as end of collection"
                    );
                    self.store.update_total_supply(&record.id, token_id).await?;
                    return Ok(record.id);
                }
            }
        }
    }

    fn submit_collection_images(&self, ctx: &Arc<JobContext>, request: &ListingRequest) {
        let media = Arc::clone(&self.media);
        let address = request.collection.address.clone();
        let avatar = request.avatar_url.clone();
        let banner = request.banner_url.clone();
        ctx.submit(Box::pin(async move {
            for (url, name) in [(avatar, "avatar.png"), (banner, "banner.png")] {
                if url.is_empty() {
                    info!(
                        target: "publisher_core::listing",
                        collection = %address,
                        name,
                        "collection image url is empty, skipping"
                    );
                    continue;
                }
                if let Err(e) = media.upload_collection_image(&address, &url, name).await {
                    warn!(
                        target: "publisher_core::listing",
                        collection = %address,
                        name,
                        error = format!("{e:#}"),
                        "collection image upload failed"
                    );
                }
            }
        }));
    }

    /// Re-run the fetch pipeline for specific token ids of an existing
    /// collection. Runs to completion rather than in the background, and
    /// bypasses admission: the caller targets tokens, not the collection.
    pub async fn relist_tokens(&self, address: &str, token_ids: &[String]) -> Result<()> {
        let address = normalize_address(address);
        let record = self
            .store
            .find_collection(&address)
            .await?
            .with_context(|| format!("collection {address} is not listed"))?;

        info!(
            target: "publisher_core::listing",
            collection = %address,
            tokens = token_ids.len(),
            "relisting tokens"
        );

        let ctx = JobContext::new(self.config.worker_count);
        for token_id in token_ids {
            if token_id.trim().is_empty() {
                continue;
            }
            let task = TokenTask {
                collection_id: record.id.clone(),
                collection_address: record.address.clone(),
                token_id: token_id.trim().to_owned(),
                token_uri: None,
                only_gif: record.only_gif,
                modified_name: record.modified_name,
            };
            self.fetcher.schedule(&ctx, task, 0);
        }

        ctx.drain().await;
        persist_failure_report(self.store.as_ref(), &record.id, &ctx.failed_ids()).await;
        Ok(())
    }

    /// Delete a listed collection. Deletion shares the request token bucket
    /// with listing.
    pub async fn request_deletion(
        &self,
        collection_id: &str,
    ) -> std::result::Result<(), RejectReason> {
        if !self.limiter.try_consume(1) {
            return Err(RejectReason::RateLimited);
        }
        info!(
            target: "publisher_core::listing",
            collection_id = %collection_id,
            "deleting collection"
        );
        if let Err(e) = self.store.delete_collection(collection_id).await {
            error!(
                target: "publisher_core::listing",
                collection_id = %collection_id,
                error = format!("{e:#}"),
                "deletion failed"
            );
            return Err(RejectReason::Internal);
        }
        Ok(())
    }
}

fn task_for(
    record: &CollectionRecord,
    request: &ListingRequest,
    token_id: String,
    token_uri: Option<String>,
) -> TokenTask {
    TokenTask {
        collection_id: record.id.clone(),
        collection_address: request.collection.address.clone(),
        token_id,
        token_uri,
        only_gif: request.collection.only_gif,
        modified_name: request.collection.modified_name,
    }
}
