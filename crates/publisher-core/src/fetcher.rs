//! Per-token fetch pipeline.
//!
//! A token unit resolves its metadata URI (when the enumeration did not
//! already provide one), fetches and parses the document, then fans out
//! follow-up units for media uploads and persistence. Transport failures
//! re-submit the same unit with an incremented attempt counter up to a fixed
//! cap; parse and resolution failures are deterministic and fail the token
//! immediately.

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics::counter;
use primitive_types::U256;
use tracing::{debug, error, warn};

use publisher_common::{
    decode_data_uri, normalize_token_uri, parse_token_metadata, ChainClient, CollectionStore,
    MediaKind, MediaStore, MetadataClient, TokenMetadata,
};

use crate::context::JobContext;
use crate::task::{ResponseCache, TokenTask};

/// Fetch attempts per token before it lands in the failure report.
pub const MAX_FETCH_ATTEMPTS: u32 = 10;

pub struct TokenFetcher {
    chain: Arc<dyn ChainClient>,
    metadata: Arc<dyn MetadataClient>,
    store: Arc<dyn CollectionStore>,
    media: Arc<dyn MediaStore>,
    responses: Arc<ResponseCache>,
    ipfs_gateway: String,
    max_attempts: u32,
}

impl TokenFetcher {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        metadata: Arc<dyn MetadataClient>,
        store: Arc<dyn CollectionStore>,
        media: Arc<dyn MediaStore>,
        responses: Arc<ResponseCache>,
        ipfs_gateway: String,
    ) -> Self {
        Self {
            chain,
            metadata,
            store,
            media,
            responses,
            ipfs_gateway,
            max_attempts: MAX_FETCH_ATTEMPTS,
        }
    }

    /// Submit a token unit onto the job's worker pool.
    pub fn schedule(self: &Arc<Self>, ctx: &Arc<JobContext>, task: TokenTask, attempt: u32) {
        let fetcher = Arc::clone(self);
        let job = Arc::clone(ctx);
        ctx.submit(Box::pin(async move {
            fetcher.process(&job, task, attempt).await;
        }));
    }

    async fn process(self: &Arc<Self>, ctx: &Arc<JobContext>, mut task: TokenTask, attempt: u32) {
        if task.token_uri.is_none() {
            match self.resolve_uri(&task).await {
                Ok(uri) => task.token_uri = Some(uri),
                Err(e) => {
                    // the contract itself rejected the id; retrying the same
                    // call cannot succeed
                    counter!("publisher_tokens_failed_total").increment(1);
                    ctx.record_failure(&task.token_id);
                    debug!(
                        target: "publisher_core::fetcher",
                        collection = %task.collection_address,
                        token_id = %task.token_id,
                        error = format!("{e:#}"),
                        "failed to resolve token URI"
                    );
                    return;
                }
            }
        }
        let Some(url) = task.token_uri.clone() else {
            return;
        };

        if let Some(body) = decode_data_uri(&url) {
            self.finish(ctx, &task, &body);
            return;
        }
        if let Some(body) = self.responses.get(&url) {
            self.finish(ctx, &task, &body);
            return;
        }

        match self.metadata.get(&url).await {
            Ok(response) if response.is_success() => {
                let body = self.responses.insert(url, response.body);
                self.finish(ctx, &task, &body);
            }
            Ok(response) => {
                self.retry_or_fail(ctx, task, attempt, &format!("status {}", response.status));
            }
            Err(e) => {
                self.retry_or_fail(ctx, task, attempt, &format!("{e:#}"));
            }
        }
    }

    async fn resolve_uri(&self, task: &TokenTask) -> Result<String> {
        let token_id = U256::from_dec_str(&task.token_id)
            .with_context(|| format!("invalid token id {}", task.token_id))?;
        let raw = self
            .chain
            .token_uri(&task.collection_address, token_id)
            .await?;
        Ok(normalize_token_uri(&raw, &self.ipfs_gateway))
    }

    fn retry_or_fail(
        self: &Arc<Self>,
        ctx: &Arc<JobContext>,
        task: TokenTask,
        attempt: u32,
        reason: &str,
    ) {
        let next = attempt + 1;
        if next < self.max_attempts {
            counter!("publisher_token_retries_total").increment(1);
            debug!(
                target: "publisher_core::fetcher",
                collection = %task.collection_address,
                token_id = %task.token_id,
                attempt = next,
                reason,
                "transient fetch failure, re-submitting"
            );
            self.schedule(ctx, task, next);
        } else {
            counter!("publisher_tokens_failed_total").increment(1);
            ctx.record_failure(&task.token_id);
            error!(
                target: "publisher_core::fetcher",
                collection = %task.collection_address,
                token_id = %task.token_id,
                url = ?task.token_uri,
                attempts = next,
                reason,
                "token fetch exhausted its retries"
            );
        }
    }

    /// Parse the document and fan out media and persistence units.
    fn finish(&self, ctx: &Arc<JobContext>, task: &TokenTask, body: &str) {
        let mut meta = match parse_token_metadata(body) {
            Ok(meta) => meta,
            Err(e) => {
                counter!("publisher_tokens_failed_total").increment(1);
                ctx.record_failure(&task.token_id);
                error!(
                    target: "publisher_core::fetcher",
                    collection = %task.collection_address,
                    token_id = %task.token_id,
                    error = format!("{e:#}"),
                    "cannot parse token metadata"
                );
                return;
            }
        };

        meta.token_id = task.token_id.clone();
        if task.modified_name {
            meta.name = format!("{} {}", meta.name, task.token_id);
        }

        self.dispatch_media(ctx, task, &mut meta);
        self.dispatch_store(ctx, task, meta);
    }

    /// Pick which media variants get uploaded.
    ///
    /// A GIF-only collection uploads `image` as the GIF. Otherwise a present
    /// `image_png` means `image` is the GIF source and `image_png` the PNG;
    /// a present `gif` means `image` is the PNG and `gif` the GIF; plain
    /// collections upload `image` as the PNG.
    fn dispatch_media(&self, ctx: &Arc<JobContext>, task: &TokenTask, meta: &mut TokenMetadata) {
        let mut uploads: Vec<(String, MediaKind)> = Vec::new();
        let image = meta.image.clone().filter(|s| !s.is_empty());
        let image_png = meta.image_png.clone().filter(|s| !s.is_empty());
        let gif = meta.gif.clone().filter(|s| !s.is_empty());

        if task.only_gif {
            if let Some(image) = image {
                uploads.push((image, MediaKind::Gif));
                meta.is_gif = true;
            }
        } else if let Some(png) = image_png {
            uploads.push((png, MediaKind::Png));
            if let Some(image) = image {
                uploads.push((image, MediaKind::Gif));
            }
            meta.is_gif = true;
        } else if let Some(gif) = gif {
            if let Some(image) = image {
                uploads.push((image, MediaKind::Png));
            }
            uploads.push((gif, MediaKind::Gif));
            meta.is_gif = true;
        } else if let Some(image) = image {
            uploads.push((image, MediaKind::Png));
        }

        for (source, kind) in uploads {
            let media = Arc::clone(&self.media);
            let job = Arc::clone(ctx);
            let address = task.collection_address.clone();
            let token_id = task.token_id.clone();
            let source = normalize_token_uri(&source, &self.ipfs_gateway);
            ctx.submit(Box::pin(async move {
                if let Err(e) = media
                    .upload_token_image(&address, &source, &token_id, kind)
                    .await
                {
                    job.record_failure(&token_id);
                    warn!(
                        target: "publisher_core::fetcher",
                        collection = %address,
                        token_id = %token_id,
                        source = %source,
                        error = format!("{e:#}"),
                        "token image upload failed"
                    );
                }
            }));
        }
    }

    fn dispatch_store(&self, ctx: &Arc<JobContext>, task: &TokenTask, meta: TokenMetadata) {
        let store = Arc::clone(&self.store);
        let job = Arc::clone(ctx);
        let collection_id = task.collection_id.clone();
        ctx.submit(Box::pin(async move {
            match store.store_token(&collection_id, &meta).await {
                Ok(()) => counter!("publisher_tokens_stored_total").increment(1),
                Err(e) => {
                    job.record_failure(&meta.token_id);
                    error!(
                        target: "publisher_core::fetcher",
                        collection_id = %collection_id,
                        token_id = %meta.token_id,
                        error = format!("{e:#}"),
                        "failed to persist token"
                    );
                }
            }
        }));
    }
}
