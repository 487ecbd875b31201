//! HTTP server implementation.
//!
//! Exposes the listing API: submit a collection for listing, relist
//! individual tokens, delete a collection, plus health and metrics
//! endpoints. Mutating endpoints require the shared secret in the
//! `x-secure-token` header.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use publisher_common::NewCollection;
use publisher_core::{CollectionKind, ListingRequest, ListingService, RejectReason};

pub const SECURE_TOKEN_HEADER: &str = "x-secure-token";

/// HTTP server state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ListingService>,
    pub secure_token: Arc<str>,
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub startup_time: i64,
}

impl AppState {
    pub fn new(
        service: Arc<ListingService>,
        secure_token: &str,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            service,
            secure_token: Arc::from(secure_token),
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            startup_time: chrono::Utc::now().timestamp(),
        }
    }
}

/// Health check response.
#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: i64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KindParam {
    Enumerable,
    Bounded,
    Unbounded,
}

impl From<KindParam> for CollectionKind {
    fn from(kind: KindParam) -> Self {
        match kind {
            KindParam::Enumerable => Self::Enumerable,
            KindParam::Bounded => Self::Bounded,
            KindParam::Unbounded => Self::Unbounded,
        }
    }
}

/// Body of `POST /collections`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCollectionRequest {
    address: String,
    owner: String,
    name: String,
    description: String,
    symbol: String,
    #[serde(default)]
    only_gif: bool,
    #[serde(default)]
    is_modified_token_name: bool,
    #[serde(rename = "type")]
    kind: KindParam,
    #[serde(default)]
    start_index: u64,
    #[serde(default)]
    total_supply: Option<u64>,
    #[serde(default)]
    avatar_url: String,
    #[serde(default)]
    banner_url: String,
}

/// Body of `POST /collections/:address/relist`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelistRequest {
    token_ids: Vec<String>,
}

fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    headers
        .get(SECURE_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|token| token == &*state.secure_token)
}

fn reject_response(reason: RejectReason) -> Response {
    let status = match reason {
        RejectReason::RateLimited | RejectReason::CapacityExceeded => {
            StatusCode::TOO_MANY_REQUESTS
        }
        RejectReason::AlreadyInProgress => StatusCode::CONFLICT,
        RejectReason::AlreadyListed => StatusCode::BAD_REQUEST,
        RejectReason::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, reason.to_string()).into_response()
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = chrono::Utc::now().timestamp();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: now - state.startup_time,
    })
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_collection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ListCollectionRequest>,
) -> Response {
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let kind = CollectionKind::from(body.kind);
    let count = match (kind, body.total_supply) {
        (CollectionKind::Bounded, Some(count)) if count > 0 => count,
        (CollectionKind::Bounded, _) => {
            return (
                StatusCode::BAD_REQUEST,
                "totalSupply is required for bounded collections",
            )
                .into_response();
        }
        (_, supply) => supply.unwrap_or(0),
    };

    let request = ListingRequest {
        collection: NewCollection {
            address: body.address,
            owner: body.owner,
            name: body.name,
            description: body.description,
            symbol: body.symbol,
            only_gif: body.only_gif,
            modified_name: body.is_modified_token_name,
        },
        kind,
        start_index: body.start_index,
        count,
        avatar_url: body.avatar_url,
        banner_url: body.banner_url,
    };

    match state.service.request_listing(request).await {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(reason) => reject_response(reason),
    }
}

async fn relist_tokens(
    State(state): State<AppState>,
    Path(address): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RelistRequest>,
) -> Response {
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let service = Arc::clone(&state.service);
    tokio::spawn(async move {
        if let Err(e) = service.relist_tokens(&address, &body.token_ids).await {
            tracing::error!(
                target: "publisher::http",
                collection = %address,
                error = format!("{e:#}"),
                "relist failed"
            );
        }
    });
    (StatusCode::ACCEPTED, "Accepted").into_response()
}

async fn delete_collection(
    State(state): State<AppState>,
    Path(collection_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match state.service.request_deletion(&collection_id).await {
        Ok(()) => (StatusCode::OK, "Done").into_response(),
        Err(reason) => reject_response(reason),
    }
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/collections", post(list_collection))
        .route("/collections/:address/relist", post(relist_tokens))
        .route("/collections/:id", delete(delete_collection))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use primitive_types::U256;
    use tower::ServiceExt;

    use publisher_common::{
        ChainClient, CollectionRecord, CollectionStore, MediaKind, MediaStore, MetadataClient,
        MetadataResponse, TokenMetadata,
    };
    use publisher_core::ListingConfig;

    struct NullChain;

    #[async_trait]
    impl ChainClient for NullChain {
        async fn total_supply(&self, _address: &str) -> Result<U256> {
            bail!("no chain in tests")
        }
        async fn token_id_at(&self, _address: &str, _index: U256) -> Result<U256> {
            bail!("no chain in tests")
        }
        async fn token_uri(&self, _address: &str, _token_id: U256) -> Result<String> {
            bail!("no chain in tests")
        }
    }

    struct NullMetadata;

    #[async_trait]
    impl MetadataClient for NullMetadata {
        async fn get(&self, _url: &str) -> Result<MetadataResponse> {
            bail!("no metadata in tests")
        }
    }

    struct NullStore;

    #[async_trait]
    impl CollectionStore for NullStore {
        async fn find_collection(&self, _address: &str) -> Result<Option<CollectionRecord>> {
            Ok(None)
        }
        async fn store_collection_if_absent(
            &self,
            data: &NewCollection,
            total_supply: u64,
        ) -> Result<CollectionRecord> {
            Ok(CollectionRecord {
                id: "1".to_string(),
                address: data.address.clone(),
                total_supply,
                only_gif: data.only_gif,
                modified_name: data.modified_name,
            })
        }
        async fn update_total_supply(&self, _collection_id: &str, _supply: u64) -> Result<()> {
            Ok(())
        }
        async fn store_token(&self, _collection_id: &str, _token: &TokenMetadata) -> Result<()> {
            Ok(())
        }
        async fn store_failed_ids(&self, _collection_id: &str, _ids: &str) -> Result<()> {
            Ok(())
        }
        async fn delete_collection(&self, _collection_id: &str) -> Result<()> {
            Ok(())
        }
    }

    struct NullMedia;

    #[async_trait]
    impl MediaStore for NullMedia {
        async fn upload_token_image(
            &self,
            _collection_address: &str,
            _source_url: &str,
            _token_id: &str,
            _kind: MediaKind,
        ) -> Result<()> {
            Ok(())
        }
        async fn upload_collection_image(
            &self,
            _collection_address: &str,
            _source_url: &str,
            _name: &str,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn test_app_with(config: ListingConfig) -> Router {
        let service = ListingService::new(
            Arc::new(NullChain),
            Arc::new(NullMetadata),
            Arc::new(NullStore),
            Arc::new(NullMedia),
            config,
        );
        create_router(AppState::new(service, "secret", None))
    }

    fn test_app() -> Router {
        test_app_with(ListingConfig::default())
    }

    fn list_body() -> String {
        r#"{
            "address": "0xAbC",
            "owner": "0xowner",
            "name": "Test",
            "description": "desc",
            "symbol": "TST",
            "type": "enumerable"
        }"#
        .to_string()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "healthy");
        assert!(health.uptime_seconds >= 0);
    }

    #[tokio::test]
    async fn test_list_collection_requires_token() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/collections")
                    .header("content-type", "application/json")
                    .body(Body::from(list_body()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_collection_rejects_wrong_token() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/collections")
                    .header("content-type", "application/json")
                    .header(SECURE_TOKEN_HEADER, "not-the-secret")
                    .body(Body::from(list_body()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_collection_accepted() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/collections")
                    .header("content-type", "application/json")
                    .header(SECURE_TOKEN_HEADER, "secret")
                    .body(Body::from(list_body()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_bounded_without_supply_is_rejected() {
        let body = r#"{
            "address": "0xAbC",
            "owner": "0xowner",
            "name": "Test",
            "description": "desc",
            "symbol": "TST",
            "type": "bounded"
        }"#;
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/collections")
                    .header("content-type", "application/json")
                    .header(SECURE_TOKEN_HEADER, "secret")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_collection() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/collections/1")
                    .header(SECURE_TOKEN_HEADER, "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_collection_rate_limited() {
        let app = test_app_with(ListingConfig {
            rate_capacity: 0,
            rate_refill: 0,
            ..ListingConfig::default()
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/collections/1")
                    .header(SECURE_TOKEN_HEADER, "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder_is_not_found() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
