use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rass_core::{
    Document, EmbedRequest, EmbedResponse, RassBackend, RefreshRequest, RefreshResponse,
    SearchRequest, SearchResponse,
};
use serde_json::{Value, json};
use subtle::ConstantTimeEq;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ApiError;

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn RassBackend>,
    /// When set, every route except `/health` requires this key.
    pub api_key: Option<String>,
}

impl AppState {
    pub fn new(backend: Arc<dyn RassBackend>) -> Self {
        Self { backend, api_key: None }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.backend.kind())
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Listener and request limits.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body size in bytes.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 3000, body_limit: 10 * 1024 * 1024 }
    }
}

/// Build the router with the default body limit.
pub fn app_router(state: AppState) -> Router {
    app_router_with_limit(state, ServerConfig::default().body_limit)
}

pub fn app_router_with_limit(state: AppState, body_limit: usize) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let protected = Router::new()
        .route("/embed", post(embed))
        .route("/search", post(search))
        .route("/item/{id}", get(get_item))
        .route("/refresh", post(refresh))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind `config.host:config.port` and serve until the process exits.
pub async fn run_server(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    let backend = state.backend.kind();
    let app = app_router_with_limit(state, config.body_limit);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, %backend, "rass-server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };
    let authorized = request
        .headers()
        .get(API_KEY_HEADER)
        .is_some_and(|value| value.as_bytes().ct_eq(expected.as_bytes()).into());
    if authorized {
        next.run(request).await
    } else {
        ApiError::Unauthorized.into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "backend": state.backend.kind(),
    }))
}

async fn embed(
    State(state): State<AppState>,
    Json(request): Json<EmbedRequest>,
) -> Json<EmbedResponse> {
    Json(state.backend.embed(request).await)
}

async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    Ok(Json(state.backend.search(request).await?))
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    Ok(Json(state.backend.get_item(&id).await?))
}

async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Json<RefreshResponse> {
    Json(state.backend.refresh(request).await)
}
