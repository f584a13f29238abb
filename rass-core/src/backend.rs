//! The backend contract shared by every storage engine.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{BackendKind, RassConfig};
use crate::document::Document;
use crate::error::Result;
use crate::request::{
    EmbedRequest, EmbedResponse, RefreshRequest, RefreshResponse, SearchRequest, SearchResponse,
};
use crate::simulated::SimulatedBackend;

/// The operations every backend exposes to the HTTP layer.
///
/// Implementations must produce identical response shapes and be safe to
/// call concurrently through a shared `Arc<dyn RassBackend>`.
///
/// # Example
///
/// ```rust,ignore
/// use rass_core::{RassBackend, RassConfig, EmbedRequest, SearchRequest, build_backend};
///
/// let backend = build_backend(&RassConfig::default()).await?;
/// backend.embed(EmbedRequest::new("doc-1", "ai healthcare machine learning")).await;
/// let response = backend.search(SearchRequest::new("ai healthcare")).await?;
/// ```
#[async_trait]
pub trait RassBackend: Send + Sync {
    /// The kind of engine behind this backend.
    fn kind(&self) -> BackendKind;

    /// Prepare backend resources. Called once at startup.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Insert or overwrite a document. Failures are reported in the response
    /// with `status: error`, never as an `Err`.
    async fn embed(&self, request: EmbedRequest) -> EmbedResponse;

    /// Rank stored documents against a query.
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse>;

    /// Fetch a document by id.
    ///
    /// Returns [`RassError::NotFound`](crate::RassError::NotFound) for unknown ids.
    async fn get_item(&self, id: &str) -> Result<Document>;

    /// Re-derive the embeddings of the selected documents. Per-document
    /// failures are counted in the response, never returned as an `Err`.
    async fn refresh(&self, request: RefreshRequest) -> RefreshResponse;
}

/// Create and initialize the backend selected by `config.backend`.
///
/// # Errors
///
/// Returns [`RassError::Config`](crate::RassError::Config) if the
/// configuration is invalid or names a backend this build does not include,
/// or any error raised by the backend's [`initialize`](RassBackend::initialize).
pub async fn build_backend(config: &RassConfig) -> Result<Arc<dyn RassBackend>> {
    config.validate()?;
    let backend: Arc<dyn RassBackend> = match config.backend {
        BackendKind::Simulated => Arc::new(SimulatedBackend::from_config(config).await?),
        BackendKind::OpenSearch => open_search_backend(config)?,
    };
    backend.initialize().await?;
    info!(backend = %backend.kind(), dimensions = config.dimensions, "backend ready");
    Ok(backend)
}

#[cfg(feature = "opensearch")]
fn open_search_backend(config: &RassConfig) -> Result<Arc<dyn RassBackend>> {
    Ok(Arc::new(crate::opensearch::OpenSearchBackend::from_config(config)?))
}

#[cfg(not(feature = "opensearch"))]
fn open_search_backend(_config: &RassConfig) -> Result<Arc<dyn RassBackend>> {
    Err(crate::error::RassError::Config(
        "the opensearch backend requires the `opensearch` feature".to_string(),
    ))
}
