//! # rass-core
//!
//! Backend contract and in-process reference implementation for RASS, a
//! document embedding and search service.
//!
//! ## Overview
//!
//! - [`Vectorizer`] / [`HashVectorizer`] - deterministic text to vector conversion
//! - [`DocumentStore`] - concurrent upsert-only document storage
//! - [`Ranker`] - filtering, cosine scoring, pagination, and highlights
//! - [`RassBackend`] - the contract every backend implements
//! - [`SimulatedBackend`] - the in-process backend
//! - `opensearch::OpenSearchBackend` - an OpenSearch cluster (feature `opensearch`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rass_core::{EmbedRequest, RassConfig, SearchRequest, build_backend};
//!
//! # async fn run() -> rass_core::Result<()> {
//! let backend = build_backend(&RassConfig::default()).await?;
//! backend.embed(EmbedRequest::new("doc-1", "ai healthcare machine learning")).await;
//! let response = backend.search(SearchRequest::new("ai healthcare")).await?;
//! assert_eq!(response.results[0].id, "doc-1");
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod document;
pub mod error;
#[cfg(feature = "opensearch")]
pub mod opensearch;
pub mod ranker;
pub mod request;
pub mod simulated;
pub mod store;
pub mod vectorizer;

pub use backend::{RassBackend, build_backend};
pub use config::{BackendKind, OpenSearchConfig, RassConfig, RassConfigBuilder};
pub use document::{Document, DocumentMetadata, SearchHit};
pub use error::{RassError, Result};
pub use ranker::{Highlighter, Page, RankedPage, Ranker, cosine_similarity};
pub use request::{
    DateRange, EmbedRequest, EmbedResponse, OperationStatus, RefreshRequest, RefreshResponse,
    SearchFilters, SearchRequest, SearchResponse,
};
pub use simulated::SimulatedBackend;
pub use store::{DocumentStore, RefreshOutcome};
pub use vectorizer::{HashVectorizer, Vectorizer};
