//! In-process reference backend.
//!
//! [`SimulatedBackend`] composes a [`Vectorizer`], a [`DocumentStore`] and a
//! [`Ranker`]. It needs no external services and is what tests and local
//! development run against. Every other backend must match its observable
//! behavior.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::backend::RassBackend;
use crate::config::{BackendKind, RassConfig};
use crate::document::{Document, DocumentMetadata};
use crate::error::{RassError, Result};
use crate::ranker::Ranker;
use crate::request::{
    EmbedRequest, EmbedResponse, RefreshRequest, RefreshResponse, SearchRequest, SearchResponse,
};
use crate::store::{DocumentStore, vectorize_checked};
use crate::vectorizer::{HashVectorizer, Vectorizer};

/// The in-memory implementation of [`RassBackend`].
pub struct SimulatedBackend {
    vectorizer: Arc<dyn Vectorizer>,
    store: DocumentStore,
    ranker: Ranker,
}

impl SimulatedBackend {
    /// Create an empty backend from its parts.
    pub fn new(vectorizer: Arc<dyn Vectorizer>, ranker: Ranker) -> Self {
        Self { vectorizer, store: DocumentStore::new(), ranker }
    }

    /// Create a backend using a [`HashVectorizer`] with the configured
    /// dimension and salt, seeding sample documents if requested.
    pub async fn from_config(config: &RassConfig) -> Result<Self> {
        let vectorizer = HashVectorizer::with_salt(config.dimensions, config.salt.clone())?;
        let backend = Self::new(Arc::new(vectorizer), Ranker::from_config(config));
        if config.seed_sample_data {
            backend.seed_sample_data().await?;
        }
        Ok(backend)
    }

    /// The underlying document store.
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Store the demonstration documents, overwriting any with the same ids.
    pub async fn seed_sample_data(&self) -> Result<()> {
        for sample in SAMPLE_DOCUMENTS {
            let embedding = vectorize_checked(self.vectorizer.as_ref(), sample.content)?;
            let created_at: DateTime<Utc> = sample.created_at.parse().map_err(|e| {
                RassError::Config(format!("invalid sample timestamp '{}': {e}", sample.created_at))
            })?;
            let metadata = DocumentMetadata {
                title: Some(sample.title.to_string()),
                source: Some(sample.source.to_string()),
                application: Some(sample.application.to_string()),
                author: Some(sample.author.to_string()),
                url: Some(sample.url.to_string()),
                ..Default::default()
            };
            self.store.upsert(sample.id, sample.content, metadata, embedding, created_at).await;
        }
        info!(count = SAMPLE_DOCUMENTS.len(), "seeded sample documents");
        Ok(())
    }
}

#[async_trait]
impl RassBackend for SimulatedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    async fn embed(&self, request: EmbedRequest) -> EmbedResponse {
        let embedding = match vectorize_checked(self.vectorizer.as_ref(), &request.content) {
            Ok(embedding) => embedding,
            Err(e) => {
                error!(document.id = %request.id, error = %e, "embedding failed");
                return EmbedResponse::error(request.id, format!("Failed to embed document: {e}"));
            }
        };

        let metadata = request.metadata.unwrap_or_default();
        let document =
            self.store.upsert(&request.id, &request.content, metadata, embedding, Utc::now()).await;
        info!(document.id = %document.id, "embedded document");
        EmbedResponse::success(document.id, document.embedding)
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        let query_vector = vectorize_checked(self.vectorizer.as_ref(), &request.query)?;
        let page = self.ranker.page(request.offset, request.limit);

        let ranked = self
            .store
            .with_documents(|documents| {
                self.ranker.rank(
                    &request.query,
                    &query_vector,
                    request.filters.as_ref(),
                    page,
                    documents.iter().map(|guard| &**guard),
                )
            })
            .await
            .inspect_err(|e| error!(error = %e, "search failed"))?;

        let took_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(total = ranked.total, returned = ranked.hits.len(), took_ms, "search completed");

        Ok(SearchResponse {
            results: ranked.hits,
            total: ranked.total,
            offset: ranked.page.offset,
            limit: ranked.page.limit,
            query: request.query,
            took_ms,
        })
    }

    async fn get_item(&self, id: &str) -> Result<Document> {
        self.store.get(id).await
    }

    async fn refresh(&self, request: RefreshRequest) -> RefreshResponse {
        let outcome = self.store.refresh(&request, self.vectorizer.as_ref()).await;
        info!(processed = outcome.processed, errors = outcome.errors, "refresh completed");
        RefreshResponse::from_counts(outcome.processed, outcome.errors)
    }
}

struct SampleDocument {
    id: &'static str,
    content: &'static str,
    title: &'static str,
    source: &'static str,
    application: &'static str,
    author: &'static str,
    url: &'static str,
    created_at: &'static str,
}

const SAMPLE_DOCUMENTS: [SampleDocument; 3] = [
    SampleDocument {
        id: "doc-1",
        content: "This is a sample document about machine learning and artificial intelligence \
                  in healthcare.",
        title: "AI in Healthcare",
        source: "articles",
        application: "mediawiki",
        author: "Dr. Smith",
        url: "https://example.com/ai-healthcare",
        created_at: "2024-01-01T10:00:00Z",
    },
    SampleDocument {
        id: "doc-2",
        content: "Software development best practices including code review and testing \
                  methodologies.",
        title: "Development Best Practices",
        source: "documentation",
        application: "redmine",
        author: "Jane Doe",
        url: "https://example.com/dev-practices",
        created_at: "2024-01-02T14:30:00Z",
    },
    SampleDocument {
        id: "doc-3",
        content: "Team communication strategies and remote work collaboration tools for \
                  distributed teams.",
        title: "Remote Team Communication",
        source: "chat",
        application: "rocketchat",
        author: "Team Lead",
        url: "https://example.com/team-comm",
        created_at: "2024-01-03T09:15:00Z",
    },
];
