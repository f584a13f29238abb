//! OpenSearch backend.
//!
//! Provides [`OpenSearchBackend`] which implements [`RassBackend`] against an
//! OpenSearch cluster over its REST API using [reqwest](https://docs.rs/reqwest).
//! Vectors are computed locally with the same [`HashVectorizer`] the
//! simulated backend uses and stored in a `knn_vector` field; hits are
//! re-scored with cosine similarity and highlighted locally so responses match
//! the simulated backend exactly.
//!
//! This module is only available when the `opensearch` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use rass_core::opensearch::OpenSearchBackend;
//!
//! let backend = OpenSearchBackend::from_config(&config)?;
//! backend.initialize().await?;
//! ```

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::backend::RassBackend;
use crate::config::{BackendKind, OpenSearchConfig, RassConfig};
use crate::document::{Document, SearchHit};
use crate::error::{RassError, Result};
use crate::ranker::{Highlighter, Page, Ranker, cosine_similarity, snippet};
use crate::request::{
    EmbedRequest, EmbedResponse, RefreshRequest, RefreshResponse, SearchFilters, SearchRequest,
    SearchResponse,
};
use crate::store::vectorize_checked;
use crate::vectorizer::{HashVectorizer, Vectorizer};

const BACKEND: &str = "opensearch";

/// A [`RassBackend`] backed by an [OpenSearch](https://opensearch.org/) index.
pub struct OpenSearchBackend {
    client: Client,
    base_url: Url,
    config: OpenSearchConfig,
    vectorizer: Arc<dyn Vectorizer>,
    ranker: Ranker,
    snippet_length: usize,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    total: Option<Value>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

impl OpenSearchBackend {
    /// Create a backend from the `opensearch` section of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RassError::Config`] if the section is missing or the URL
    /// cannot be parsed.
    pub fn from_config(config: &RassConfig) -> Result<Self> {
        let opensearch = config.opensearch.clone().ok_or_else(|| {
            RassError::Config("opensearch settings are required for the opensearch backend".into())
        })?;
        let base_url = Url::parse(&opensearch.url).map_err(|e| {
            RassError::Config(format!("invalid opensearch url '{}': {e}", opensearch.url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RassError::Config(format!("invalid opensearch url '{}'", opensearch.url)));
        }
        let vectorizer = HashVectorizer::with_salt(config.dimensions, config.salt.clone())?;
        Ok(Self {
            client: Client::new(),
            base_url,
            config: opensearch,
            vectorizer: Arc::new(vectorizer),
            ranker: Ranker::from_config(config),
            snippet_length: config.snippet_length,
        })
    }

    fn map_err(e: reqwest::Error) -> RassError {
        RassError::Backend { backend: BACKEND.to_string(), message: e.to_string() }
    }

    fn backend_error(message: impl Into<String>) -> RassError {
        RassError::Backend { backend: BACKEND.to_string(), message: message.into() }
    }

    /// Build a URL below the base URL, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) => builder.basic_auth(username, Some(password)),
            _ => builder,
        }
    }

    async fn fetch(&self, id: &str) -> Result<Option<Document>> {
        let url = self.endpoint(&[&self.config.index, "_doc", id]);
        let response = self.request(Method::GET, url).send().await.map_err(Self::map_err)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().map_err(Self::map_err)?;
        let body: GetResponse = response.json().await.map_err(Self::map_err)?;
        if !body.found {
            return Ok(None);
        }
        body.source
            .map(Some)
            .ok_or_else(|| Self::backend_error(format!("Document with id {id} has no source data")))
    }

    async fn put_document(&self, document: &Document) -> Result<()> {
        let mut url = self.endpoint(&[&self.config.index, "_doc", &document.id]);
        url.set_query(Some("refresh=true"));
        self.request(Method::PUT, url)
            .json(document)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn try_embed(&self, request: &EmbedRequest) -> Result<Vec<f32>> {
        let embedding = vectorize_checked(self.vectorizer.as_ref(), &request.content)?;
        let now = Utc::now();
        let created_at = self.fetch(&request.id).await?.map_or(now, |existing| existing.created_at);
        let document = Document {
            id: request.id.clone(),
            content: request.content.clone(),
            metadata: request.metadata.clone().unwrap_or_default(),
            embedding,
            created_at,
            updated_at: now,
        };
        self.put_document(&document).await?;
        Ok(document.embedding)
    }

    async fn refresh_one(&self, id: &str, content: &str) -> Result<()> {
        let embedding = vectorize_checked(self.vectorizer.as_ref(), content)?;
        let url = self.endpoint(&[&self.config.index, "_update", id]);
        self.request(Method::POST, url)
            .json(&json!({ "doc": { "embedding": embedding, "updated_at": Utc::now() } }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn run_search(&self, body: &Value) -> Result<SearchEnvelope> {
        let url = self.endpoint(&[&self.config.index, "_search"]);
        self.request(Method::POST, url)
            .json(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(Self::map_err)?
            .json()
            .await
            .map_err(Self::map_err)
    }

    fn to_hit(
        &self,
        document: Document,
        query_vector: &[f32],
        highlighter: &Highlighter,
    ) -> SearchHit {
        let score = cosine_similarity(query_vector, &document.embedding);
        SearchHit {
            highlights: highlighter.highlights(&document.content),
            snippet: Some(snippet(&document.content, self.snippet_length)),
            id: document.id,
            content: document.content,
            metadata: document.metadata,
            score,
        }
    }
}

/// Index settings and mappings for a kNN index of the given dimension.
pub fn index_body(dimensions: usize) -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0,
            "index.knn": true
        },
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "content": { "type": "text" },
                "metadata": {
                    "properties": {
                        "title": { "type": "text" },
                        "source": { "type": "keyword" },
                        "application": { "type": "keyword" },
                        "owner": { "type": "keyword" },
                        "author": { "type": "keyword" },
                        "url": { "type": "keyword" }
                    }
                },
                "embedding": {
                    "type": "knn_vector",
                    "dimension": dimensions,
                    "method": { "name": "hnsw", "space_type": "cosinesimil", "engine": "nmslib" }
                },
                "created_at": { "type": "date" },
                "updated_at": { "type": "date" }
            }
        }
    })
}

/// Translate search filters into OpenSearch `filter` clauses.
pub fn build_filters(filters: Option<&SearchFilters>) -> Vec<Value> {
    let Some(filters) = filters else {
        return Vec::new();
    };
    let mut clauses = Vec::new();
    let terms = [
        ("metadata.application", &filters.application),
        ("metadata.source", &filters.source),
        ("metadata.author", &filters.author),
        ("metadata.owner", &filters.owner),
    ];
    for (field, value) in terms {
        if let Some(value) = value {
            clauses.push(json!({ "term": { field: value } }));
        }
    }
    if let Some(range) = &filters.date_range {
        let mut bounds = serde_json::Map::new();
        if let Some(start) = range.start {
            bounds.insert("gte".to_string(), json!(start));
        }
        if let Some(end) = range.end {
            bounds.insert("lte".to_string(), json!(end));
        }
        if !bounds.is_empty() {
            clauses.push(json!({ "range": { "created_at": bounds } }));
        }
    }
    for (key, value) in &filters.extra {
        clauses.push(json!({ "term": { format!("metadata.{key}"): value } }));
    }
    clauses
}

/// The kNN search request for one page.
pub fn search_body(query_vector: &[f32], filters: Option<&SearchFilters>, page: Page) -> Value {
    let mut boolean = json!({
        "must": [{
            "knn": { "embedding": { "vector": query_vector, "k": page.offset + page.limit } }
        }]
    });
    let filter = build_filters(filters);
    if !filter.is_empty() {
        boolean["filter"] = Value::Array(filter);
    }
    json!({
        "from": page.offset,
        "size": page.limit,
        "track_total_hits": true,
        "query": { "bool": boolean }
    })
}

/// The query selecting documents to refresh.
pub fn refresh_query(request: &RefreshRequest, batch_size: usize) -> Value {
    let terms = [
        ("metadata.application", &request.application),
        ("metadata.source", &request.source),
        ("metadata.owner", &request.owner),
    ];
    let filter: Vec<Value> = terms
        .into_iter()
        .filter_map(|(field, value)| value.as_ref().map(|v| json!({ "term": { field: v } })))
        .collect();
    let query = if filter.is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({ "bool": { "filter": filter } })
    };
    json!({ "query": query, "size": batch_size, "_source": ["id", "content"] })
}

/// Split refresh hits into `(id, content)` pairs and a count of hits whose
/// source lacks either field. Incomplete hits count as failed documents.
fn refresh_targets(hits: Vec<RawHit>) -> (Vec<(String, String)>, usize) {
    let mut targets = Vec::with_capacity(hits.len());
    let mut incomplete = 0;
    for hit in hits {
        let source = hit.source.unwrap_or(Value::Null);
        match (
            source.get("id").and_then(Value::as_str),
            source.get("content").and_then(Value::as_str),
        ) {
            (Some(id), Some(content)) => targets.push((id.to_string(), content.to_string())),
            _ => {
                incomplete += 1;
                warn!(hit.id = %hit.id, "document has incomplete data, counted as failed");
            }
        }
    }
    (targets, incomplete)
}

/// Read `hits.total`, which is a number or `{ "value": n }` depending on the
/// server version.
fn parse_total(total: Option<&Value>) -> usize {
    match total {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
        Some(Value::Object(obj)) => obj.get("value").and_then(Value::as_u64).unwrap_or(0) as usize,
        _ => 0,
    }
}

#[async_trait]
impl RassBackend for OpenSearchBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenSearch
    }

    async fn initialize(&self) -> Result<()> {
        let url = self.endpoint(&[&self.config.index]);
        let response =
            self.request(Method::HEAD, url.clone()).send().await.map_err(Self::map_err)?;
        if response.status().is_success() {
            debug!(index = %self.config.index, "opensearch index already exists");
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(Self::backend_error(format!(
                "unexpected status {} checking index '{}'",
                response.status(),
                self.config.index
            )));
        }

        self.request(Method::PUT, url)
            .json(&index_body(self.vectorizer.dimensions()))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!(index = %self.config.index, error = %e, "failed to create opensearch index");
                Self::map_err(e)
            })?;
        info!(index = %self.config.index, "created opensearch index");
        Ok(())
    }

    async fn embed(&self, request: EmbedRequest) -> EmbedResponse {
        match self.try_embed(&request).await {
            Ok(embedding) => {
                info!(document.id = %request.id, "embedded document");
                EmbedResponse::success(request.id, embedding)
            }
            Err(e) => {
                error!(document.id = %request.id, error = %e, "opensearch embed failed");
                EmbedResponse::error(request.id, format!("Failed to embed document: {e}"))
            }
        }
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        let query_vector = vectorize_checked(self.vectorizer.as_ref(), &request.query)?;
        let page = self.ranker.page(request.offset, request.limit);
        let body = search_body(&query_vector, request.filters.as_ref(), page);

        let envelope = self.run_search(&body).await.map_err(|e| {
            error!(error = %e, "opensearch search failed");
            Self::backend_error(format!("Search failed: {e}"))
        })?;

        let highlighter = Highlighter::new(&request.query);
        let mut results = Vec::with_capacity(envelope.hits.hits.len());
        for hit in envelope.hits.hits {
            let source = hit.source.ok_or_else(|| {
                Self::backend_error(format!("hit '{}' has no source data", hit.id))
            })?;
            let document: Document = serde_json::from_value(source).map_err(|e| {
                Self::backend_error(format!("malformed document '{}': {e}", hit.id))
            })?;
            if document.embedding.len() != query_vector.len() {
                return Err(RassError::DimensionMismatch {
                    id: document.id,
                    expected: query_vector.len(),
                    actual: document.embedding.len(),
                });
            }
            results.push(self.to_hit(document, &query_vector, &highlighter));
        }

        let total = parse_total(envelope.hits.total.as_ref());
        let took_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(total, returned = results.len(), took_ms, "search completed");

        Ok(SearchResponse {
            results,
            total,
            offset: page.offset,
            limit: page.limit,
            query: request.query,
            took_ms,
        })
    }

    async fn get_item(&self, id: &str) -> Result<Document> {
        self.fetch(id).await?.ok_or_else(|| RassError::NotFound(id.to_string()))
    }

    async fn refresh(&self, request: RefreshRequest) -> RefreshResponse {
        let query = refresh_query(&request, self.config.refresh_batch_size);
        let envelope = match self.run_search(&query).await {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "opensearch refresh query failed");
                return RefreshResponse::failed(format!("Refresh failed: {e}"));
            }
        };

        let (targets, incomplete) = refresh_targets(envelope.hits.hits);
        let mut processed = 0;
        let mut errors = incomplete;
        for (id, content) in &targets {
            match self.refresh_one(id, content).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    errors += 1;
                    warn!(document.id = %id, error = %e, "failed to refresh document");
                }
            }
        }

        info!(processed, errors, "refresh completed");
        RefreshResponse::from_counts(processed, errors)
    }
}
