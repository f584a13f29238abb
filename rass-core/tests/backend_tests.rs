//! Behavioural tests for the simulated backend through the backend contract.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rass_core::{
    DateRange, DocumentMetadata, EmbedRequest, HashVectorizer, OperationStatus, RassBackend,
    RassError, Ranker, RefreshRequest, Result, SearchFilters, SearchRequest, SimulatedBackend,
    Vectorizer,
};

const DIM: usize = 384;

/// Fails on any text containing "poison" once armed.
struct FlakyVectorizer {
    inner: HashVectorizer,
    armed: AtomicBool,
}

impl FlakyVectorizer {
    fn new() -> Self {
        Self { inner: HashVectorizer::new(DIM).unwrap(), armed: AtomicBool::new(false) }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl Vectorizer for FlakyVectorizer {
    fn vectorize(&self, text: &str) -> Result<Vec<f32>> {
        if self.armed.load(Ordering::SeqCst) && text.contains("poison") {
            return Err(RassError::Vectorization {
                vectorizer: "flaky".to_string(),
                message: "poisoned content".to_string(),
            });
        }
        self.inner.vectorize(text)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

fn backend() -> SimulatedBackend {
    SimulatedBackend::new(Arc::new(HashVectorizer::new(DIM).unwrap()), Ranker::new(10, 100, 200))
}

fn metadata(application: &str, source: &str, author: &str) -> DocumentMetadata {
    DocumentMetadata {
        application: Some(application.to_string()),
        source: Some(source.to_string()),
        author: Some(author.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn related_document_outranks_unrelated_one() {
    let backend = backend();
    let embedded =
        backend.embed(EmbedRequest::new("doc-1", "ai healthcare machine learning")).await;
    assert_eq!(embedded.status, OperationStatus::Success);
    assert_eq!(embedded.embedding.as_ref().map(Vec::len), Some(DIM));
    backend.embed(EmbedRequest::new("doc-2", "gardening tomatoes compost soil")).await;

    let response = backend.search(SearchRequest::new("ai healthcare")).await.unwrap();
    assert_eq!(response.total, 2);
    assert_eq!(response.results[0].id, "doc-1");
    assert!(response.results[0].score > response.results[1].score);
    assert_eq!(
        response.results[0].highlights.as_deref(),
        Some(&["ai".to_string(), "healthcare".to_string()][..])
    );
    assert!(response.results[1].highlights.is_none());
    assert_eq!(response.query, "ai healthcare");
}

#[tokio::test]
async fn re_embedding_unchanged_content_is_idempotent() {
    let backend = backend();
    let request = EmbedRequest::new("doc-1", "stable content")
        .with_metadata(DocumentMetadata::for_application("mediawiki"));

    let first = backend.embed(request.clone()).await;
    let stored = backend.get_item("doc-1").await.unwrap();
    let second = backend.embed(request).await;

    assert_eq!(first.id, second.id);
    assert_eq!(first.embedding, second.embedding);
    assert_eq!(backend.store().len().await, 1);

    let restored = backend.get_item("doc-1").await.unwrap();
    assert_eq!(restored.created_at, stored.created_at);
    assert!(restored.updated_at >= stored.updated_at);
}

#[tokio::test]
async fn missing_item_is_not_found() {
    let err = backend().get_item("doc-missing").await.unwrap_err();
    assert!(matches!(err, RassError::NotFound(ref id) if id == "doc-missing"));
}

#[tokio::test]
async fn filters_never_leak_other_tenants() {
    let backend = backend();
    let docs = [
        ("r1", "release planning notes", metadata("redmine", "issues", "jane")),
        ("r2", "release checklist", metadata("redmine", "wiki", "jane")),
        ("m1", "release announcement", metadata("mediawiki", "issues", "jane")),
        ("r3", "release retro", metadata("redmine", "issues", "bob")),
    ];
    for (id, content, meta) in docs {
        backend.embed(EmbedRequest::new(id, content).with_metadata(meta)).await;
    }

    let tenant_only = SearchFilters { application: Some("redmine".into()), ..Default::default() };
    let response = backend
        .search(SearchRequest::new("release").with_filters(tenant_only))
        .await
        .unwrap();
    assert_eq!(response.total, 3);
    assert!(
        response.results.iter().all(|hit| hit.metadata.application.as_deref() == Some("redmine"))
    );

    let all_clauses = SearchFilters {
        application: Some("redmine".into()),
        source: Some("issues".into()),
        author: Some("jane".into()),
        ..Default::default()
    };
    let response = backend
        .search(SearchRequest::new("release").with_filters(all_clauses))
        .await
        .unwrap();
    let ids: Vec<&str> = response.results.iter().map(|hit| hit.id.as_str()).collect();
    assert_eq!(ids, vec!["r1"]);
}

#[tokio::test]
async fn owner_filter_excludes_other_owners() {
    let backend = backend();
    for (id, owner) in [("a1", "alice"), ("b1", "bob"), ("n1", "")] {
        let mut meta = DocumentMetadata::for_application("redmine");
        if !owner.is_empty() {
            meta.owner = Some(owner.to_string());
        }
        backend.embed(EmbedRequest::new(id, "sprint review").with_metadata(meta)).await;
    }

    let filters = SearchFilters {
        application: Some("redmine".into()),
        owner: Some("alice".into()),
        ..Default::default()
    };
    let response =
        backend.search(SearchRequest::new("sprint review").with_filters(filters)).await.unwrap();
    let ids: Vec<&str> = response.results.iter().map(|hit| hit.id.as_str()).collect();
    assert_eq!(ids, vec!["a1"]);
    assert_eq!(response.total, 1);
}

#[tokio::test]
async fn mistyped_metadata_is_stored_as_given() {
    let backend = backend();
    let request: EmbedRequest = serde_json::from_value(serde_json::json!({
        "id": "doc-1",
        "content": "x",
        "metadata": { "title": 5, "created_at": 1704100000, "application": "wiki" }
    }))
    .unwrap();
    let response = backend.embed(request).await;
    assert_eq!(response.status, OperationStatus::Success);

    let stored = backend.get_item("doc-1").await.unwrap();
    let metadata = serde_json::to_value(&stored.metadata).unwrap();
    assert_eq!(metadata["title"], 5);
    assert_eq!(metadata["created_at"], 1704100000);
    assert_eq!(stored.metadata.application.as_deref(), Some("wiki"));
}

#[tokio::test]
async fn date_range_filters_on_created_at() {
    let backend = backend();
    backend.embed(EmbedRequest::new("old", "archive")).await;
    let created = backend.get_item("old").await.unwrap().created_at;

    let inclusive = SearchFilters {
        date_range: Some(DateRange { start: Some(created), end: Some(created) }),
        ..Default::default()
    };
    let response =
        backend.search(SearchRequest::new("archive").with_filters(inclusive)).await.unwrap();
    assert_eq!(response.total, 1);

    let later = SearchFilters {
        date_range: Some(DateRange { start: Some(created + chrono::Duration::days(1)), end: None }),
        ..Default::default()
    };
    let response = backend.search(SearchRequest::new("archive").with_filters(later)).await.unwrap();
    assert_eq!(response.total, 0);
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn pagination_slices_the_ranked_list() {
    let backend = backend();
    for i in 0..7 {
        backend.embed(EmbedRequest::new(format!("doc-{i}"), format!("shared topic {i}"))).await;
    }

    let full = backend.search(SearchRequest::new("shared topic").with_page(0, 100)).await.unwrap();
    let page = backend.search(SearchRequest::new("shared topic").with_page(2, 3)).await.unwrap();

    assert_eq!(full.total, 7);
    assert_eq!(page.total, 7);
    assert_eq!((page.offset, page.limit), (2, 3));
    assert_eq!(page.results, full.results[2..5].to_vec());

    let clamped =
        backend.search(SearchRequest::new("shared topic").with_page(-4, 0)).await.unwrap();
    assert_eq!((clamped.offset, clamped.limit), (0, 10));
    assert_eq!(clamped.results.len(), 7);

    let beyond = backend.search(SearchRequest::new("shared topic").with_page(50, 5)).await.unwrap();
    assert!(beyond.results.is_empty());
    assert_eq!(beyond.total, 7);
}

#[tokio::test]
async fn refresh_counts_per_document_failures() {
    let vectorizer = Arc::new(FlakyVectorizer::new());
    let backend = SimulatedBackend::new(vectorizer.clone(), Ranker::new(10, 100, 200));
    for (id, content) in [("a", "alpha text"), ("b", "poison pill"), ("c", "gamma text")] {
        let response = backend.embed(EmbedRequest::new(id, content)).await;
        assert_eq!(response.status, OperationStatus::Success);
    }
    let before_a = backend.get_item("a").await.unwrap();
    let before_b = backend.get_item("b").await.unwrap();

    vectorizer.arm();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let response = backend.refresh(RefreshRequest::default()).await;

    assert_eq!(response.status, OperationStatus::Error);
    assert_eq!(response.processed, 2);
    assert_eq!(response.errors, 1);
    assert_eq!(response.message, "Processed 2 documents with 1 errors");

    let after_a = backend.get_item("a").await.unwrap();
    assert!(after_a.updated_at > before_a.updated_at);
    assert_eq!(after_a.embedding, before_a.embedding);
    assert_eq!(backend.get_item("b").await.unwrap(), before_b);
}

#[tokio::test]
async fn refresh_selects_by_application() {
    let backend = backend();
    for (id, content, application) in [("w", "wiki", "mediawiki"), ("r", "ticket", "redmine")] {
        let metadata = DocumentMetadata::for_application(application);
        backend.embed(EmbedRequest::new(id, content).with_metadata(metadata)).await;
    }
    let untouched = backend.get_item("w").await.unwrap();

    let request = RefreshRequest { application: Some("redmine".into()), ..Default::default() };
    let response = backend.refresh(request).await;

    assert_eq!(response.status, OperationStatus::Success);
    assert_eq!((response.processed, response.errors), (1, 0));
    assert_eq!(backend.get_item("w").await.unwrap(), untouched);
}

#[tokio::test]
async fn refresh_selects_by_owner() {
    let backend = backend();
    for (id, owner) in [("a", "alice"), ("b", "bob"), ("c", "alice")] {
        let metadata = DocumentMetadata { owner: Some(owner.to_string()), ..Default::default() };
        backend.embed(EmbedRequest::new(id, "shared notes").with_metadata(metadata)).await;
    }
    let untouched = backend.get_item("b").await.unwrap();

    let request = RefreshRequest { owner: Some("alice".into()), ..Default::default() };
    let response = backend.refresh(request).await;

    assert_eq!(response.status, OperationStatus::Success);
    assert_eq!((response.processed, response.errors), (2, 0));
    assert_eq!(backend.get_item("b").await.unwrap(), untouched);

    let nobody = RefreshRequest { owner: Some("carol".into()), ..Default::default() };
    assert_eq!(backend.refresh(nobody).await.processed, 0);
}

#[tokio::test]
async fn failed_embed_is_reported_in_band() {
    let vectorizer = Arc::new(FlakyVectorizer::new());
    vectorizer.arm();
    let backend = SimulatedBackend::new(vectorizer, Ranker::new(10, 100, 200));

    let response = backend.embed(EmbedRequest::new("bad", "poison")).await;
    assert_eq!(response.status, OperationStatus::Error);
    assert!(response.embedding.is_none());
    assert!(response.message.unwrap().contains("poisoned content"));
    assert!(backend.get_item("bad").await.unwrap_err().is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_embeds_and_searches() {
    let backend: Arc<dyn RassBackend> = Arc::new(backend());
    let mut handles = Vec::new();
    for i in 0..32 {
        let backend = backend.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("doc-{}", i % 8);
            backend.embed(EmbedRequest::new(id, format!("concurrent content {i}"))).await;
            backend.search(SearchRequest::new("concurrent content")).await.map(|r| r.total)
        }));
    }
    for handle in handles {
        let total = handle.await.unwrap().unwrap();
        assert!((1..=8).contains(&total));
    }
    let response = backend.refresh(RefreshRequest::default()).await;
    assert_eq!(response.processed, 8);
}
