//! Concurrent in-memory document store.
//!
//! Documents live in a `HashMap` behind a `tokio::sync::RwLock`; each
//! document additionally sits behind its own `RwLock`. The outer lock is only
//! held to look up or insert entries, so writes to one document never block
//! readers of another, and a batch refresh never holds a store-wide
//! exclusive lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, warn};

use crate::document::{Document, DocumentMetadata};
use crate::error::{RassError, Result};
use crate::request::RefreshRequest;
use crate::vectorizer::Vectorizer;

#[derive(Debug)]
struct Entry {
    /// Position of the first insert of this id.
    seq: u64,
    document: RwLock<Document>,
}

/// Counters reported by [`DocumentStore::refresh`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub processed: usize,
    pub errors: usize,
}

/// A tenant-scoped mapping from document id to [`Document`].
///
/// # Example
///
/// ```rust,ignore
/// use rass_core::{DocumentStore, DocumentMetadata};
///
/// let store = DocumentStore::new();
/// store.upsert("doc-1", "text", DocumentMetadata::default(), vec![0.0; 384], Utc::now()).await;
/// let doc = store.get("doc-1").await?;
/// ```
#[derive(Debug, Default)]
pub struct DocumentStore {
    entries: RwLock<HashMap<String, Arc<Entry>>>,
    next_seq: AtomicU64,
}

impl DocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Insert a document, or overwrite the document stored under `id`.
    ///
    /// An overwrite replaces content, metadata, and embedding, bumps
    /// `updated_at`, and keeps the original `created_at` and insertion
    /// position. Returns the stored document.
    pub async fn upsert(
        &self,
        id: &str,
        content: &str,
        metadata: DocumentMetadata,
        embedding: Vec<f32>,
        now: DateTime<Utc>,
    ) -> Document {
        let existing = self.entries.read().await.get(id).cloned();
        let entry = match existing {
            Some(entry) => entry,
            None => {
                let mut entries = self.entries.write().await;
                match entries.get(id) {
                    Some(entry) => entry.clone(),
                    None => {
                        let document = Document {
                            id: id.to_string(),
                            content: content.to_string(),
                            metadata,
                            embedding,
                            created_at: now,
                            updated_at: now,
                        };
                        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                        entries.insert(
                            id.to_string(),
                            Arc::new(Entry { seq, document: RwLock::new(document.clone()) }),
                        );
                        debug!(document.id = id, "inserted document");
                        return document;
                    }
                }
            }
        };

        let mut document = entry.document.write().await;
        document.content = content.to_string();
        document.metadata = metadata;
        document.embedding = embedding;
        document.updated_at = now;
        debug!(document.id = id, "overwrote document");
        document.clone()
    }

    /// Exact-key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`RassError::NotFound`] if no document is stored under `id`.
    pub async fn get(&self, id: &str) -> Result<Document> {
        let entry = self
            .entries
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RassError::NotFound(id.to_string()))?;
        let document = entry.document.read().await;
        Ok(document.clone())
    }

    /// Run `f` over read guards of every document, in insertion order.
    ///
    /// Writers of individual documents are excluded for the duration of `f`;
    /// other readers are not.
    pub async fn with_documents<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&[RwLockReadGuard<'_, Document>]) -> T,
    {
        let mut entries: Vec<Arc<Entry>> = self.entries.read().await.values().cloned().collect();
        entries.sort_by_key(|entry| entry.seq);

        let mut guards = Vec::with_capacity(entries.len());
        for entry in &entries {
            guards.push(entry.document.read().await);
        }
        f(&guards)
    }

    /// Re-derive the embedding of every document selected by `request` from
    /// its current content.
    ///
    /// Each document is locked, re-vectorized, and committed on its own, so a
    /// failure affects only that document and a commit is final once made.
    /// Selection is checked under a read lock first; only selected documents
    /// are write-locked.
    pub async fn refresh(
        &self,
        request: &RefreshRequest,
        vectorizer: &dyn Vectorizer,
    ) -> RefreshOutcome {
        let mut entries: Vec<Arc<Entry>> = self.entries.read().await.values().cloned().collect();
        entries.sort_by_key(|entry| entry.seq);

        let mut outcome = RefreshOutcome::default();
        for entry in entries {
            if !request.matches(&entry.document.read().await.metadata) {
                continue;
            }
            let mut document = entry.document.write().await;
            // Metadata may have been overwritten between the two locks.
            if !request.matches(&document.metadata) {
                continue;
            }
            match vectorize_checked(vectorizer, &document.content) {
                Ok(embedding) => {
                    document.embedding = embedding;
                    document.updated_at = Utc::now();
                    outcome.processed += 1;
                    debug!(document.id = %document.id, "refreshed embedding");
                }
                Err(e) => {
                    outcome.errors += 1;
                    warn!(document.id = %document.id, error = %e, "failed to refresh document");
                }
            }
        }
        outcome
    }
}

/// Vectorize `text` and check the result has the vectorizer's dimension.
pub(crate) fn vectorize_checked(vectorizer: &dyn Vectorizer, text: &str) -> Result<Vec<f32>> {
    let embedding = vectorizer.vectorize(text)?;
    if embedding.len() != vectorizer.dimensions() {
        return Err(RassError::Vectorization {
            vectorizer: "store".to_string(),
            message: format!(
                "expected {} components, got {}",
                vectorizer.dimensions(),
                embedding.len()
            ),
        });
    }
    Ok(embedding)
}
