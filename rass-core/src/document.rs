//! Data types for stored documents and ranked hits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-supplied metadata attached to a document.
///
/// The well-known fields are used for filtering. Any other key is kept in
/// [`extra`](DocumentMetadata::extra) and stored as given. A well-known key
/// holding a non-string value also lands in `extra`, so it never rejects the
/// request and round-trips unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "Map<String, Value>")]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// The tenant (application) the document belongs to, e.g. `redmine`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Creation time as reported by the source application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last modification time as reported by the source application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Arbitrary additional keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for DocumentMetadata {
    fn from(mut map: Map<String, Value>) -> Self {
        Self {
            title: take_string(&mut map, "title"),
            source: take_string(&mut map, "source"),
            application: take_string(&mut map, "application"),
            owner: take_string(&mut map, "owner"),
            author: take_string(&mut map, "author"),
            url: take_string(&mut map, "url"),
            created_at: take_string(&mut map, "created_at"),
            updated_at: take_string(&mut map, "updated_at"),
            extra: map,
        }
    }
}

/// Remove `key` from `map` only when it holds a string.
fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    if !map.get(key).is_some_and(Value::is_string) {
        return None;
    }
    match map.remove(key) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}

impl DocumentMetadata {
    /// Create metadata scoped to the given application.
    pub fn for_application(application: impl Into<String>) -> Self {
        Self { application: Some(application.into()), ..Default::default() }
    }
}

/// A stored document with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The raw text content the embedding was derived from.
    pub content: String,
    pub metadata: DocumentMetadata,
    /// The vector embedding of `content`.
    pub embedding: Vec<f32>,
    /// Set when the document is first stored, preserved on overwrite.
    pub created_at: DateTime<Utc>,
    /// Bumped on every embed and every refresh.
    pub updated_at: DateTime<Utc>,
}

/// A ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    /// Cosine similarity between the query and the document, in `[-1, 1]`.
    pub score: f32,
    /// Content substrings matching query tokens, in query token order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
    /// The leading characters of the content, for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}
