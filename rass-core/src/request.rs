//! Request and response types of the backend contract.
//!
//! These are transient values: they are produced per call and carry no
//! identity beyond it. Every backend produces identical shapes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::document::{DocumentMetadata, SearchHit};

/// Outcome marker for operations that report failure in-band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Error,
}

/// Request to embed (insert or overwrite) a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedRequest {
    /// Caller-supplied document id. Re-embedding the same id overwrites.
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
}

impl EmbedRequest {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into(), metadata: None }
    }

    /// Attach metadata to the request.
    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedResponse {
    pub id: String,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl EmbedResponse {
    pub fn success(id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            status: OperationStatus::Success,
            message: None,
            embedding: Some(embedding),
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: OperationStatus::Error,
            message: Some(message.into()),
            embedding: None,
        }
    }
}

/// Inclusive bounds on a document's `created_at`.
///
/// Bounds accept RFC 3339 timestamps or bare `YYYY-MM-DD` dates. A bare
/// start date begins at midnight UTC and a bare end date covers the whole day.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DateRange {
    #[serde(
        default,
        deserialize_with = "deserialize_start",
        skip_serializing_if = "Option::is_none"
    )]
    pub start: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "deserialize_end",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<DateTime<Utc>>,
}

fn deserialize_start<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_bound(deserializer, |date| date.and_hms_opt(0, 0, 0))
}

fn deserialize_end<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_bound(deserializer, |date| date.and_hms_nano_opt(23, 59, 59, 999_999_999))
}

fn deserialize_bound<'de, D>(
    deserializer: D,
    at_time: fn(NaiveDate) -> Option<NaiveDateTime>,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .and_then(at_time)
        .map(|naive| Some(Utc.from_utc_datetime(&naive)))
        .ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid date `{raw}`, expected RFC 3339 or YYYY-MM-DD"
            ))
        })
}

impl DateRange {
    /// Returns `true` if `ts` lies within both bounds that are set.
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| *ts >= start) && self.end.is_none_or(|end| *ts <= end)
    }
}

/// Search filter clauses. A document must satisfy every clause that is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    /// Exact-match clauses on extension metadata keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<SearchFilters>,
    /// Page size. Non-positive values fall back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    /// Number of ranked hits to skip. Negative values are treated as zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Default::default() }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_page(mut self, offset: i64, limit: i64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    /// The requested page of hits, best first.
    pub results: Vec<SearchHit>,
    /// Number of documents that passed the filters, before pagination.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub query: String,
    #[serde(rename = "tookMs")]
    pub took_ms: u64,
}

/// Selects the documents whose embeddings are re-derived. Unset fields
/// impose no constraint; an empty request refreshes every document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl RefreshRequest {
    /// Returns `true` if `metadata` satisfies every set clause.
    pub fn matches(&self, metadata: &DocumentMetadata) -> bool {
        clause_matches(&self.application, &metadata.application)
            && clause_matches(&self.source, &metadata.source)
            && clause_matches(&self.owner, &metadata.owner)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshResponse {
    pub status: OperationStatus,
    pub message: String,
    /// Documents whose embedding was successfully re-derived.
    pub processed: usize,
    /// Documents that failed.
    pub errors: usize,
}

impl RefreshResponse {
    pub fn from_counts(processed: usize, errors: usize) -> Self {
        let status = if errors == 0 { OperationStatus::Success } else { OperationStatus::Error };
        Self {
            status,
            message: format!("Processed {processed} documents with {errors} errors"),
            processed,
            errors,
        }
    }

    /// A refresh that failed before any document could be selected.
    pub fn failed(message: impl Into<String>) -> Self {
        Self { status: OperationStatus::Error, message: message.into(), processed: 0, errors: 1 }
    }
}

/// An unset clause matches anything; a set clause requires equality.
pub(crate) fn clause_matches(clause: &Option<String>, value: &Option<String>) -> bool {
    match clause {
        None => true,
        Some(expected) => value.as_deref() == Some(expected.as_str()),
    }
}
