//! Similarity ranking: filtering, cosine scoring, ordering, pagination, and
//! highlight extraction.
//!
//! The ranker is synchronous and holds no state besides its limits; storage
//! backends hand it their candidates in insertion order.

use std::cmp::Ordering;
use std::collections::HashSet;

use regex::{Regex, RegexBuilder};

use crate::config::RassConfig;
use crate::document::{Document, SearchHit};
use crate::error::{RassError, Result};
use crate::request::{SearchFilters, clause_matches};
use crate::vectorizer::tokenize;

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Returns `true` if the document satisfies every clause set in `filters`.
pub fn matches_filters(document: &Document, filters: &SearchFilters) -> bool {
    let metadata = &document.metadata;
    clause_matches(&filters.application, &metadata.application)
        && clause_matches(&filters.source, &metadata.source)
        && clause_matches(&filters.author, &metadata.author)
        && clause_matches(&filters.owner, &metadata.owner)
        && filters.date_range.as_ref().is_none_or(|range| range.contains(&document.created_at))
        && filters.extra.iter().all(|(key, expected)| metadata.extra.get(key) == Some(expected))
}

/// Case-insensitive matcher for the distinct tokens of a query.
#[derive(Debug, Clone)]
pub struct Highlighter {
    patterns: Vec<Regex>,
}

impl Highlighter {
    /// Compile one pattern per distinct query token, tokenized the same way
    /// the vectorizer tokenizes text.
    pub fn new(query: &str) -> Self {
        let mut seen = HashSet::new();
        let patterns = tokenize(query)
            .filter(|token| seen.insert(token.clone()))
            .filter_map(|token| {
                RegexBuilder::new(&regex::escape(&token)).case_insensitive(true).build().ok()
            })
            .collect();
        Self { patterns }
    }

    /// Return the first occurrence of each matching token, as written in
    /// `content`, or `None` when no token occurs.
    pub fn highlights(&self, content: &str) -> Option<Vec<String>> {
        let found: Vec<String> = self
            .patterns
            .iter()
            .filter_map(|pattern| pattern.find(content).map(|m| m.as_str().to_string()))
            .collect();
        if found.is_empty() { None } else { Some(found) }
    }
}

/// Return at most `length` leading characters of `content`.
pub fn snippet(content: &str, length: usize) -> String {
    content.chars().take(length).collect()
}

/// A resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

/// One page of ranked hits plus the size of the full filtered result set.
#[derive(Debug, Clone)]
pub struct RankedPage {
    pub hits: Vec<SearchHit>,
    pub total: usize,
    pub page: Page,
}

/// Scores and orders stored documents against a query vector.
#[derive(Debug, Clone)]
pub struct Ranker {
    default_limit: usize,
    max_limit: usize,
    snippet_length: usize,
}

impl Ranker {
    pub fn new(default_limit: usize, max_limit: usize, snippet_length: usize) -> Self {
        Self { default_limit, max_limit, snippet_length }
    }

    pub fn from_config(config: &RassConfig) -> Self {
        Self::new(config.default_limit, config.max_limit, config.snippet_length)
    }

    /// Resolve the requested window. Negative offsets become zero; missing or
    /// non-positive limits become the default; large limits are capped.
    pub fn page(&self, offset: Option<i64>, limit: Option<i64>) -> Page {
        let offset = offset.map_or(0, |o| usize::try_from(o).unwrap_or(0));
        let limit = match limit {
            Some(l) if l > 0 => usize::try_from(l).unwrap_or(usize::MAX).min(self.max_limit),
            _ => self.default_limit,
        };
        Page { offset, limit }
    }

    /// Filter, score, and paginate `candidates`.
    ///
    /// `candidates` must be supplied in insertion order; documents with equal
    /// scores keep that order.
    ///
    /// # Errors
    ///
    /// Returns [`RassError::DimensionMismatch`] if a filtered document's
    /// embedding length differs from the query vector's.
    pub fn rank<'a, I>(
        &self,
        query: &str,
        query_vector: &[f32],
        filters: Option<&SearchFilters>,
        page: Page,
        candidates: I,
    ) -> Result<RankedPage>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut scored: Vec<(&Document, f32)> = Vec::new();
        for document in candidates {
            if !filters.is_none_or(|f| matches_filters(document, f)) {
                continue;
            }
            if document.embedding.len() != query_vector.len() {
                return Err(RassError::DimensionMismatch {
                    id: document.id.clone(),
                    expected: query_vector.len(),
                    actual: document.embedding.len(),
                });
            }
            scored.push((document, cosine_similarity(query_vector, &document.embedding)));
        }

        // Stable: ties keep insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let total = scored.len();
        let highlighter = Highlighter::new(query);
        let hits = scored
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .map(|(document, score)| SearchHit {
                id: document.id.clone(),
                content: document.content.clone(),
                metadata: document.metadata.clone(),
                score,
                highlights: highlighter.highlights(&document.content),
                snippet: Some(snippet(&document.content, self.snippet_length)),
            })
            .collect();

        Ok(RankedPage { hits, total, page })
    }
}
