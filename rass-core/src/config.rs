//! Configuration for backends and the ranking defaults they share.

use serde::{Deserialize, Serialize};

use crate::error::{RassError, Result};

/// Default embedding dimension.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Default salt mixed into every token hash.
pub const DEFAULT_SALT: &str = "rass-v1";

const MISSING_OPENSEARCH: &str = "opensearch settings are required for the opensearch backend";

/// The backend implementation selected at startup.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The in-process reference store.
    #[default]
    Simulated,
    /// An external OpenSearch cluster.
    OpenSearch,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Simulated => "simulated",
            BackendKind::OpenSearch => "opensearch",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = RassError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "simulated" => Ok(BackendKind::Simulated),
            "opensearch" => Ok(BackendKind::OpenSearch),
            other => Err(RassError::Config(format!(
                "unknown backend '{other}', expected 'simulated' or 'opensearch'"
            ))),
        }
    }
}

/// Connection settings for the OpenSearch backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenSearchConfig {
    /// Base URL of the cluster, e.g. `http://localhost:9200`.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Index holding the documents.
    pub index: String,
    /// Maximum number of documents re-vectorized by a single refresh call.
    pub refresh_batch_size: usize,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            index: "rass-documents".to_string(),
            refresh_batch_size: 1000,
        }
    }
}

/// Configuration parameters shared by every backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RassConfig {
    pub backend: BackendKind,
    /// Embedding dimension. Fixed for the lifetime of a store.
    pub dimensions: usize,
    /// Salt mixed into token hashes by the vectorizer.
    pub salt: String,
    /// Page size used when a search does not ask for a positive limit.
    pub default_limit: usize,
    /// Upper bound on the page size of a single search.
    pub max_limit: usize,
    /// Number of characters of content returned as a hit snippet.
    pub snippet_length: usize,
    /// Populate the simulated backend with demonstration documents.
    pub seed_sample_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opensearch: Option<OpenSearchConfig>,
}

impl Default for RassConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Simulated,
            dimensions: DEFAULT_DIMENSIONS,
            salt: DEFAULT_SALT.to_string(),
            default_limit: 10,
            max_limit: 100,
            snippet_length: 200,
            seed_sample_data: false,
            opensearch: None,
        }
    }
}

impl RassConfig {
    /// Create a new builder for constructing a [`RassConfig`].
    pub fn builder() -> RassConfigBuilder {
        RassConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RassError::Config`] if:
    /// - `dimensions == 0`
    /// - `default_limit == 0` or `default_limit > max_limit`
    /// - the OpenSearch backend is selected without a non-empty URL and index
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(RassError::Config("dimensions must be greater than zero".to_string()));
        }
        if self.default_limit == 0 {
            return Err(RassError::Config("default_limit must be greater than zero".to_string()));
        }
        if self.default_limit > self.max_limit {
            return Err(RassError::Config(format!(
                "default_limit ({}) must not exceed max_limit ({})",
                self.default_limit, self.max_limit
            )));
        }
        if self.backend == BackendKind::OpenSearch {
            let opensearch = self
                .opensearch
                .as_ref()
                .ok_or_else(|| RassError::Config(MISSING_OPENSEARCH.to_string()))?;
            if opensearch.url.trim().is_empty() {
                return Err(RassError::Config(
                    "OPENSEARCH_URL is required when using opensearch backend".to_string(),
                ));
            }
            if opensearch.index.trim().is_empty() {
                return Err(RassError::Config("opensearch index must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RassConfig`].
#[derive(Debug, Clone, Default)]
pub struct RassConfigBuilder {
    config: RassConfig,
}

impl RassConfigBuilder {
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn dimensions(mut self, dimensions: usize) -> Self {
        self.config.dimensions = dimensions;
        self
    }

    pub fn salt(mut self, salt: impl Into<String>) -> Self {
        self.config.salt = salt.into();
        self
    }

    pub fn default_limit(mut self, limit: usize) -> Self {
        self.config.default_limit = limit;
        self
    }

    pub fn max_limit(mut self, limit: usize) -> Self {
        self.config.max_limit = limit;
        self
    }

    pub fn snippet_length(mut self, length: usize) -> Self {
        self.config.snippet_length = length;
        self
    }

    pub fn seed_sample_data(mut self, seed: bool) -> Self {
        self.config.seed_sample_data = seed;
        self
    }

    pub fn opensearch(mut self, opensearch: OpenSearchConfig) -> Self {
        self.config.opensearch = Some(opensearch);
        self
    }

    /// Build the [`RassConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RassConfig::validate`].
    pub fn build(self) -> Result<RassConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RassConfig::default().validate().is_ok());
        assert_eq!(RassConfig::default().dimensions, 384);
    }

    #[test]
    fn rejects_zero_dimensions() {
        let err = RassConfig::builder().dimensions(0).build().unwrap_err();
        assert!(matches!(err, RassError::Config(_)));
    }

    #[test]
    fn rejects_default_limit_above_max() {
        assert!(RassConfig::builder().default_limit(50).max_limit(20).build().is_err());
    }

    #[test]
    fn opensearch_backend_requires_settings() {
        assert!(RassConfig::builder().backend(BackendKind::OpenSearch).build().is_err());

        let config = RassConfig::builder()
            .backend(BackendKind::OpenSearch)
            .opensearch(OpenSearchConfig::default())
            .build()
            .unwrap();
        assert_eq!(config.opensearch.unwrap().index, "rass-documents");
    }

    #[test]
    fn deserializes_partial_config() {
        let config: RassConfig = serde_json::from_value(serde_json::json!({
            "backend": "opensearch",
            "dimensions": 16,
            "opensearch": { "url": "http://search:9200" }
        }))
        .unwrap();
        assert_eq!(config.backend, BackendKind::OpenSearch);
        assert_eq!(config.default_limit, 10);
        let opensearch = config.opensearch.unwrap();
        assert_eq!(opensearch.index, "rass-documents");
        assert_eq!(opensearch.refresh_batch_size, 1000);
    }

    #[test]
    fn parses_backend_kind() {
        assert_eq!("OpenSearch".parse::<BackendKind>().unwrap(), BackendKind::OpenSearch);
        assert_eq!("simulated".parse::<BackendKind>().unwrap(), BackendKind::Simulated);
        assert!("elastic".parse::<BackendKind>().is_err());
    }
}
