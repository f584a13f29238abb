//! Command-line and environment configuration for the server binary.

use clap::Parser;
use rass_core::{BackendKind, OpenSearchConfig, RassConfig};
use rass_telemetry::LogFormat;

use crate::server::ServerConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "rass-server")]
#[command(about = "Document embedding and similarity search over HTTP")]
pub struct ServerArgs {
    /// Listen host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Storage backend: simulated or opensearch
    #[arg(long, env = "RASS_BACKEND", default_value = "simulated")]
    pub backend: BackendKind,

    /// Embedding dimension
    #[arg(long, env = "RASS_VECTOR_DIM", default_value = "384")]
    pub vector_dim: usize,

    /// Shared key required in the x-api-key header
    #[arg(long, env = "RASS_API_KEY")]
    pub api_key: Option<String>,

    #[arg(long, env = "OPENSEARCH_URL")]
    pub opensearch_url: Option<String>,

    #[arg(long, env = "OPENSEARCH_USERNAME")]
    pub opensearch_username: Option<String>,

    #[arg(long, env = "OPENSEARCH_PASSWORD", hide_env_values = true)]
    pub opensearch_password: Option<String>,

    #[arg(long, env = "OPENSEARCH_INDEX", default_value = "rass-documents")]
    pub opensearch_index: String,

    /// Load the demonstration documents into the simulated backend
    #[arg(long, env = "RASS_SEED_SAMPLES", default_value = "false")]
    pub seed_samples: bool,

    /// Log output: pretty or json
    #[arg(long, env = "RASS_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// Maximum request body size in bytes
    #[arg(long, env = "RASS_BODY_LIMIT", default_value = "10485760")]
    pub body_limit: usize,
}

impl ServerArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig { host: self.host.clone(), port: self.port, body_limit: self.body_limit }
    }

    /// Backend configuration. Validation happens when the backend is built.
    pub fn rass_config(&self) -> RassConfig {
        let opensearch = match (self.backend, &self.opensearch_url) {
            (BackendKind::OpenSearch, _) | (_, Some(_)) => Some(OpenSearchConfig {
                url: self.opensearch_url.clone().unwrap_or_default(),
                username: self.opensearch_username.clone(),
                password: self.opensearch_password.clone(),
                index: self.opensearch_index.clone(),
                ..Default::default()
            }),
            _ => None,
        };
        RassConfig {
            backend: self.backend,
            dimensions: self.vector_dim,
            seed_sample_data: self.seed_samples,
            opensearch,
            ..Default::default()
        }
    }
}
