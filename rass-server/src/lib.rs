//! # rass-server
//!
//! HTTP surface for RASS. Routes:
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | POST | `/embed` | `EmbedRequest` | `EmbedResponse` |
//! | POST | `/search` | `SearchRequest` | `SearchResponse` |
//! | GET | `/item/{id}` | | `Document` or 404 |
//! | POST | `/refresh` | `RefreshRequest` | `RefreshResponse` |
//! | GET | `/health` | | status, timestamp, backend |
//!
//! When an API key is configured, every route except `/health` requires it in
//! the `x-api-key` header.

pub mod config;
pub mod error;
pub mod server;

pub use config::ServerArgs;
pub use error::ApiError;
pub use server::{
    API_KEY_HEADER, AppState, ServerConfig, app_router, app_router_with_limit, run_server,
};
