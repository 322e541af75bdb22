//! callscribe-ci library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod types;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use callscribe_common::config::TomlConfig;
use chrono::{DateTime, Utc};
use services::existence_cache::PipelineCaches;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Shared TTL caches for existence checks and persisted payloads
    pub caches: Arc<PipelineCaches>,
    /// TOML configuration loaded at startup (recording server, fallbacks)
    pub toml_config: TomlConfig,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, toml_config: TomlConfig) -> Self {
        Self {
            db,
            caches: Arc::new(PipelineCaches::new()),
            toml_config,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::transcription_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .with_state(state)
}
