//! Settings API endpoints
//!
//! Runtime configuration of the speech-to-text API key and the
//! categorization endpoint. The database settings table is the
//! authoritative store; writes are synced to the TOML file as a
//! best-effort backup so the value survives a database reset.

use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, routing::put, Json, Router};
use callscribe_common::config::{load_toml_config, toml_config_path, write_toml_config, TomlConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct SetValueRequest {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct SetValueResponse {
    pub success: bool,
    pub message: String,
}

/// PUT /settings/stt_api_key
///
/// **Request:** `{"value": "your-provider-key"}`
///
/// Validates the key, writes it to the database, then syncs it to the
/// TOML file. A TOML sync failure logs a warning but does not fail the
/// request; the database write already succeeded.
pub async fn set_stt_api_key(
    State(state): State<AppState>,
    Json(payload): Json<SetValueRequest>,
) -> ApiResult<Json<SetValueResponse>> {
    if !crate::config::is_valid_key(&payload.value) {
        return Err(ApiError::BadRequest(
            "API key cannot be empty or whitespace-only".to_string(),
        ));
    }

    crate::db::settings::set_stt_api_key(&state.db, payload.value.clone())
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save API key: {}", e)))?;

    info!("STT API key configured via settings endpoint");

    sync_to_toml(|config| config.stt_api_key = Some(payload.value));

    Ok(Json(SetValueResponse {
        success: true,
        message: "STT API key configured".to_string(),
    }))
}

/// PUT /settings/categorizer_url
pub async fn set_categorizer_url(
    State(state): State<AppState>,
    Json(payload): Json<SetValueRequest>,
) -> ApiResult<Json<SetValueResponse>> {
    if !crate::config::is_valid_key(&payload.value) {
        return Err(ApiError::BadRequest(
            "Endpoint URL cannot be empty or whitespace-only".to_string(),
        ));
    }

    crate::db::settings::set_categorizer_url(&state.db, payload.value.clone())
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save endpoint URL: {}", e)))?;

    info!("Categorization endpoint configured via settings endpoint");

    sync_to_toml(|config| config.categorizer_url = Some(payload.value));

    Ok(Json(SetValueResponse {
        success: true,
        message: "Categorization endpoint configured".to_string(),
    }))
}

/// Best-effort TOML sync: load, mutate, write back atomically
fn sync_to_toml(mutate: impl FnOnce(&mut TomlConfig)) {
    let path = toml_config_path("call-ingest");
    let mut config = match load_toml_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!("TOML sync skipped, load failed (database write succeeded): {}", e);
            return;
        }
    };

    mutate(&mut config);

    match write_toml_config(&config, &path) {
        Ok(()) => info!("Settings synced to TOML: {}", path.display()),
        Err(e) => warn!("TOML sync failed (database write succeeded): {}", e),
    }
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/settings/stt_api_key", put(set_stt_api_key))
        .route("/settings/categorizer_url", put(set_categorizer_url))
}
