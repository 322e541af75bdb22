//! Batch transcription endpoints
//!
//! One parameterized entry point runs the pipeline over a time range or
//! an explicit identifier set; a lightweight status endpoint answers
//! existence checks without touching the pipeline.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::call_logs::CallLogFilter;
use crate::error::{ApiError, ApiResult};
use crate::services::categorizer::CategorizerClient;
use crate::services::path_locator::PathLocator;
use crate::services::persistence::TranscriptionStore;
use crate::services::recording_fetcher::RecordingFetcher;
use crate::services::sftp::SftpRecordingServer;
use crate::services::transcription::TranscriptionOrchestrator;
use crate::services::transcription_client::SttClient;
use crate::workflow::{BatchOrchestrator, BatchSummary, RecordPipeline};
use crate::AppState;

/// POST /transcriptions/process request body
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Explicit call identifiers; also requests reprocessing of calls
    /// that already have a transcription
    pub call_ids: Option<Vec<String>>,
}

/// GET /transcriptions/status query parameters
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Comma-separated call identifiers
    pub ids: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub requested: usize,
    pub found: Vec<String>,
}

/// POST /transcriptions/process
///
/// Validates the filter and resolves provider credentials before any
/// record is attempted; per-record failures land in the summary's error
/// list, never in the HTTP status.
pub async fn process_batch(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> ApiResult<Json<BatchSummary>> {
    let has_ids = request
        .call_ids
        .as_ref()
        .map(|ids| !ids.is_empty())
        .unwrap_or(false);
    if !has_ids && request.from.is_none() && request.to.is_none() {
        return Err(ApiError::BadRequest(
            "provide a time range (from/to) or a non-empty call_ids list".to_string(),
        ));
    }
    if let (Some(from), Some(to)) = (request.from, request.to) {
        if from > to {
            return Err(ApiError::BadRequest("from must not be after to".to_string()));
        }
    }

    // Infrastructure checks up front, before touching any record
    let stt_api_key = crate::config::resolve_stt_api_key(&state.db, &state.toml_config)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let server_config = state
        .toml_config
        .recording_server
        .clone()
        .ok_or_else(|| ApiError::Internal("recording server not configured".to_string()))?;
    let categorizer_url =
        crate::config::resolve_categorizer_url(&state.db, &state.toml_config).await?;
    let categorizer = categorizer_url.map(CategorizerClient::new).transpose()?;

    let stt = Arc::new(
        SttClient::new(stt_api_key).map_err(|e| ApiError::Internal(e.to_string()))?,
    );
    let pipeline = RecordPipeline::new(
        PathLocator::new(server_config.remote_root.clone()),
        RecordingFetcher::new(SftpRecordingServer::new(server_config)),
        stt.clone(),
        TranscriptionOrchestrator::new(stt),
        categorizer,
        TranscriptionStore::new(state.db.clone(), state.caches.clone()),
    );
    let orchestrator = BatchOrchestrator::new(
        state.db.clone(),
        TranscriptionStore::new(state.db.clone(), state.caches.clone()),
        pipeline,
    );

    let filter = CallLogFilter {
        from: request.from,
        to: request.to,
        call_ids: request.call_ids,
    };

    match orchestrator.run(&filter).await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => {
            *state.last_error.write().await = Some(e.to_string());
            Err(ApiError::Common(e))
        }
    }
}

/// GET /transcriptions/status?ids=a,b,c
///
/// Cache-accelerated batch existence check only; no pipeline work.
pub async fn transcription_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<StatusResponse>> {
    let ids: Vec<String> = query
        .ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect();

    if ids.is_empty() {
        return Err(ApiError::BadRequest(
            "ids must contain at least one identifier".to_string(),
        ));
    }

    let store = TranscriptionStore::new(state.db.clone(), state.caches.clone());
    let mut found: Vec<String> = store.check_existing(&ids).await.into_iter().collect();
    found.sort();

    Ok(Json(StatusResponse {
        requested: ids.len(),
        found,
    }))
}

/// GET /transcriptions/:call_id
///
/// Persisted payload snapshot for one call, served through the payload
/// cache.
pub async fn transcription_detail(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let store = TranscriptionStore::new(state.db.clone(), state.caches.clone());
    let payload = store
        .fetch_payload(&call_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    match payload {
        Some(payload) => Ok(Json(payload)),
        None => Err(ApiError::NotFound(format!(
            "no transcription for call {}",
            call_id
        ))),
    }
}

/// Build transcription routes
pub fn transcription_routes() -> Router<AppState> {
    Router::new()
        .route("/transcriptions/process", post(process_batch))
        .route("/transcriptions/status", get(transcription_status))
        .route("/transcriptions/:call_id", get(transcription_detail))
}
