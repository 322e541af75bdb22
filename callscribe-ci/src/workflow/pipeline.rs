//! Per-record processing pipeline
//!
//! Stages execute strictly in order: locate candidate paths, fetch the
//! recording, transcribe it, categorize the transcript (best effort), and
//! persist the enriched row. Any stage failure except categorization
//! aborts processing for that single record.

use crate::services::categorizer::CategorizerClient;
use crate::services::path_locator::PathLocator;
use crate::services::persistence::{PersistenceError, TranscriptionStore};
use crate::services::recording_fetcher::{FetchError, RecordingFetcher, RemoteFileServer};
use crate::services::transcription::{TranscriptionError, TranscriptionOrchestrator};
use crate::services::transcription_client::{SttClient, SubmitOptions};
use crate::types::CallRecord;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Terminal failure for one record's pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The call log row carries no recording locator at all
    #[error("Call record has an empty recording hint")]
    EmptyHint,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Seam for the batch orchestrator, so batch accounting is testable
/// without a live provider or file server
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    async fn process(&self, record: &CallRecord) -> Result<(), PipelineError>;
}

/// The production per-record pipeline
pub struct RecordPipeline<S: RemoteFileServer> {
    locator: PathLocator,
    fetcher: RecordingFetcher<S>,
    stt: Arc<SttClient>,
    orchestrator: TranscriptionOrchestrator<Arc<SttClient>>,
    categorizer: Option<CategorizerClient>,
    store: TranscriptionStore,
    submit_options: SubmitOptions,
}

impl<S: RemoteFileServer> RecordPipeline<S> {
    pub fn new(
        locator: PathLocator,
        fetcher: RecordingFetcher<S>,
        stt: Arc<SttClient>,
        orchestrator: TranscriptionOrchestrator<Arc<SttClient>>,
        categorizer: Option<CategorizerClient>,
        store: TranscriptionStore,
    ) -> Self {
        Self {
            locator,
            fetcher,
            stt,
            orchestrator,
            categorizer,
            store,
            submit_options: SubmitOptions::default(),
        }
    }
}

#[async_trait]
impl<S: RemoteFileServer> RecordProcessor for RecordPipeline<S> {
    async fn process(&self, record: &CallRecord) -> Result<(), PipelineError> {
        let hint = record.recording_hint.trim();
        if hint.is_empty() {
            return Err(PipelineError::EmptyHint);
        }

        // Stage 1-2: locate and fetch
        let candidates = self.locator.locate(hint);
        tracing::debug!(
            call_id = %record.call_id,
            candidates = candidates.len(),
            "Probing recording candidates"
        );
        let recording = self.fetcher.fetch(&candidates).await?;

        // Stage 3: transcribe (upload, submit, poll to terminal)
        let upload_url = self
            .stt
            .upload(recording.bytes)
            .await
            .map_err(TranscriptionError::from)?;
        let job_id = self
            .stt
            .submit(&upload_url, &self.submit_options)
            .await
            .map_err(TranscriptionError::from)?;
        let job = self.orchestrator.await_completion(&job_id).await?;
        let transcript = job.transcript.unwrap_or_default();

        // Stage 4: categorize, best effort; absence degrades downstream
        let categorization = match &self.categorizer {
            Some(categorizer) => categorizer.categorize(&transcript).await,
            None => None,
        };

        // Stage 5: persist exactly one row for this call
        let row = TranscriptionStore::build_row(record, &transcript, categorization.as_ref())?;
        self.store.upsert(&row).await?;

        tracing::info!(
            call_id = %record.call_id,
            utterances = transcript.utterances.len(),
            category = %row.primary_category,
            "Record processed and persisted"
        );

        Ok(())
    }
}
