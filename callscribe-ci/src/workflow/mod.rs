//! Batch transcription workflow
//!
//! One record flows locate → fetch → transcribe → categorize → persist;
//! the batch orchestrator runs records strictly sequentially and isolates
//! per-record failures.

pub mod batch;
pub mod pipeline;

pub use batch::BatchOrchestrator;
pub use pipeline::{PipelineError, RecordPipeline, RecordProcessor};

use serde::Serialize;

/// Outcome classification for one record in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// A persisted row already existed and the record was not reprocessed
    AlreadyPersisted,
    /// The record ran the full pipeline and was persisted
    Processed,
    /// The pipeline failed for this record; see the error list
    Failed,
}

/// Per-record result reported in the batch summary
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub call_id: String,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One failed record: identifier plus the failure message
#[derive(Debug, Clone, Serialize)]
pub struct RecordError {
    pub identifier: String,
    pub message: String,
}

/// Stable batch result shape regardless of caller
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total_records: usize,
    pub existing_count: usize,
    pub missing_count: usize,
    pub processed_count: usize,
    pub errors: Vec<RecordError>,
    pub per_record_results: Vec<RecordOutcome>,
}
