//! Batch orchestration over call records
//!
//! Loads candidate records, flags the ones already persisted, then runs
//! the per-record pipeline strictly sequentially. A failure in record N
//! is recorded and never prevents record N+1 from starting.

use super::{BatchSummary, RecordError, RecordOutcome, RecordStatus};
use crate::db::call_logs::{self, CallLogFilter};
use crate::services::persistence::TranscriptionStore;
use crate::workflow::pipeline::RecordProcessor;
use callscribe_common::Result;
use sqlx::SqlitePool;

/// Sequential batch runner
pub struct BatchOrchestrator<P: RecordProcessor> {
    db: SqlitePool,
    store: TranscriptionStore,
    processor: P,
}

impl<P: RecordProcessor> BatchOrchestrator<P> {
    pub fn new(db: SqlitePool, store: TranscriptionStore, processor: P) -> Self {
        Self {
            db,
            store,
            processor,
        }
    }

    /// Run one batch
    ///
    /// The filter's optional identifier set doubles as a reprocessing
    /// request: explicitly named calls run the pipeline even when a row
    /// already exists (the upsert converges), while time-range batches
    /// only process calls still missing a transcription.
    pub async fn run(&self, filter: &CallLogFilter) -> Result<BatchSummary> {
        let mut records = call_logs::fetch_call_records(&self.db, filter).await?;
        let reprocess_existing = filter.call_ids.is_some();

        let ids: Vec<String> = records.iter().map(|r| r.call_id.clone()).collect();
        let existing = self.store.check_existing(&ids).await;
        for record in &mut records {
            record.already_persisted = existing.contains(&record.call_id);
        }

        let total_records = records.len();
        let existing_count = existing.len();
        let mut summary = BatchSummary {
            total_records,
            existing_count,
            missing_count: total_records - existing_count,
            processed_count: 0,
            errors: Vec::new(),
            per_record_results: Vec::new(),
        };

        tracing::info!(
            total = total_records,
            existing = existing_count,
            missing = summary.missing_count,
            reprocess_existing,
            "Starting batch"
        );

        for record in &records {
            if record.already_persisted && !reprocess_existing {
                summary.per_record_results.push(RecordOutcome {
                    call_id: record.call_id.clone(),
                    status: RecordStatus::AlreadyPersisted,
                    message: None,
                });
                continue;
            }

            match self.processor.process(record).await {
                Ok(()) => {
                    summary.processed_count += 1;
                    summary.per_record_results.push(RecordOutcome {
                        call_id: record.call_id.clone(),
                        status: RecordStatus::Processed,
                        message: None,
                    });
                }
                Err(e) => {
                    tracing::error!(call_id = %record.call_id, error = %e, "Record failed");
                    summary.errors.push(RecordError {
                        identifier: record.call_id.clone(),
                        message: e.to_string(),
                    });
                    summary.per_record_results.push(RecordOutcome {
                        call_id: record.call_id.clone(),
                        status: RecordStatus::Failed,
                        message: Some(e.to_string()),
                    });
                    // Per-record isolation: continue with the next record
                }
            }
        }

        tracing::info!(
            processed = summary.processed_count,
            failed = summary.errors.len(),
            "Batch complete"
        );

        Ok(summary)
    }
}
