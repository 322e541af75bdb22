//! Idempotent transcription persistence
//!
//! Writes converge to exactly one row per call identifier no matter how
//! many times a record passes through the pipeline (retried batches,
//! manual reprocessing). The write path is existence-then-branch, not a
//! blind insert-or-ignore: an ambiguous existence query must surface as an
//! error instead of silently picking a branch.

use crate::db::transcriptions::{self, TranscriptionRow};
use crate::services::existence_cache::PipelineCaches;
use crate::types::{CallRecord, CategorizationResult, Transcript, UNCATEGORISED};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Backend query-size limits cap how many identifiers one existence query
/// may carry
const EXISTENCE_CHUNK_SIZE: usize = 100;

/// Persistence failures are terminal for the affected record
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Existence query failed: neither branch may be taken
    #[error("Existence check failed for {call_id}: {detail}")]
    AmbiguousExistence { call_id: String, detail: String },

    #[error("Write failed for {call_id}: {detail}")]
    Write { call_id: String, detail: String },

    #[error("Read failed for {call_id}: {detail}")]
    Read { call_id: String, detail: String },

    #[error("Payload serialization failed for {call_id}: {detail}")]
    Serialize { call_id: String, detail: String },
}

/// Cache-accelerated store for enriched transcription rows
pub struct TranscriptionStore {
    db: SqlitePool,
    caches: Arc<PipelineCaches>,
    chunk_size: usize,
}

impl TranscriptionStore {
    pub fn new(db: SqlitePool, caches: Arc<PipelineCaches>) -> Self {
        Self {
            db,
            caches,
            chunk_size: EXISTENCE_CHUNK_SIZE,
        }
    }

    /// Assemble the durable row from the record and its enrichment
    ///
    /// Structured subpayloads are serialized here, once, at the
    /// persistence boundary. Absent categorization becomes the explicit
    /// "Uncategorised" sentinel.
    pub fn build_row(
        record: &CallRecord,
        transcript: &Transcript,
        categorization: Option<&CategorizationResult>,
    ) -> Result<TranscriptionRow, PersistenceError> {
        let speakers = to_json(&record.call_id, "speakers", &transcript.utterances)?;
        let sentiment = to_json(&record.call_id, "sentiment", &transcript.sentiment)?;
        let entities = to_json(&record.call_id, "entities", &transcript.entities)?;

        let (primary_category, topic_categories, category_confidence) = match categorization {
            Some(result) => (
                result.primary_category.clone(),
                to_json(&record.call_id, "topic_categories", &result.topic_categories)?,
                Some(result.confidence),
            ),
            None => (UNCATEGORISED.to_string(), "[]".to_string(), None),
        };

        Ok(TranscriptionRow {
            call_id: record.call_id.clone(),
            agent: record.agent.clone(),
            queue: record.queue.clone(),
            campaign: record.campaign.clone(),
            initiated_at: record.initiated_at,
            disposition: record.disposition.clone(),
            transcript_text: transcript.text.clone().unwrap_or_default(),
            speakers,
            sentiment,
            entities,
            summary: transcript.summary.clone(),
            primary_category,
            topic_categories,
            category_confidence,
            duration_seconds: transcript.duration_seconds,
        })
    }

    /// Upsert by identifier: existence check, then insert or update
    pub async fn upsert(&self, row: &TranscriptionRow) -> Result<(), PersistenceError> {
        let exists = transcriptions::exists(&self.db, &row.call_id)
            .await
            .map_err(|e| PersistenceError::AmbiguousExistence {
                call_id: row.call_id.clone(),
                detail: e.to_string(),
            })?;

        let write_result = if exists {
            tracing::debug!(call_id = %row.call_id, "Row exists, updating in place");
            transcriptions::update(&self.db, row).await
        } else {
            tracing::debug!(call_id = %row.call_id, "No row yet, inserting");
            transcriptions::insert(&self.db, row).await
        };

        write_result.map_err(|e| PersistenceError::Write {
            call_id: row.call_id.clone(),
            detail: e.to_string(),
        })?;

        self.caches.existence.put(row.call_id.clone(), true).await;
        // A rewritten row invalidates any cached payload snapshot
        self.caches.payload.remove(&row.call_id).await;

        Ok(())
    }

    /// Fetch one persisted payload snapshot, through the payload cache
    ///
    /// Subpayload columns are parsed back into JSON values so the
    /// snapshot is one structured object, not strings of JSON.
    pub async fn fetch_payload(
        &self,
        call_id: &str,
    ) -> Result<Option<serde_json::Value>, PersistenceError> {
        if let Some(payload) = self.caches.payload.get(call_id).await {
            return Ok(Some(payload));
        }

        let row = match transcriptions::fetch(&self.db, call_id).await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => {
                return Err(PersistenceError::Read {
                    call_id: call_id.to_string(),
                    detail: e.to_string(),
                })
            }
        };

        let payload = serde_json::json!({
            "call_id": row.call_id,
            "agent": row.agent,
            "queue": row.queue,
            "campaign": row.campaign,
            "initiated_at": row.initiated_at,
            "disposition": row.disposition,
            "transcript_text": row.transcript_text,
            "speakers": parse_column(call_id, "speakers", &row.speakers)?,
            "sentiment": parse_column(call_id, "sentiment", &row.sentiment)?,
            "entities": parse_column(call_id, "entities", &row.entities)?,
            "summary": row.summary,
            "primary_category": row.primary_category,
            "topic_categories": parse_column(call_id, "topic_categories", &row.topic_categories)?,
            "category_confidence": row.category_confidence,
            "duration_seconds": row.duration_seconds,
        });

        self.caches
            .payload
            .put(call_id.to_string(), payload.clone())
            .await;
        self.caches.existence.put(call_id.to_string(), true).await;

        Ok(Some(payload))
    }

    /// Cache-accelerated batch existence check
    ///
    /// Identifiers answered by a live cache entry skip the database;
    /// the remainder is queried in chunks. A single chunk's failure is
    /// logged and tolerated without discarding other chunks' results.
    pub async fn check_existing(&self, call_ids: &[String]) -> HashSet<String> {
        let mut found = HashSet::new();
        let mut unknown = Vec::new();

        for call_id in call_ids {
            match self.caches.existence.get(call_id).await {
                Some(true) => {
                    found.insert(call_id.clone());
                }
                Some(false) => {
                    // Cached miss within TTL; no query needed
                }
                None => unknown.push(call_id.clone()),
            }
        }

        let db = self.db.clone();
        let queried = select_existing_chunked(&unknown, self.chunk_size, |chunk| {
            let db = db.clone();
            async move {
                transcriptions::select_existing(&db, &chunk)
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await;

        for (call_id, exists) in queried {
            if exists {
                found.insert(call_id.clone());
            }
            self.caches.existence.put(call_id, exists).await;
        }

        found
    }
}

/// Chunked existence query: one underlying query per `chunk_size`
/// identifiers, union of all successful chunks
///
/// Returns the per-identifier verdicts of the chunks that succeeded;
/// identifiers in failed chunks are omitted entirely (unknown, not
/// absent).
pub async fn select_existing_chunked<F, Fut>(
    call_ids: &[String],
    chunk_size: usize,
    mut query: F,
) -> Vec<(String, bool)>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<String>, String>>,
{
    let mut verdicts = Vec::new();

    for chunk in call_ids.chunks(chunk_size.max(1)) {
        match query(chunk.to_vec()).await {
            Ok(existing) => {
                let existing: HashSet<String> = existing.into_iter().collect();
                for call_id in chunk {
                    verdicts.push((call_id.clone(), existing.contains(call_id)));
                }
            }
            Err(e) => {
                tracing::warn!(
                    chunk_len = chunk.len(),
                    error = %e,
                    "Existence chunk query failed, skipping chunk"
                );
            }
        }
    }

    verdicts
}

fn to_json<T: serde::Serialize>(
    call_id: &str,
    what: &str,
    value: &T,
) -> Result<String, PersistenceError> {
    serde_json::to_string(value).map_err(|e| PersistenceError::Serialize {
        call_id: call_id.to_string(),
        detail: format!("{}: {}", what, e),
    })
}

/// Parse a JSON text column back into a value; the column was written by
/// [`to_json`], so a parse failure means a corrupted row
fn parse_column(
    call_id: &str,
    what: &str,
    raw: &str,
) -> Result<serde_json::Value, PersistenceError> {
    serde_json::from_str(raw).map_err(|e| PersistenceError::Serialize {
        call_id: call_id.to_string(),
        detail: format!("{}: {}", what, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Utterance;
    use chrono::TimeZone;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn setup_store() -> TranscriptionStore {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        TranscriptionStore::new(pool, Arc::new(PipelineCaches::new()))
    }

    fn record(call_id: &str) -> CallRecord {
        CallRecord {
            call_id: call_id.to_string(),
            recording_hint: format!("{}.wav", call_id),
            agent: Some("alice".to_string()),
            queue: Some("support".to_string()),
            campaign: None,
            initiated_at: Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap(),
            disposition: Some("ANSWERED".to_string()),
            already_persisted: false,
        }
    }

    fn transcript(text: &str) -> Transcript {
        Transcript {
            text: Some(text.to_string()),
            utterances: vec![Utterance {
                text: text.to_string(),
                speaker: "Agent".to_string(),
                start_ms: 0,
                end_ms: 800,
                confidence: 0.96,
            }],
            duration_seconds: Some(42.0),
            ..Transcript::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_twice_converges_to_second_payload() {
        let store = setup_store().await;
        let record = record("c1");

        let first = TranscriptionStore::build_row(&record, &transcript("first"), None).unwrap();
        let second = TranscriptionStore::build_row(&record, &transcript("second"), None).unwrap();

        store.upsert(&first).await.unwrap();
        store.upsert(&second).await.unwrap();

        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT transcript_text FROM transcriptions WHERE call_id = 'c1'")
                .fetch_all(&store.db)
                .await
                .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "second");
    }

    #[tokio::test]
    async fn test_ambiguous_existence_check_is_an_error() {
        let store = setup_store().await;
        sqlx::query("DROP TABLE transcriptions")
            .execute(&store.db)
            .await
            .unwrap();

        let row =
            TranscriptionStore::build_row(&record("c1"), &transcript("hello"), None).unwrap();
        let err = store.upsert(&row).await.unwrap_err();
        assert!(matches!(err, PersistenceError::AmbiguousExistence { .. }));
    }

    #[tokio::test]
    async fn test_missing_categorization_persists_sentinel() {
        let row = TranscriptionStore::build_row(&record("c1"), &transcript("hi"), None).unwrap();
        assert_eq!(row.primary_category, UNCATEGORISED);
        assert_eq!(row.topic_categories, "[]");
        assert!(row.category_confidence.is_none());
    }

    #[tokio::test]
    async fn test_categorization_is_serialized_once() {
        let categorization = CategorizationResult {
            primary_category: "Billing".to_string(),
            topic_categories: vec!["Billing".to_string(), "Refunds".to_string()],
            confidence: 0.88,
        };
        let row =
            TranscriptionStore::build_row(&record("c1"), &transcript("hi"), Some(&categorization))
                .unwrap();
        assert_eq!(row.primary_category, "Billing");
        assert_eq!(row.topic_categories, r#"["Billing","Refunds"]"#);
        assert_eq!(row.category_confidence, Some(0.88));
    }

    #[tokio::test]
    async fn test_chunked_existence_250_ids_issues_3_queries() {
        let ids: Vec<String> = (0..250).map(|i| format!("c{}", i)).collect();
        let queries = AtomicUsize::new(0);

        let verdicts = select_existing_chunked(&ids, 100, |chunk| {
            queries.fetch_add(1, Ordering::SeqCst);
            async move {
                // Every id in the chunk exists
                Ok(chunk)
            }
        })
        .await;

        assert_eq!(queries.load(Ordering::SeqCst), 3);
        assert_eq!(verdicts.len(), 250);
        assert!(verdicts.iter().all(|(_, exists)| *exists));
    }

    #[tokio::test]
    async fn test_chunked_existence_tolerates_one_failed_chunk() {
        let ids: Vec<String> = (0..250).map(|i| format!("c{}", i)).collect();
        let queries = AtomicUsize::new(0);

        let verdicts = select_existing_chunked(&ids, 100, |chunk| {
            let call = queries.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 1 {
                    Err("chunk query failed".to_string())
                } else {
                    Ok(chunk)
                }
            }
        })
        .await;

        // Chunks 1 and 3 contribute; the failed middle chunk is omitted
        assert_eq!(verdicts.len(), 150);
        assert!(verdicts.iter().all(|(id, _)| {
            let n: usize = id[1..].parse().unwrap();
            !(100..200).contains(&n)
        }));
    }

    #[tokio::test]
    async fn test_check_existing_uses_cache_before_database() {
        let store = setup_store().await;
        let row = TranscriptionStore::build_row(&record("c1"), &transcript("hi"), None).unwrap();
        store.upsert(&row).await.unwrap();

        // Drop the table: if the cache answers, no query runs
        sqlx::query("DROP TABLE transcriptions")
            .execute(&store.db)
            .await
            .unwrap();

        let found = store.check_existing(&["c1".to_string()]).await;
        assert!(found.contains("c1"));
    }

    #[tokio::test]
    async fn test_fetch_payload_parses_subpayload_columns() {
        let store = setup_store().await;
        let row = TranscriptionStore::build_row(&record("c1"), &transcript("hi"), None).unwrap();
        store.upsert(&row).await.unwrap();

        let payload = store.fetch_payload("c1").await.unwrap().unwrap();
        assert_eq!(payload["call_id"], "c1");
        assert_eq!(payload["primary_category"], UNCATEGORISED);
        // Subpayloads come back as structured JSON, not strings
        assert!(payload["speakers"].is_array());
        assert_eq!(payload["speakers"][0]["speaker"], "Agent");
    }

    #[tokio::test]
    async fn test_fetch_payload_absent_row_is_none() {
        let store = setup_store().await;
        assert!(store.fetch_payload("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_payload_served_from_cache_after_first_read() {
        let store = setup_store().await;
        let row = TranscriptionStore::build_row(&record("c1"), &transcript("hi"), None).unwrap();
        store.upsert(&row).await.unwrap();

        // First read populates the payload cache
        store.fetch_payload("c1").await.unwrap().unwrap();

        // Drop the table: if the cache answers, no query runs
        sqlx::query("DROP TABLE transcriptions")
            .execute(&store.db)
            .await
            .unwrap();

        let payload = store.fetch_payload("c1").await.unwrap().unwrap();
        assert_eq!(payload["call_id"], "c1");
    }

    #[tokio::test]
    async fn test_upsert_invalidates_cached_payload() {
        let store = setup_store().await;
        let record = record("c1");

        let first = TranscriptionStore::build_row(&record, &transcript("first"), None).unwrap();
        store.upsert(&first).await.unwrap();
        store.fetch_payload("c1").await.unwrap().unwrap();

        let second = TranscriptionStore::build_row(&record, &transcript("second"), None).unwrap();
        store.upsert(&second).await.unwrap();

        let payload = store.fetch_payload("c1").await.unwrap().unwrap();
        assert_eq!(payload["transcript_text"], "second");
    }
}
