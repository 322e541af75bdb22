//! Persisted transcription rows
//!
//! One row per call identifier. Structured subpayloads (speakers,
//! sentiment, entities, categories) are serialized to JSON text here at
//! the persistence boundary; the pipeline passes typed values around.

use callscribe_common::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

/// Durable transcription record
#[derive(Debug, Clone)]
pub struct TranscriptionRow {
    pub call_id: String,
    pub agent: Option<String>,
    pub queue: Option<String>,
    pub campaign: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub disposition: Option<String>,
    pub transcript_text: String,
    /// JSON array of role-mapped utterances
    pub speakers: String,
    /// JSON array of sentiment results
    pub sentiment: String,
    /// JSON array of detected entities
    pub entities: String,
    pub summary: Option<String>,
    pub primary_category: String,
    /// JSON array of ranked topic categories
    pub topic_categories: String,
    pub category_confidence: Option<f64>,
    pub duration_seconds: Option<f64>,
}

/// Check whether a row exists for a call identifier
///
/// Backend "not found" is the `false` branch; any other query error
/// propagates so ambiguous existence state never silently resolves.
pub async fn exists(pool: &SqlitePool, call_id: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM transcriptions WHERE call_id = ?")
        .bind(call_id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)?;

    Ok(row.is_some())
}

/// Insert a new transcription row
pub async fn insert(pool: &SqlitePool, row: &TranscriptionRow) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO transcriptions (
            call_id, agent, queue, campaign, initiated_at, disposition,
            transcript_text, speakers, sentiment, entities, summary,
            primary_category, topic_categories, category_confidence,
            duration_seconds, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(&row.call_id)
    .bind(&row.agent)
    .bind(&row.queue)
    .bind(&row.campaign)
    .bind(row.initiated_at)
    .bind(&row.disposition)
    .bind(&row.transcript_text)
    .bind(&row.speakers)
    .bind(&row.sentiment)
    .bind(&row.entities)
    .bind(&row.summary)
    .bind(&row.primary_category)
    .bind(&row.topic_categories)
    .bind(row.category_confidence)
    .bind(row.duration_seconds)
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

/// Update all mutable fields of an existing row in place
pub async fn update(pool: &SqlitePool, row: &TranscriptionRow) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE transcriptions SET
            agent = ?,
            queue = ?,
            campaign = ?,
            initiated_at = ?,
            disposition = ?,
            transcript_text = ?,
            speakers = ?,
            sentiment = ?,
            entities = ?,
            summary = ?,
            primary_category = ?,
            topic_categories = ?,
            category_confidence = ?,
            duration_seconds = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE call_id = ?
        "#,
    )
    .bind(&row.agent)
    .bind(&row.queue)
    .bind(&row.campaign)
    .bind(row.initiated_at)
    .bind(&row.disposition)
    .bind(&row.transcript_text)
    .bind(&row.speakers)
    .bind(&row.sentiment)
    .bind(&row.entities)
    .bind(&row.summary)
    .bind(&row.primary_category)
    .bind(&row.topic_categories)
    .bind(row.category_confidence)
    .bind(row.duration_seconds)
    .bind(&row.call_id)
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

/// Fetch a persisted row by call identifier
pub async fn fetch(pool: &SqlitePool, call_id: &str) -> Result<Option<TranscriptionRow>> {
    let row = sqlx::query(
        r#"
        SELECT call_id, agent, queue, campaign, initiated_at, disposition,
               transcript_text, speakers, sentiment, entities, summary,
               primary_category, topic_categories, category_confidence,
               duration_seconds
        FROM transcriptions WHERE call_id = ?
        "#,
    )
    .bind(call_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::Database)?;

    match row {
        None => Ok(None),
        Some(row) => Ok(Some(TranscriptionRow {
            call_id: row.try_get("call_id").map_err(Error::Database)?,
            agent: row.try_get("agent").map_err(Error::Database)?,
            queue: row.try_get("queue").map_err(Error::Database)?,
            campaign: row.try_get("campaign").map_err(Error::Database)?,
            initiated_at: row.try_get("initiated_at").map_err(Error::Database)?,
            disposition: row.try_get("disposition").map_err(Error::Database)?,
            transcript_text: row.try_get("transcript_text").map_err(Error::Database)?,
            speakers: row.try_get("speakers").map_err(Error::Database)?,
            sentiment: row.try_get("sentiment").map_err(Error::Database)?,
            entities: row.try_get("entities").map_err(Error::Database)?,
            summary: row.try_get("summary").map_err(Error::Database)?,
            primary_category: row.try_get("primary_category").map_err(Error::Database)?,
            topic_categories: row.try_get("topic_categories").map_err(Error::Database)?,
            category_confidence: row.try_get("category_confidence").map_err(Error::Database)?,
            duration_seconds: row.try_get("duration_seconds").map_err(Error::Database)?,
        })),
    }
}

/// Return the subset of `call_ids` that already have a row
///
/// Single-query variant; chunking across backend query-size limits lives
/// in the persistence service.
pub async fn select_existing(pool: &SqlitePool, call_ids: &[String]) -> Result<Vec<String>> {
    if call_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query =
        QueryBuilder::<Sqlite>::new("SELECT call_id FROM transcriptions WHERE call_id IN (");
    let mut ids = query.separated(", ");
    for call_id in call_ids {
        ids.push_bind(call_id);
    }
    query.push(")");

    let rows = query
        .build()
        .fetch_all(pool)
        .await
        .map_err(Error::Database)?;

    rows.into_iter()
        .map(|row| row.try_get("call_id").map_err(Error::Database))
        .collect()
}
