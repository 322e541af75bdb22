//! Call log queries
//!
//! The call log is written by the upstream telephony exporter and is
//! read-only here. Candidate records for transcription are calls with an
//! agent, with a meaningful disposition, optionally bounded by a timestamp
//! range and an explicit identifier set, newest first.

use crate::types::CallRecord;
use callscribe_common::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

/// Dispositions that never produce a useful recording
const EXCLUDED_DISPOSITIONS: [&str; 4] = ["", "NO ANSWER", "BUSY", "FAILED"];

/// Filter for candidate call records
///
/// One parameterized entry point serves both "find calls missing a
/// transcription" (time range only) and "reprocess these specific calls"
/// (identifier set).
#[derive(Debug, Clone, Default)]
pub struct CallLogFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub call_ids: Option<Vec<String>>,
}

/// Fetch candidate call records, descending by initiation time
pub async fn fetch_call_records(
    pool: &SqlitePool,
    filter: &CallLogFilter,
) -> Result<Vec<CallRecord>> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT call_id, recording_hint, agent, queue, campaign, initiated_at, disposition \
         FROM call_logs \
         WHERE agent IS NOT NULL AND agent != '' \
         AND disposition IS NOT NULL AND disposition NOT IN (",
    );

    let mut dispositions = query.separated(", ");
    for excluded in EXCLUDED_DISPOSITIONS {
        dispositions.push_bind(excluded);
    }
    query.push(")");

    if let Some(from) = filter.from {
        query.push(" AND initiated_at >= ");
        query.push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(" AND initiated_at <= ");
        query.push_bind(to);
    }
    if let Some(call_ids) = &filter.call_ids {
        query.push(" AND call_id IN (");
        let mut ids = query.separated(", ");
        for call_id in call_ids {
            ids.push_bind(call_id);
        }
        query.push(")");
    }

    query.push(" ORDER BY initiated_at DESC");

    let rows = query
        .build()
        .fetch_all(pool)
        .await
        .map_err(Error::Database)?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(CallRecord {
            call_id: row.try_get("call_id").map_err(Error::Database)?,
            recording_hint: row.try_get("recording_hint").map_err(Error::Database)?,
            agent: row.try_get("agent").map_err(Error::Database)?,
            queue: row.try_get("queue").map_err(Error::Database)?,
            campaign: row.try_get("campaign").map_err(Error::Database)?,
            initiated_at: row.try_get("initiated_at").map_err(Error::Database)?,
            disposition: row.try_get("disposition").map_err(Error::Database)?,
            already_persisted: false,
        });
    }

    Ok(records)
}

/// Insert a call log row (used by tests and the local exporter shim)
pub async fn insert_call_record(pool: &SqlitePool, record: &CallRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO call_logs (call_id, recording_hint, agent, queue, campaign, initiated_at, disposition)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.call_id)
    .bind(&record.recording_hint)
    .bind(&record.agent)
    .bind(&record.queue)
    .bind(&record.campaign)
    .bind(record.initiated_at)
    .bind(&record.disposition)
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
