//! Database access for callscribe-ci
//!
//! One shared SQLite database holds the upstream call log, the persisted
//! transcriptions, and the settings table.

pub mod call_logs;
pub mod settings;
pub mod transcriptions;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize callscribe-ci tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    // Settings table for credential persistence
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Upstream call log (written by the telephony exporter)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS call_logs (
            call_id TEXT PRIMARY KEY,
            recording_hint TEXT NOT NULL,
            agent TEXT,
            queue TEXT,
            campaign TEXT,
            initiated_at TEXT NOT NULL,
            disposition TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Enriched transcription rows, exactly one per call_id
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcriptions (
            call_id TEXT PRIMARY KEY,
            agent TEXT,
            queue TEXT,
            campaign TEXT,
            initiated_at TEXT NOT NULL,
            disposition TEXT,
            transcript_text TEXT NOT NULL DEFAULT '',
            speakers TEXT NOT NULL DEFAULT '[]',
            sentiment TEXT NOT NULL DEFAULT '[]',
            entities TEXT NOT NULL DEFAULT '[]',
            summary TEXT,
            primary_category TEXT NOT NULL DEFAULT 'Uncategorised',
            topic_categories TEXT NOT NULL DEFAULT '[]',
            category_confidence REAL,
            duration_seconds REAL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (settings, call_logs, transcriptions)");

    Ok(())
}
