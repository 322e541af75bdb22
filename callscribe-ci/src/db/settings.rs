//! Settings database operations
//!
//! Get/set accessors for the settings table following a key-value pattern.
//! The database is the authoritative tier of credential resolution.

use callscribe_common::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Get the speech-to-text provider API key from the database
///
/// **Returns:** Some(key) if set, None otherwise
pub async fn get_stt_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, "stt_api_key").await
}

/// Set the speech-to-text provider API key in the database
pub async fn set_stt_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, "stt_api_key", key).await
}

/// Get the categorization service endpoint URL
pub async fn get_categorizer_url(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, "categorizer_url").await
}

/// Set the categorization service endpoint URL
pub async fn set_categorizer_url(db: &Pool<Sqlite>, url: String) -> Result<()> {
    set_setting(db, "categorizer_url", url).await
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting failed: {}", e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_get_unset_key_returns_none() {
        let pool = setup_test_db().await;
        assert!(get_stt_api_key(&pool).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_then_get_roundtrip() {
        let pool = setup_test_db().await;
        set_stt_api_key(&pool, "key-123".to_string()).await.unwrap();
        assert_eq!(
            get_stt_api_key(&pool).await.unwrap().as_deref(),
            Some("key-123")
        );
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_value() {
        let pool = setup_test_db().await;
        set_stt_api_key(&pool, "old".to_string()).await.unwrap();
        set_stt_api_key(&pool, "new".to_string()).await.unwrap();
        assert_eq!(
            get_stt_api_key(&pool).await.unwrap().as_deref(),
            Some("new")
        );
    }
}
