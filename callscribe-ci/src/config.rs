//! Credential resolution for callscribe-ci
//!
//! Multi-tier resolution with Database → ENV → TOML priority. The
//! database tier is authoritative so credentials set through the API
//! survive restarts regardless of deployment environment.

use callscribe_common::config::TomlConfig;
use callscribe_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

/// Resolve the speech-to-text provider API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_stt_api_key(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<String> {
    let mut sources = Vec::new();

    // Tier 1: Database (authoritative)
    let db_key = crate::db::settings::get_stt_api_key(db).await?;
    if db_key.as_deref().is_some_and(is_valid_key) {
        sources.push("database");
    }

    // Tier 2: Environment variable
    let env_key = std::env::var("CALLSCRIBE_STT_API_KEY").ok();
    if env_key.as_deref().is_some_and(is_valid_key) {
        sources.push("environment");
    }

    // Tier 3: TOML config
    let toml_key = toml_config.stt_api_key.as_ref();
    if toml_key.map(|k| is_valid_key(k)).unwrap_or(false) {
        sources.push("TOML");
    }

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            "STT API key found in multiple sources: {}. Using database (highest priority).",
            sources.join(", ")
        );
    }

    // Resolution priority
    if let Some(key) = db_key {
        if is_valid_key(&key) {
            info!("STT API key loaded from database");
            return Ok(key);
        }
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("STT API key loaded from environment variable");
            return Ok(key);
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("STT API key loaded from TOML config");
            return Ok(key.clone());
        }
    }

    // No valid key found
    Err(Error::Config(
        "STT API key not configured. Please configure using one of:\n\
         1. Settings endpoint: PUT /settings/stt_api_key\n\
         2. Environment: CALLSCRIBE_STT_API_KEY=your-key-here\n\
         3. TOML config: ~/.config/callscribe/call-ingest.toml (stt_api_key = \"your-key\")"
            .to_string(),
    ))
}

/// Resolve the categorization endpoint URL
///
/// Same tier order as the API key, but absence is not an error:
/// categorization is optional and its absence degrades every record to
/// "Uncategorised".
pub async fn resolve_categorizer_url(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    if let Some(url) = crate::db::settings::get_categorizer_url(db).await? {
        if is_valid_key(&url) {
            return Ok(Some(url));
        }
    }

    if let Ok(url) = std::env::var("CALLSCRIBE_CATEGORIZER_URL") {
        if is_valid_key(&url) {
            return Ok(Some(url));
        }
    }

    Ok(toml_config
        .categorizer_url
        .clone()
        .filter(|url| is_valid_key(url)))
}

/// Validate a credential value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
