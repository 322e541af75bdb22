//! Core domain types for the call ingest pipeline
//!
//! Covers the call record read from the upstream call log, the transcript
//! payload returned by the speech-to-text provider, and the optional
//! categorization enrichment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel stored when categorization is unavailable or failed.
///
/// Distinguishes "processed but unclassifiable" from "not yet processed"
/// (which has no row at all).
pub const UNCATEGORISED: &str = "Uncategorised";

/// One logged call with its recording locator
///
/// Created by the upstream call log; read-only to the pipeline except for
/// the transient `already_persisted` flag set during batch enrichment.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    /// Unique call identifier (persistence key)
    pub call_id: String,
    /// Opaque filename/path hint from the call log (may be URL-encoded)
    pub recording_hint: String,
    pub agent: Option<String>,
    pub queue: Option<String>,
    pub campaign: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub disposition: Option<String>,
    /// Set during batch processing when a persisted row already exists
    #[serde(skip)]
    pub already_persisted: bool,
}

/// Provider transcription job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl TranscriptStatus {
    /// Terminal statuses stop the polling loop
    pub fn is_terminal(&self) -> bool {
        matches!(self, TranscriptStatus::Completed | TranscriptStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptStatus::Queued => "queued",
            TranscriptStatus::Processing => "processing",
            TranscriptStatus::Completed => "completed",
            TranscriptStatus::Error => "error",
        }
    }
}

/// Individual word with timing and speaker attribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub confidence: f64,
    /// Provider speaker tag, rewritten to a role name after mapping
    pub speaker: Option<String>,
}

/// Continuous speech segment from a single speaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    /// Provider speaker tag, rewritten to a role name after mapping
    pub speaker: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub confidence: f64,
}

/// Sentiment classification for one transcript segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResult {
    pub text: String,
    pub sentiment: String,
    pub confidence: f64,
    pub speaker: Option<String>,
}

/// Named entity detected in the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "entity_type")]
    pub entity_type: String,
    pub text: String,
}

/// Terminal transcript payload from the speech-to-text provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub text: Option<String>,
    #[serde(default)]
    pub utterances: Vec<Utterance>,
    #[serde(default)]
    pub words: Vec<Word>,
    pub summary: Option<String>,
    #[serde(default)]
    pub sentiment: Vec<SentimentResult>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Audio duration in seconds, as reported by the provider
    pub duration_seconds: Option<f64>,
}

/// Provider job driven to a terminal state by the polling loop
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    pub job_id: String,
    pub status: TranscriptStatus,
    /// Poll attempts consumed before reaching terminal state
    pub attempts: u32,
    pub transcript: Option<Transcript>,
}

/// Domain role assigned to a provider speaker tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerRole {
    Agent,
    Customer,
}

impl SpeakerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakerRole::Agent => "Agent",
            SpeakerRole::Customer => "Customer",
        }
    }
}

/// Injectable mapping from provider speaker tags to domain roles
///
/// Default convention: the first distinct tag the provider emitted is the
/// Agent, every other tag is the Customer. This is a heuristic (outbound
/// call centers answer with the agent speaking first), not a provider
/// guarantee; with more than two speakers all non-primary tags collapse
/// into Customer. Alternate schemes substitute a different table.
#[derive(Debug, Clone)]
pub struct SpeakerRoleMap {
    roles: HashMap<String, SpeakerRole>,
    fallback: SpeakerRole,
}

impl SpeakerRoleMap {
    /// Build a map from explicit tag → role pairs
    pub fn new(pairs: Vec<(String, SpeakerRole)>, fallback: SpeakerRole) -> Self {
        Self {
            roles: pairs.into_iter().collect(),
            fallback,
        }
    }

    /// Default convention: `first_tag` is the Agent, all others Customer
    pub fn first_tag_is_agent(first_tag: &str) -> Self {
        Self::new(
            vec![(first_tag.to_string(), SpeakerRole::Agent)],
            SpeakerRole::Customer,
        )
    }

    pub fn resolve(&self, tag: &str) -> SpeakerRole {
        self.roles.get(tag).copied().unwrap_or(self.fallback)
    }
}

/// Topic categorization returned by the classification service
///
/// Absence (a failed or skipped categorization) is a valid state; the
/// persistence layer substitutes [`UNCATEGORISED`] in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationResult {
    pub primary_category: String,
    #[serde(default)]
    pub topic_categories: Vec<String>,
    /// Confidence score in [0, 1]
    pub confidence: f64,
}

/// Fully-buffered recording payload with size accounting
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub bytes: Vec<u8>,
    /// Size reported by the remote server's stat
    pub declared_size: u64,
}

impl FetchResult {
    /// Bytes actually transferred; must equal `declared_size` to be valid
    pub fn verified_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(TranscriptStatus::Completed.is_terminal());
        assert!(TranscriptStatus::Error.is_terminal());
        assert!(!TranscriptStatus::Queued.is_terminal());
        assert!(!TranscriptStatus::Processing.is_terminal());
    }

    #[test]
    fn test_status_deserialize_lowercase() {
        let status: TranscriptStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(status, TranscriptStatus::Processing);
    }

    #[test]
    fn test_role_map_first_tag_is_agent() {
        let map = SpeakerRoleMap::first_tag_is_agent("A");
        assert_eq!(map.resolve("A"), SpeakerRole::Agent);
        assert_eq!(map.resolve("B"), SpeakerRole::Customer);
        // More than two speakers collapse into Customer
        assert_eq!(map.resolve("C"), SpeakerRole::Customer);
    }

    #[test]
    fn test_fetch_result_verified_size() {
        let result = FetchResult {
            bytes: vec![0u8; 128],
            declared_size: 128,
        };
        assert_eq!(result.verified_size(), result.declared_size);
    }
}
