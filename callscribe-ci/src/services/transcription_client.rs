//! Speech-to-text provider HTTP client
//!
//! Three-call provider API: upload raw audio to get a private URL, submit
//! a transcription job against that URL, then poll job status. The client
//! only speaks the wire protocol; the polling loop lives in
//! [`transcription`](super::transcription).

use crate::types::{Entity, SentimentResult, Transcript, TranscriptStatus, Utterance, Word};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.speechtext.example.com/v2";

/// Generous client timeout: uploads carry multi-megabyte call audio
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Speech-to-text provider errors
#[derive(Debug, Error)]
pub enum SttError {
    /// Non-2xx from the upload or submit endpoint
    #[error("Upload rejected ({0}): {1}")]
    Upload(u16, String),

    /// Non-2xx from the status endpoint
    #[error("Status query failed ({0}): {1}")]
    Status(u16, String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Job submission options
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOptions {
    pub speakers_expected: u32,
    pub speaker_labels: bool,
    pub summarization: bool,
    pub sentiment_analysis: bool,
    pub entity_detection: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            speakers_expected: 2,
            speaker_labels: true,
            summarization: true,
            sentiment_analysis: true,
            entity_detection: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    audio_url: &'a str,
    #[serde(flatten)]
    options: &'a SubmitOptions,
}

/// Provider word with millisecond offsets
#[derive(Debug, Clone, Deserialize)]
pub struct WireWord {
    pub text: String,
    pub start: i64,
    pub end: i64,
    pub confidence: f64,
    pub speaker: Option<String>,
}

/// Provider utterance (one speaker turn)
#[derive(Debug, Clone, Deserialize)]
pub struct WireUtterance {
    pub text: String,
    pub speaker: String,
    pub start: i64,
    pub end: i64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireSentiment {
    pub text: String,
    pub sentiment: String,
    pub confidence: f64,
    pub speaker: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireEntity {
    pub entity_type: String,
    pub text: String,
}

/// Raw status payload from the provider
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptStatusResponse {
    pub id: String,
    pub status: TranscriptStatus,
    pub text: Option<String>,
    pub utterances: Option<Vec<WireUtterance>>,
    pub words: Option<Vec<WireWord>>,
    pub summary: Option<String>,
    pub sentiment_analysis_results: Option<Vec<WireSentiment>>,
    pub entities: Option<Vec<WireEntity>>,
    /// Audio duration in seconds
    pub audio_duration: Option<f64>,
    /// Provider error detail when status is `error`
    pub error: Option<String>,
}

impl TranscriptStatusResponse {
    /// Convert a completed payload into the domain transcript
    pub fn into_transcript(self) -> Transcript {
        Transcript {
            text: self.text,
            utterances: self
                .utterances
                .unwrap_or_default()
                .into_iter()
                .map(|u| Utterance {
                    text: u.text,
                    speaker: u.speaker,
                    start_ms: u.start,
                    end_ms: u.end,
                    confidence: u.confidence,
                })
                .collect(),
            words: self
                .words
                .unwrap_or_default()
                .into_iter()
                .map(|w| Word {
                    text: w.text,
                    start_ms: w.start,
                    end_ms: w.end,
                    confidence: w.confidence,
                    speaker: w.speaker,
                })
                .collect(),
            summary: self.summary,
            sentiment: self
                .sentiment_analysis_results
                .unwrap_or_default()
                .into_iter()
                .map(|s| SentimentResult {
                    text: s.text,
                    sentiment: s.sentiment,
                    confidence: s.confidence,
                    speaker: s.speaker,
                })
                .collect(),
            entities: self
                .entities
                .unwrap_or_default()
                .into_iter()
                .map(|e| Entity {
                    entity_type: e.entity_type,
                    text: e.text,
                })
                .collect(),
            duration_seconds: self.audio_duration,
        }
    }
}

/// Job status seam so the polling loop can be driven by scripted
/// sequences under test
#[async_trait]
pub trait TranscriptStatusSource: Send + Sync {
    async fn status(&self, job_id: &str) -> Result<TranscriptStatusResponse, SttError>;
}

/// Speech-to-text provider client
pub struct SttClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SttClient {
    pub fn new(api_key: String) -> Result<Self, SttError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, SttError> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SttError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
        })
    }

    /// Upload raw audio; returns the provider-private audio URL
    pub async fn upload(&self, audio: Vec<u8>) -> Result<String, SttError> {
        let url = format!("{}/upload", self.base_url);
        tracing::debug!(bytes = audio.len(), "Uploading audio to provider");

        let response = self
            .http_client
            .post(&url)
            .header("authorization", &self.api_key)
            .header("content-type", "application/octet-stream")
            .body(audio)
            .send()
            .await
            .map_err(|e| SttError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SttError::Upload(status.as_u16(), detail));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| SttError::Parse(e.to_string()))?;
        Ok(body.upload_url)
    }

    /// Submit a transcription job for an uploaded audio URL
    pub async fn submit(
        &self,
        audio_url: &str,
        options: &SubmitOptions,
    ) -> Result<String, SttError> {
        let url = format!("{}/transcript", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .header("authorization", &self.api_key)
            .json(&SubmitRequest { audio_url, options })
            .send()
            .await
            .map_err(|e| SttError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SttError::Upload(status.as_u16(), detail));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| SttError::Parse(e.to_string()))?;

        tracing::info!(job_id = %body.id, "Transcription job submitted");
        Ok(body.id)
    }
}

#[async_trait]
impl TranscriptStatusSource for SttClient {
    async fn status(&self, job_id: &str) -> Result<TranscriptStatusResponse, SttError> {
        let url = format!("{}/transcript/{}", self.base_url, job_id);

        let response = self
            .http_client
            .get(&url)
            .header("authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| SttError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SttError::Status(status.as_u16(), detail));
        }

        response
            .json()
            .await
            .map_err(|e| SttError::Parse(e.to_string()))
    }
}
