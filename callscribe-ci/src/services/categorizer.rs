//! Best-effort topic categorization
//!
//! Calls an external classification service with its own short timeout.
//! Categorization never fails the pipeline: any error (non-2xx, timeout,
//! malformed payload) degrades to `None`, and the persistence layer
//! substitutes the "Uncategorised" sentinel.

use crate::types::{CategorizationResult, Transcript};
use callscribe_common::{Error, Result};
use serde::Serialize;
use std::time::Duration;

/// Request budget, deliberately much shorter than transcription polling
const CATEGORIZE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    transcript: &'a str,
    utterance_count: usize,
}

/// Classification service client
pub struct CategorizerClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl CategorizerClient {
    pub fn new(endpoint: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(CATEGORIZE_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }

    /// Classify a transcript; `None` on any failure or empty transcript
    pub async fn categorize(&self, transcript: &Transcript) -> Option<CategorizationResult> {
        if transcript.utterances.is_empty() {
            tracing::debug!("Empty transcript, skipping categorization");
            return None;
        }

        let text = transcript.text.as_deref().unwrap_or_default();
        let request = ClassifyRequest {
            transcript: text,
            utterance_count: transcript.utterances.len(),
        };

        let response = match self
            .http_client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Categorization request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Categorization service returned error");
            return None;
        }

        match response.json::<CategorizationResult>().await {
            Ok(mut result) => {
                result.confidence = result.confidence.clamp(0.0, 1.0);
                tracing::debug!(
                    category = %result.primary_category,
                    confidence = result.confidence,
                    "Transcript categorized"
                );
                Some(result)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Categorization payload malformed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Utterance;

    fn transcript_with_utterances(count: usize) -> Transcript {
        Transcript {
            text: Some("hello".to_string()),
            utterances: (0..count)
                .map(|i| Utterance {
                    text: format!("utterance {}", i),
                    speaker: "Agent".to_string(),
                    start_ms: 0,
                    end_ms: 100,
                    confidence: 0.9,
                })
                .collect(),
            ..Transcript::default()
        }
    }

    #[test]
    fn test_client_construction_succeeds() {
        assert!(CategorizerClient::new("http://127.0.0.1:1/classify".to_string()).is_ok());
    }

    #[tokio::test]
    async fn test_empty_transcript_is_skipped() {
        let client = CategorizerClient::new("http://127.0.0.1:1/classify".to_string()).unwrap();
        let result = client.categorize(&transcript_with_utterances(0)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_service_degrades_to_none() {
        // Port 1 refuses connections; failure must be absorbed, not raised
        let client =
            CategorizerClient::new("http://127.0.0.1:1/classify".to_string()).unwrap();
        let result = client.categorize(&transcript_with_utterances(2)).await;
        assert!(result.is_none());
    }

    #[test]
    fn test_result_parse() {
        let json = r#"{
            "primary_category": "Billing",
            "topic_categories": ["Billing", "Refunds"],
            "confidence": 0.92
        }"#;
        let result: CategorizationResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.primary_category, "Billing");
        assert_eq!(result.topic_categories.len(), 2);
    }
}
