//! Transcription job orchestration
//!
//! Drives a submitted provider job to a terminal state with a fixed
//! interval, bounded-attempts polling loop, then rewrites provider speaker
//! tags into domain roles. The status seam keeps the loop testable with
//! scripted status sequences.

use crate::services::transcription_client::{SttError, TranscriptStatusSource};
use crate::types::{SpeakerRoleMap, Transcript, TranscriptStatus, TranscriptionJob};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Transcription orchestration errors
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// Provider reported the job as failed
    #[error("Transcription failed: {0}")]
    Provider(String),

    /// Polling exhausted its attempt budget without a terminal status
    #[error("Transcription polling timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// Transport or protocol failure talking to the provider
    #[error(transparent)]
    Transport(#[from] SttError),
}

/// Polling loop tuning
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    /// 5 s × 120 attempts ≈ 10 minutes of patience per job
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
        }
    }
}

#[async_trait]
impl<S: TranscriptStatusSource + ?Sized> TranscriptStatusSource for Arc<S> {
    async fn status(
        &self,
        job_id: &str,
    ) -> Result<crate::services::transcription_client::TranscriptStatusResponse, SttError> {
        (**self).status(job_id).await
    }
}

/// Polls a provider job until terminal, then maps speaker roles
pub struct TranscriptionOrchestrator<S: TranscriptStatusSource> {
    status_source: S,
    config: PollConfig,
    /// Explicit tag → role table; when absent, the map is derived from the
    /// first tag the provider emitted (first-tag-is-agent heuristic)
    role_map: Option<SpeakerRoleMap>,
}

impl<S: TranscriptStatusSource> TranscriptionOrchestrator<S> {
    pub fn new(status_source: S) -> Self {
        Self::with_config(status_source, PollConfig::default())
    }

    pub fn with_config(status_source: S, config: PollConfig) -> Self {
        Self {
            status_source,
            config,
            role_map: None,
        }
    }

    /// Substitute an explicit speaker role table
    pub fn with_role_map(mut self, role_map: SpeakerRoleMap) -> Self {
        self.role_map = Some(role_map);
        self
    }

    /// Poll until the job reaches a terminal state
    ///
    /// `queued`/`processing` continue polling; `completed` returns the job
    /// with roles applied; `error` fails with the provider's detail;
    /// exhausting `max_attempts` fails with `Timeout`. No status request
    /// is issued after a terminal response.
    pub async fn await_completion(
        &self,
        job_id: &str,
    ) -> Result<TranscriptionJob, TranscriptionError> {
        for attempt in 1..=self.config.max_attempts {
            let response = self.status_source.status(job_id).await?;

            match response.status {
                TranscriptStatus::Completed => {
                    let mut transcript = response.into_transcript();
                    apply_speaker_roles(&mut transcript, self.role_map.as_ref());

                    tracing::info!(
                        job_id = %job_id,
                        attempts = attempt,
                        utterances = transcript.utterances.len(),
                        "Transcription completed"
                    );

                    return Ok(TranscriptionJob {
                        job_id: job_id.to_string(),
                        status: TranscriptStatus::Completed,
                        attempts: attempt,
                        transcript: Some(transcript),
                    });
                }
                TranscriptStatus::Error => {
                    let detail = response
                        .error
                        .unwrap_or_else(|| "provider reported no detail".to_string());
                    tracing::warn!(job_id = %job_id, detail = %detail, "Transcription errored");
                    return Err(TranscriptionError::Provider(detail));
                }
                TranscriptStatus::Queued | TranscriptStatus::Processing => {
                    tracing::debug!(
                        job_id = %job_id,
                        attempt,
                        status = response.status.as_str(),
                        "Job not terminal yet"
                    );
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.interval).await;
            }
        }

        Err(TranscriptionError::Timeout {
            attempts: self.config.max_attempts,
        })
    }
}

/// Rewrite provider speaker tags (e.g. "A"/"B") into role names on every
/// utterance, word, and sentiment segment.
///
/// Without an explicit map the first tag seen becomes Agent and every
/// other tag Customer. This mirrors how answered calls open but is a
/// heuristic, not a provider guarantee; with three or more speakers all
/// non-primary tags collapse into Customer.
fn apply_speaker_roles(transcript: &mut Transcript, role_map: Option<&SpeakerRoleMap>) {
    let derived;
    let map = match role_map {
        Some(map) => map,
        None => {
            let first_tag = transcript
                .utterances
                .first()
                .map(|u| u.speaker.clone())
                .or_else(|| transcript.words.iter().find_map(|w| w.speaker.clone()));
            let Some(first_tag) = first_tag else {
                return;
            };
            derived = SpeakerRoleMap::first_tag_is_agent(&first_tag);
            &derived
        }
    };

    for utterance in &mut transcript.utterances {
        utterance.speaker = map.resolve(&utterance.speaker).as_str().to_string();
    }
    for word in &mut transcript.words {
        if let Some(tag) = word.speaker.take() {
            word.speaker = Some(map.resolve(&tag).as_str().to_string());
        }
    }
    for sentiment in &mut transcript.sentiment {
        if let Some(tag) = sentiment.speaker.take() {
            sentiment.speaker = Some(map.resolve(&tag).as_str().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::transcription_client::{TranscriptStatusResponse, WireUtterance, WireWord};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    /// Status source replaying a scripted sequence; the final entry
    /// repeats once the script runs out.
    struct ScriptedSource {
        script: Mutex<VecDeque<TranscriptStatusResponse>>,
        last: TranscriptStatusResponse,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn new(mut script: Vec<TranscriptStatusResponse>) -> Self {
            let last = script.last().cloned().expect("script must not be empty");
            Self {
                script: Mutex::new(script.drain(..).collect()),
                last,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TranscriptStatusSource for ScriptedSource {
        async fn status(&self, _job_id: &str) -> Result<TranscriptStatusResponse, SttError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().await;
            Ok(script.pop_front().unwrap_or_else(|| self.last.clone()))
        }
    }

    fn response(status: TranscriptStatus) -> TranscriptStatusResponse {
        TranscriptStatusResponse {
            id: "job-1".to_string(),
            status,
            text: None,
            utterances: None,
            words: None,
            summary: None,
            sentiment_analysis_results: None,
            entities: None,
            audio_duration: None,
            error: None,
        }
    }

    fn completed_with_speakers() -> TranscriptStatusResponse {
        TranscriptStatusResponse {
            utterances: Some(vec![
                WireUtterance {
                    text: "hello, support".to_string(),
                    speaker: "A".to_string(),
                    start: 0,
                    end: 1200,
                    confidence: 0.97,
                },
                WireUtterance {
                    text: "hi, I have a question".to_string(),
                    speaker: "B".to_string(),
                    start: 1300,
                    end: 2800,
                    confidence: 0.95,
                },
            ]),
            words: Some(vec![WireWord {
                text: "hello".to_string(),
                start: 0,
                end: 400,
                confidence: 0.99,
                speaker: Some("A".to_string()),
            }]),
            ..response(TranscriptStatus::Completed)
        }
    }

    fn fast_config(max_attempts: u32) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_polls_exactly_until_completed() {
        let source = Arc::new(ScriptedSource::new(vec![
            response(TranscriptStatus::Queued),
            response(TranscriptStatus::Processing),
            response(TranscriptStatus::Processing),
            response(TranscriptStatus::Completed),
        ]));
        let orchestrator =
            TranscriptionOrchestrator::with_config(source.clone(), fast_config(120));

        let job = orchestrator.await_completion("job-1").await.unwrap();
        assert_eq!(job.status, TranscriptStatus::Completed);
        assert_eq!(job.attempts, 4);
        // No status call after the terminal response
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn test_never_terminal_times_out_after_exact_attempts() {
        let source = Arc::new(ScriptedSource::new(vec![response(
            TranscriptStatus::Processing,
        )]));
        let orchestrator = TranscriptionOrchestrator::with_config(source.clone(), fast_config(7));

        let err = orchestrator.await_completion("job-1").await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Timeout { attempts: 7 }));
        assert_eq!(source.calls(), 7);
    }

    #[tokio::test]
    async fn test_error_status_carries_provider_detail() {
        let mut errored = response(TranscriptStatus::Error);
        errored.error = Some("audio unreadable".to_string());
        let source = Arc::new(ScriptedSource::new(vec![errored]));
        let orchestrator = TranscriptionOrchestrator::with_config(source, fast_config(120));

        let err = orchestrator.await_completion("job-1").await.unwrap_err();
        match err {
            TranscriptionError::Provider(detail) => assert_eq!(detail, "audio unreadable"),
            other => panic!("expected Provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_tag_becomes_agent() {
        let source = Arc::new(ScriptedSource::new(vec![completed_with_speakers()]));
        let orchestrator = TranscriptionOrchestrator::with_config(source, fast_config(120));

        let job = orchestrator.await_completion("job-1").await.unwrap();
        let transcript = job.transcript.unwrap();
        assert_eq!(transcript.utterances[0].speaker, "Agent");
        assert_eq!(transcript.utterances[1].speaker, "Customer");
        assert_eq!(transcript.words[0].speaker.as_deref(), Some("Agent"));
    }

    #[tokio::test]
    async fn test_explicit_role_map_overrides_heuristic() {
        use crate::types::SpeakerRole;

        let source = Arc::new(ScriptedSource::new(vec![completed_with_speakers()]));
        let map = SpeakerRoleMap::new(
            vec![("B".to_string(), SpeakerRole::Agent)],
            SpeakerRole::Customer,
        );
        let orchestrator =
            TranscriptionOrchestrator::with_config(source, fast_config(120)).with_role_map(map);

        let job = orchestrator.await_completion("job-1").await.unwrap();
        let transcript = job.transcript.unwrap();
        assert_eq!(transcript.utterances[0].speaker, "Customer");
        assert_eq!(transcript.utterances[1].speaker, "Agent");
    }
}
