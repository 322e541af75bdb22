//! Resilient recording download over an ordered candidate sweep
//!
//! Connects once per sweep, probes each candidate path in order (stat,
//! size sanity, streamed read), and returns the first candidate whose
//! transferred byte count matches its stat-reported size. Candidates that
//! are missing, implausibly small, or fail integrity verification are
//! skipped rather than surfaced as corrupt data.
//!
//! Timeout tiers: session establishment, per-candidate stat, and a total
//! wall-clock budget for the whole sweep. Whichever fires first aborts the
//! operation; the session is closed on every exit path.

use crate::types::FetchResult;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

/// Files below this size are treated as placeholders or corrupt uploads
/// and skipped (10 KB ≈ under one second of call audio).
const MIN_PLAUSIBLE_SIZE: u64 = 10_000;

/// Fetch errors surfaced to the pipeline
#[derive(Debug, Error)]
pub enum FetchError {
    /// Every candidate path was exhausted without a verified match
    #[error("No candidate path resolved to a valid recording ({candidates} tried)")]
    NotFound { candidates: usize },

    /// The remote session could not be established
    #[error("Recording server connection failed: {0}")]
    ConnectionFailed(String),

    /// A timeout tier fired ("connect", "stat", or "sweep")
    #[error("Recording fetch timed out during {0}")]
    Timeout(&'static str),

    /// Transferred bytes did not match the stat-reported size
    ///
    /// Raised per candidate and handled inside the sweep (next candidate
    /// is tried); never carries the corrupt bytes out.
    #[error("Integrity mismatch for {path}: transferred {transferred}, declared {declared}")]
    Integrity {
        path: String,
        transferred: u64,
        declared: u64,
    },
}

/// One open session against the recording file server
#[async_trait]
pub trait RemoteSession: Send {
    /// Stat a path: `Ok(None)` when it does not exist
    async fn stat(&mut self, path: &str) -> std::io::Result<Option<u64>>;

    /// Open a path for streamed reading
    async fn open_read(
        &mut self,
        path: &str,
    ) -> std::io::Result<Box<dyn AsyncRead + Send + Unpin>>;

    /// Release the session; called on every exit path
    async fn close(&mut self) -> std::io::Result<()>;
}

/// Recording file server seam (production: SFTP, tests: in-memory)
#[async_trait]
pub trait RemoteFileServer: Send + Sync {
    async fn connect(&self) -> std::io::Result<Box<dyn RemoteSession>>;
}

/// Timeout tiers and sweep tuning
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Session establishment budget
    pub connect_timeout: Duration,
    /// Per-candidate existence-check budget
    pub stat_timeout: Duration,
    /// Total wall-clock budget for the whole candidate sweep
    pub sweep_timeout: Duration,
    /// Delay after a failed candidate, to avoid hammering the server
    pub retry_delay: Duration,
    /// Streamed read chunk size
    pub chunk_size: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(25),
            stat_timeout: Duration::from_secs(15),
            sweep_timeout: Duration::from_secs(180),
            retry_delay: Duration::from_millis(200),
            chunk_size: 32 * 1024,
        }
    }
}

/// Candidate-sweep fetcher over a [`RemoteFileServer`]
pub struct RecordingFetcher<S: RemoteFileServer> {
    server: S,
    config: FetcherConfig,
}

impl<S: RemoteFileServer> RecordingFetcher<S> {
    pub fn new(server: S) -> Self {
        Self::with_config(server, FetcherConfig::default())
    }

    pub fn with_config(server: S, config: FetcherConfig) -> Self {
        Self { server, config }
    }

    /// Fetch the first candidate that fully verifies
    ///
    /// One session serves the whole sweep; candidates are probed strictly
    /// in order so the result is the first verified match, never a race
    /// winner.
    pub async fn fetch(&self, candidates: &[String]) -> Result<FetchResult, FetchError> {
        let mut session = match timeout(self.config.connect_timeout, self.server.connect()).await
        {
            Err(_) => return Err(FetchError::Timeout("connect")),
            Ok(Err(e)) => return Err(FetchError::ConnectionFailed(e.to_string())),
            Ok(Ok(session)) => session,
        };

        let result = timeout(
            self.config.sweep_timeout,
            self.sweep(session.as_mut(), candidates),
        )
        .await;

        // Session release is unconditional: success, exhaustion, and
        // timeout all pass through here.
        if let Err(e) = session.close().await {
            tracing::debug!(error = %e, "Recording session close failed");
        }

        match result {
            Err(_) => Err(FetchError::Timeout("sweep")),
            Ok(inner) => inner,
        }
    }

    async fn sweep(
        &self,
        session: &mut dyn RemoteSession,
        candidates: &[String],
    ) -> Result<FetchResult, FetchError> {
        for (index, path) in candidates.iter().enumerate() {
            match self.try_candidate(session, path).await {
                Ok(Some(result)) => {
                    tracing::info!(
                        path = %path,
                        candidate_index = index,
                        size = result.declared_size,
                        "Recording fetched and verified"
                    );
                    return Ok(result);
                }
                Ok(None) => {
                    // Missing or too small; next candidate
                }
                Err(FetchError::Timeout(phase)) => return Err(FetchError::Timeout(phase)),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Candidate failed, trying next");
                }
            }

            if index + 1 < candidates.len() {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        Err(FetchError::NotFound {
            candidates: candidates.len(),
        })
    }

    /// Probe a single candidate: `Ok(None)` means "skip, not an error"
    async fn try_candidate(
        &self,
        session: &mut dyn RemoteSession,
        path: &str,
    ) -> Result<Option<FetchResult>, FetchError> {
        let stat = match timeout(self.config.stat_timeout, session.stat(path)).await {
            Err(_) => return Err(FetchError::Timeout("stat")),
            Ok(Err(e)) => {
                tracing::debug!(path = %path, error = %e, "Stat failed");
                return Ok(None);
            }
            Ok(Ok(stat)) => stat,
        };

        let declared_size = match stat {
            None => {
                tracing::debug!(path = %path, "Candidate does not exist");
                return Ok(None);
            }
            Some(size) if size < MIN_PLAUSIBLE_SIZE => {
                tracing::debug!(path = %path, size, "Candidate below plausible size, skipped");
                return Ok(None);
            }
            Some(size) => size,
        };

        let mut reader = session
            .open_read(path)
            .await
            .map_err(|e| FetchError::ConnectionFailed(e.to_string()))?;

        let mut bytes = Vec::with_capacity(declared_size as usize);
        let mut chunk = vec![0u8; self.config.chunk_size];
        loop {
            let n = reader
                .read(&mut chunk)
                .await
                .map_err(|e| FetchError::ConnectionFailed(e.to_string()))?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
        }

        let transferred = bytes.len() as u64;
        if transferred != declared_size {
            return Err(FetchError::Integrity {
                path: path.to_string(),
                transferred,
                declared: declared_size,
            });
        }

        Ok(Some(FetchResult {
            bytes,
            declared_size,
        }))
    }
}
