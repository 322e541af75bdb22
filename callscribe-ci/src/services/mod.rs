//! Pipeline services for callscribe-ci
//!
//! Leaves first: existence cache, path locator, recording fetcher (with
//! its SFTP session), transcription client + orchestrator, categorizer,
//! and the persistence store.

pub mod categorizer;
pub mod existence_cache;
pub mod path_locator;
pub mod persistence;
pub mod recording_fetcher;
pub mod sftp;
pub mod transcription;
pub mod transcription_client;
