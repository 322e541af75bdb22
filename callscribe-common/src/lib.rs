//! Shared types for CallScribe services
//!
//! Provides the common error type, configuration loading, and root folder
//! resolution used by the ingest service.

pub mod config;
pub mod error;

pub use error::{Error, Result};
