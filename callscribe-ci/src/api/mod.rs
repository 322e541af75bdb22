//! HTTP API endpoints

pub mod health;
pub mod settings;
pub mod transcriptions;

pub use health::health_routes;
pub use settings::settings_routes;
pub use transcriptions::transcription_routes;
