//! callscribe-ci - Call Ingest Microservice
//!
//! **Module Identity:**
//! - Name: callscribe-ci (Call Ingest)
//! - Port: 5731
//!
//! Pulls call recordings from the telephony recording server, transcribes
//! them through the speech-to-text provider, enriches completed transcripts
//! with categorization, and persists one row per call.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use callscribe_ci::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting callscribe-ci (Call Ingest) microservice");
    info!("Port: 5731");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve root folder
    let resolver = callscribe_common::config::RootFolderResolver::new("call-ingest");
    let root_folder = resolver.resolve();

    // Step 2: Create root folder directory if missing
    let initializer = callscribe_common::config::RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    // Step 3: Open or create database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let db_pool = callscribe_ci::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Step 4: Load TOML configuration (recording server, credential fallbacks)
    let toml_path = callscribe_common::config::toml_config_path("call-ingest");
    let toml_config = callscribe_common::config::load_toml_config(&toml_path)
        .map_err(|e| anyhow::anyhow!("Failed to load TOML config: {}", e))?;
    if toml_config.recording_server.is_none() {
        info!("No recording server configured; batch processing will be unavailable");
    }

    // Create application state
    let state = AppState::new(db_pool, toml_config);

    // Build router
    let app = callscribe_ci::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("127.0.0.1:5731").await?;
    info!("Listening on http://127.0.0.1:5731");
    info!("Health check: http://127.0.0.1:5731/health");

    axum::serve(listener, app).await?;

    Ok(())
}
