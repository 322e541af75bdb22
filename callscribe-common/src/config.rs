//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents
///
/// Lives at `<config_dir>/callscribe/<module>.toml`. All fields are
/// optional; missing values fall back to environment variables or
/// database settings during resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder override (database and working files live here)
    pub root_folder: Option<String>,
    /// Speech-to-text provider API key
    pub stt_api_key: Option<String>,
    /// Categorization service endpoint URL (absent = categorization disabled)
    pub categorizer_url: Option<String>,
    /// Recording file server connection settings
    pub recording_server: Option<RecordingServerConfig>,
}

/// Recording file server (SFTP) connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingServerConfig {
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub username: String,
    /// Password authentication (mutually exclusive with key_path)
    pub password: Option<String>,
    /// Private key file authentication
    pub key_path: Option<String>,
    /// Remote root folder recordings are stored under
    #[serde(default = "default_remote_root")]
    pub remote_root: String,
}

fn default_sftp_port() -> u16 {
    22
}

fn default_remote_root() -> String {
    "/var/spool/recordings".to_string()
}

/// Locate the TOML config file for a module (e.g. "call-ingest")
pub fn toml_config_path(module: &str) -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("callscribe").join(format!("{}.toml", module)))
        .unwrap_or_else(|| PathBuf::from(format!("callscribe-{}.toml", module)))
}

/// Load TOML config, returning defaults if the file does not exist
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write TOML config atomically (write to temp file, then rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Root folder resolution with Environment → TOML → OS default priority
pub struct RootFolderResolver {
    env_var: String,
    toml_config: TomlConfig,
}

impl RootFolderResolver {
    pub fn new(module: &str) -> Self {
        let toml_config = load_toml_config(&toml_config_path(module)).unwrap_or_default();
        Self {
            env_var: "CALLSCRIBE_ROOT_FOLDER".to_string(),
            toml_config,
        }
    }

    /// Resolve the root folder
    pub fn resolve(&self) -> PathBuf {
        if let Ok(path) = std::env::var(&self.env_var) {
            return PathBuf::from(path);
        }

        if let Some(path) = &self.toml_config.root_folder {
            return PathBuf::from(path);
        }

        default_root_folder()
    }
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("callscribe"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/callscribe"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("callscribe"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/callscribe"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("callscribe"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\callscribe"))
    } else {
        PathBuf::from("./callscribe_data")
    }
}

/// Root folder initializer: creates the directory and derives file paths
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("callscribe.db")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
