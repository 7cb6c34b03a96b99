/// Application configuration
///
/// Settings are layered, later sources winning:
/// 1. built-in defaults (paths under the user's data directory)
/// 2. a TOML file (`--config <path>`, or `colorizer.toml` if present)
/// 3. `COLORIZER_*` environment variables (e.g. `COLORIZER_BIND_ADDR`)

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::state::library::DEFAULT_RETENTION_SECS;
use crate::state::ArtifactDirs;

/// Upload ceiling enforced at the transport layer (10 MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Address the web service listens on
    pub bind_addr: String,
    /// Raw uploads land here
    pub upload_dir: PathBuf,
    /// Colorized outputs land here
    pub output_dir: PathBuf,
    /// SQLite record database
    pub database_path: PathBuf,
    /// Exported colorization network (ONNX)
    pub model_path: PathBuf,
    /// Request body ceiling in bytes
    pub max_upload_bytes: usize,
    /// Age after which records and files are swept
    pub retention_secs: i64,
}

impl AppConfig {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let data_dir = Self::default_data_dir();
        let default_path = |name: &str| data_dir.join(name).to_string_lossy().to_string();

        let mut builder = Config::builder()
            .set_default("bind_addr", "127.0.0.1:5000")?
            .set_default("upload_dir", default_path("uploads"))?
            .set_default("output_dir", default_path("outputs"))?
            .set_default("database_path", default_path("records.db"))?
            .set_default("model_path", default_path("colorizer.onnx"))?
            .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES as i64)?
            .set_default("retention_secs", DEFAULT_RETENTION_SECS)?;

        builder = match config_file {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("colorizer").required(false)),
        };

        builder
            .add_source(Environment::with_prefix("COLORIZER").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Where application data lives by default:
    /// - Linux: ~/.local/share/photo-colorizer
    /// - macOS: ~/Library/Application Support/photo-colorizer
    /// - Windows: %APPDATA%\photo-colorizer
    pub fn default_data_dir() -> PathBuf {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        path.push("photo-colorizer");
        path
    }

    pub fn artifact_dirs(&self) -> ArtifactDirs {
        ArtifactDirs::new(&self.upload_dir, &self.output_dir)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_secs)
    }

    /// Create the upload/output directories and the database's parent.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        self.artifact_dirs().create_all()?;
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
