use config::{Config, ConfigError, File as ConfigFile};
use serde::Deserialize;

/// Default batch size for durable hash-index commits.
pub const DEFAULT_HASH_BATCH_SIZE: usize = 1000;

/// Default copy buffer size (performance parameter only; the content hash is
/// independent of it).
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 1024 * 1024;

fn default_allowed_extensions() -> Vec<String> {
    [
        ".jpg", ".jpeg", ".heic", ".png", ".mp4", ".mov", ".mkv", ".webm", ".avi",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_hash_batch_size() -> usize {
    DEFAULT_HASH_BATCH_SIZE
}

fn default_copy_buffer_size() -> usize {
    DEFAULT_COPY_BUFFER_SIZE
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// File extensions considered for backup, lowercase with leading dot.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Glob patterns excluded from the discovery walk.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    #[serde(default = "default_hash_batch_size")]
    pub hash_batch_size: usize,

    #[serde(default = "default_copy_buffer_size")]
    pub copy_buffer_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            ignore_patterns: Vec::new(),
            hash_batch_size: DEFAULT_HASH_BATCH_SIZE,
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
        }
    }
}

impl AppConfig {
    /// Extension allow-check against the normalized lowercase extension.
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions.iter().any(|e| e == extension)
    }
}

/// Load configuration from an optional `Config.toml`, falling back to
/// built-in defaults for anything unspecified.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
