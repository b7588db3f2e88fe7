use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading, saving or validating settings
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error on the settings file
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Extension is neither `.json` nor `.toml`
    #[error("unsupported settings format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Settings parsed but hold unusable values
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Result type for settings operations
pub type ConfigResult<T> = Result<T, ConfigError>;
