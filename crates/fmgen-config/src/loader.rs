//! Reading and writing settings files.
//!
//! The format follows the file extension: `.json` or `.toml`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::settings::Settings;

/// Default settings file name inside a vault.
pub const SETTINGS_FILE: &str = ".fmgen.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn parse(self, content: &str) -> ConfigResult<Settings> {
        let mut settings: Settings = match self {
            Self::Json => serde_json::from_str(content)?,
            Self::Toml => toml::from_str(content)?,
        };
        settings.sync_folder_list();
        Ok(settings)
    }

    pub fn render(self, settings: &Settings) -> ConfigResult<String> {
        let mut text = match self {
            Self::Json => serde_json::to_string_pretty(settings)?,
            Self::Toml => toml::to_string_pretty(settings)?,
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }
}

/// Loads and saves [`Settings`].
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load and validate settings from `path`.
    pub async fn load(path: impl AsRef<Path>) -> ConfigResult<Settings> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::io(path, e))?;
        let settings = format.parse(&content)?;
        settings.validate()?;
        debug!(path = %path.display(), ignored = settings.ignored_folders.len(), "loaded settings");
        Ok(settings)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub async fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Settings> {
        let path = path.as_ref();
        match tokio::fs::try_exists(path).await {
            Ok(true) => Self::load(path).await,
            Ok(false) => {
                debug!(path = %path.display(), "no settings file, using defaults");
                ConfigFormat::from_path(path)?;
                Ok(Settings::default())
            }
            Err(e) => Err(ConfigError::io(path, e)),
        }
    }

    /// Write settings to `path`, creating parent directories.
    pub async fn save(settings: &Settings, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = ConfigFormat::from_path(path)?.render(settings)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::io(parent, e))?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| ConfigError::io(path, e))?;
        debug!(path = %path.display(), "saved settings");
        Ok(())
    }

    /// Settings path for a vault: explicit path if given, else
    /// [`SETTINGS_FILE`] at the vault root.
    pub fn resolve_path(vault: &Path, explicit: Option<&Path>) -> PathBuf {
        match explicit {
            Some(path) => path.to_path_buf(),
            None => vault.join(SETTINGS_FILE),
        }
    }
}
