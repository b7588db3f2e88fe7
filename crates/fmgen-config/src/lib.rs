//! Settings for the frontmatter generator
//!
//! [`Settings`] is what a vault persists: the template, ignored folders,
//! key sorting, modify behaviour and sandbox limits. [`SettingsLoader`]
//! reads and writes it as JSON or TOML.

pub mod error;
pub mod loader;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, SettingsLoader, SETTINGS_FILE};
pub use settings::{Settings, DEFAULT_TEMPLATE, MAX_VALUE_DEPTH};
