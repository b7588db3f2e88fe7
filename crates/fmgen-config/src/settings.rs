//! The settings a vault persists.

use serde::{Deserialize, Serialize};

use fmgen_core::{DocumentId, MergeOptions};
use fmgen_expr::SandboxLimits;

use crate::error::{ConfigError, ConfigResult};

/// Template used when none is configured: generates nothing.
pub const DEFAULT_TEMPLATE: &str = "{}";

/// Deeper values risk exhausting the stack while they are converted.
pub const MAX_VALUE_DEPTH: usize = 1024;

/// Generator settings.
///
/// Serialized in camelCase. Missing fields take their defaults and unknown
/// fields are ignored, so older files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Expression that builds the frontmatter object.
    pub template: String,
    /// Folders to ignore as typed by the user, one per line.
    pub folder_to_ignore: String,
    /// Parsed form of `folder_to_ignore`.
    pub ignored_folders: Vec<String>,
    pub sort_keys_on_write: bool,
    pub sort_nested_keys: bool,
    /// Sync documents when they change on disk.
    pub run_on_modify: bool,
    pub limits: SandboxLimits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            folder_to_ignore: String::new(),
            ignored_folders: Vec::new(),
            sort_keys_on_write: true,
            sort_nested_keys: false,
            run_on_modify: false,
            limits: SandboxLimits::default(),
        }
    }
}

impl Settings {
    /// Replace the ignored folders from raw text, one folder per line.
    pub fn set_folders_to_ignore(&mut self, raw: &str) {
        self.folder_to_ignore = raw.to_string();
        self.ignored_folders = parse_folder_list(raw);
    }

    /// True when the document's parent folder is listed. `/` is the vault root.
    pub fn is_folder_ignored(&self, id: &DocumentId) -> bool {
        let parent = id.parent_path();
        self.ignored_folders
            .iter()
            .any(|folder| normalize_folder(folder) == parent)
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            sort_keys: self.sort_keys_on_write,
            sort_nested_keys: self.sort_nested_keys,
        }
    }

    /// Reject limits that would make every evaluation fail, and empty templates.
    pub fn validate(&self) -> ConfigResult<()> {
        let limits = &self.limits;
        if limits.max_steps == 0 {
            return Err(ConfigError::invalid("limits.maxSteps must be greater than zero"));
        }
        if limits.max_call_depth == 0 {
            return Err(ConfigError::invalid("limits.maxCallDepth must be greater than zero"));
        }
        if limits.max_nesting < 2 {
            return Err(ConfigError::invalid("limits.maxNesting must be at least 2"));
        }
        if limits.max_string_len == 0 || limits.max_list_len == 0 {
            return Err(ConfigError::invalid("size limits must be greater than zero"));
        }
        if !(1..=MAX_VALUE_DEPTH).contains(&limits.max_value_depth) {
            return Err(ConfigError::invalid(format!(
                "limits.maxValueDepth must be between 1 and {MAX_VALUE_DEPTH}"
            )));
        }
        if self.template.trim().is_empty() {
            return Err(ConfigError::invalid("template must not be empty"));
        }
        Ok(())
    }

    /// Fill `ignored_folders` from `folder_to_ignore` when only the raw text
    /// was written by hand.
    pub(crate) fn sync_folder_list(&mut self) {
        if self.ignored_folders.is_empty() && !self.folder_to_ignore.trim().is_empty() {
            self.ignored_folders = parse_folder_list(&self.folder_to_ignore);
        }
    }
}

fn parse_folder_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_folder(folder: &str) -> &str {
    match folder.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed.trim_start_matches("./"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.template, "{}");
        assert!(settings.sort_keys_on_write);
        assert!(!settings.sort_nested_keys);
        assert!(!settings.run_on_modify);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_set_folders_to_ignore_trims_and_drops_blanks() {
        let mut settings = Settings::default();
        settings.set_folders_to_ignore("  Templates \n\n Archive/Old\n   \n");
        assert_eq!(settings.ignored_folders, vec!["Templates", "Archive/Old"]);
        assert_eq!(settings.folder_to_ignore, "  Templates \n\n Archive/Old\n   \n");
    }

    #[test_case("Templates", "Templates/t.md", true ; "direct child")]
    #[test_case("Templates", "Templates/sub/t.md", false ; "nested folder is not matched")]
    #[test_case("Templates/", "Templates/t.md", true ; "trailing slash")]
    #[test_case("/", "root.md", true ; "vault root")]
    #[test_case("/", "Notes/a.md", false ; "root does not cover folders")]
    fn test_folder_ignore(folder: &str, path: &str, expected: bool) {
        let mut settings = Settings::default();
        settings.set_folders_to_ignore(folder);
        assert_eq!(settings.is_folder_ignored(&DocumentId::new(path)), expected);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut settings = Settings::default();
        settings.limits.max_steps = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_bounds_value_depth() {
        let mut settings = Settings::default();
        settings.limits.max_value_depth = MAX_VALUE_DEPTH + 1;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
        settings.limits.max_value_depth = MAX_VALUE_DEPTH;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_merge_options_follow_flags() {
        let settings = Settings {
            sort_keys_on_write: false,
            sort_nested_keys: true,
            ..Settings::default()
        };
        let opts = settings.merge_options();
        assert!(!opts.sort_keys);
        assert!(opts.sort_nested_keys);
    }
}
