//! Settings files on disk.

use fmgen_config::{ConfigError, Settings, SettingsLoader};
use tempfile::TempDir;

#[tokio::test]
async fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = SettingsLoader::load_or_default(dir.path().join("absent.toml"))
        .await
        .unwrap();
    assert_eq!(settings, Settings::default());
}

#[tokio::test]
async fn test_toml_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("settings.toml");

    let mut settings = Settings {
        template: "{ title: file.basename }".into(),
        run_on_modify: true,
        ..Settings::default()
    };
    settings.set_folders_to_ignore("Templates\nDaily");
    settings.limits.max_steps = 5_000;

    SettingsLoader::save(&settings, &path).await.unwrap();
    let loaded = SettingsLoader::load(&path).await.unwrap();
    assert_eq!(loaded, settings);
}

#[tokio::test]
async fn test_json_uses_camel_case() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    SettingsLoader::save(&Settings::default(), &path).await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"sortKeysOnWrite\": true"));
    assert!(text.contains("\"maxCallDepth\""));
}

#[tokio::test]
async fn test_invalid_limits_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"limits": {"maxSteps": 0}}"#).unwrap();

    let err = SettingsLoader::load(&path).await.unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[tokio::test]
async fn test_malformed_file_reports_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, "template = ").unwrap();

    let err = SettingsLoader::load(&path).await.unwrap_err();
    assert!(matches!(err, ConfigError::TomlParse(_)));
}

#[tokio::test]
async fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let err = SettingsLoader::save(&Settings::default(), dir.path().join("s.yaml"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
}
