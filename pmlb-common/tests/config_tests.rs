//! Configuration resolution tests
//!
//! Uses serial_test to prevent ENV variable race conditions: tests that touch
//! INFERENCE_API_KEY or PMLB_ROOT_FOLDER are marked #[serial].

use pmlb_common::config::{
    load_toml_config, prepare_root_folder, resolve_api_key, resolve_root_folder, TomlConfig,
    API_KEY_ENV, DATABASE_FILE, ROOT_FOLDER_ENV,
};
use pmlb_common::ValidationMode;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_missing_config_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_toml_config(Some(&temp_dir.path().join("absent.toml"))).unwrap();
    assert!(config.root_folder.is_none());
    assert_eq!(config.upstream.validation_mode, ValidationMode::Strict);
}

#[test]
fn test_load_full_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/pmlb"
inference_api_key = "toml-key"

[upstream]
endpoint = "http://localhost:9999/v1/chat/completions"
model = "test-model"
request_timeout_secs = 30
validation_mode = "trusting"

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/pmlb")));
    assert_eq!(config.upstream.model, "test-model");
    assert_eq!(config.upstream.request_timeout_secs, 30);
    assert_eq!(config.upstream.validation_mode, ValidationMode::Trusting);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = [not toml").unwrap();
    assert!(load_toml_config(Some(&path)).is_err());
}

#[test]
#[serial]
fn test_env_api_key_wins_over_toml() {
    env::set_var(API_KEY_ENV, "env-key");
    let config = TomlConfig {
        inference_api_key: Some("toml-key".to_string()),
        ..Default::default()
    };
    let key = resolve_api_key(&config).unwrap();
    assert_eq!(key.expose(), "env-key");
    env::remove_var(API_KEY_ENV);
}

#[test]
#[serial]
fn test_toml_api_key_used_when_env_blank() {
    env::set_var(API_KEY_ENV, "   ");
    let config = TomlConfig {
        inference_api_key: Some("toml-key".to_string()),
        ..Default::default()
    };
    assert_eq!(resolve_api_key(&config).unwrap().expose(), "toml-key");
    env::remove_var(API_KEY_ENV);
}

#[test]
#[serial]
fn test_missing_api_key_resolves_to_none() {
    env::remove_var(API_KEY_ENV);
    assert!(resolve_api_key(&TomlConfig::default()).is_none());
}

#[test]
#[serial]
fn test_root_folder_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/env"));
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));
}

#[test]
fn test_prepare_root_folder_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("pmlb");
    let db_path = prepare_root_folder(&root).unwrap();
    assert!(root.is_dir());
    assert_eq!(db_path, root.join(DATABASE_FILE));
}
