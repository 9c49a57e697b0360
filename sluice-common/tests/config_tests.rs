//! Integration tests for configuration resolution and graceful degradation
//!
//! Uses serial_test to prevent environment variable races: every test that
//! touches SLUICE_CONFIG is marked #[serial].

use serial_test::serial;
use sluice_common::config::{
    resolve_config_path, ConfigSource, TomlConfig, CONFIG_ENV_VAR, DEFAULT_STORE_CAPACITY,
};
use std::env;
use std::io::Write;
use std::path::PathBuf;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
#[serial]
fn test_env_var_used_without_cli_path() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/sluice-env-config.toml");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/sluice-env-config.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_path_beats_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/sluice-env-config.toml");

    let cli = PathBuf::from("/tmp/sluice-cli-config.toml");
    assert_eq!(resolve_config_path(Some(&cli)), Some(cli.clone()));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);

    let missing = PathBuf::from("/nonexistent/sluice/config.toml");
    let config = TomlConfig::load_or_default(Some(&missing)).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.stage.store_capacity, DEFAULT_STORE_CAPACITY);
}

#[test]
#[serial]
fn test_load_from_env_var_file() {
    let file = write_config(
        r#"
        [logging]
        level = "debug"

        [stage]
        name = "vorbis"
        store_capacity = 8192
        store_max_capacity = 65536
        "#,
    );
    env::set_var(CONFIG_ENV_VAR, file.path());

    let config = TomlConfig::load_or_default(None).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.stage.name, "vorbis");
    assert_eq!(config.stage.store_capacity, 8192);
    assert_eq!(config.stage.store_max_capacity, 65536);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_unparseable_file_is_error() {
    env::remove_var(CONFIG_ENV_VAR);

    let file = write_config("[stage\nname = ");
    let result = TomlConfig::load_or_default(Some(file.path()));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_missing_env_file_reported_as_missing() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");
    env::set_var(CONFIG_ENV_VAR, &missing);

    let (config, source) = TomlConfig::load_resolved(None).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(source, ConfigSource::Missing(missing));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_existing_file_reported_as_file() {
    env::remove_var(CONFIG_ENV_VAR);

    let file = write_config("[stage]\nname = \"opus\"\n");
    let (config, source) = TomlConfig::load_resolved(Some(file.path())).unwrap();
    assert_eq!(config.stage.name, "opus");
    assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));
}
