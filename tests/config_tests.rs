//! Integration tests for the config module.
//!
//! - Collector: defaults, required fields, confirmation
//! - Loader: TOML round trip, partial files, path resolution
//! - Validation: settings that would break generated artifacts

use proptest::prelude::*;
use sensor_provision::config::{loader, ConfigCollector, FieldDefaults, ScriptedSource, Settings};
use sensor_provision::error::{ConfigError, SettingsError};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn collector() -> ConfigCollector {
    ConfigCollector::new(FieldDefaults::default())
}

// ============================================================================
// Collector
// ============================================================================

#[test]
fn test_documented_defaults() {
    let mut source = ScriptedSource::new(["NATIONAL_1", "", "", "x", "", "y"]);
    let config = collector().collect(&mut source).unwrap();

    assert_eq!(config.device_identity, "NATIONAL_1");
    assert_eq!(config.sensor_pin, 17);
    assert_eq!(config.data_store.host, "192.168.1.54");
    assert_eq!(config.data_store.user, "webapp");
    assert_eq!(config.data_store.password, "x");
    assert_eq!(config.data_store.database_name, "iwt_db");
}

#[test]
fn test_settings_defaults_drive_the_prompts() {
    let defaults = FieldDefaults {
        host: "db.plant.local".to_string(),
        user: "sensor".to_string(),
        sensor_pin: 4,
        database: "plant".to_string(),
    };
    let mut source = ScriptedSource::new(["HEAD_7", "", "", "pw", "", "yes"]);
    let config = ConfigCollector::new(defaults).collect(&mut source).unwrap();

    assert_eq!(config.data_store.host, "db.plant.local");
    assert_eq!(config.data_store.user, "sensor");
    assert_eq!(config.sensor_pin, 4);
    assert_eq!(config.data_store.database_name, "plant");
    assert!(source.transcript.iter().any(|p| p.contains("[db.plant.local]")));
}

#[test]
fn test_prompt_order_is_fixed() {
    let mut source = ScriptedSource::new(["NATIONAL_1", "", "", "x", "", "y"]);
    collector().collect(&mut source).unwrap();

    let prompts: Vec<&String> = source.transcript.iter().filter(|t| t.ends_with(": ")).collect();
    assert!(prompts[0].starts_with("Device identity"));
    assert!(prompts[1].starts_with("Database host"));
    assert!(prompts[2].starts_with("Database user"));
    assert!(prompts[3].starts_with("Database password"));
    assert!(prompts[4].starts_with("Sensor GPIO pin"));
    assert!(prompts[5].starts_with("Proceed"));
}

proptest! {
    #[test]
    fn prop_empty_identity_always_fails(
        host in "[a-z0-9.]{0,12}",
        user in "[a-z]{0,8}",
        password in "[a-z]{0,8}",
        pin in "[0-9]{0,2}",
    ) {
        let mut source = ScriptedSource::new(vec![
            String::new(), host, user, password, pin, "y".to_string(),
        ]);
        let err = collector().collect(&mut source).unwrap_err();
        let missing = matches!(err, ConfigError::MissingRequiredField(ref f) if f == "device identity");
        prop_assert!(missing);
    }

    #[test]
    fn prop_only_yes_confirms(answer in "[a-z ]{0,6}") {
        let mut source = ScriptedSource::new(vec![
            "NATIONAL_1".to_string(), String::new(), String::new(), "x".to_string(),
            String::new(), answer.clone(),
        ]);
        let result = collector().collect(&mut source);
        let trimmed = answer.trim();
        if trimmed == "y" || trimmed == "yes" {
            prop_assert!(result.is_ok());
        } else {
            let cancelled = matches!(result, Err(ConfigError::UserCancelled));
            prop_assert!(cancelled);
        }
    }
}

// ============================================================================
// Loader
// ============================================================================

#[test]
fn test_save_and_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested/settings.toml");

    let mut settings = Settings::default();
    settings.layout.service_name = "plant-sensor".to_string();
    settings.probe.timeout_secs = 3;
    settings.app_source = Some(PathBuf::from("/opt/app/sensor.py"));

    loader::save_settings(&settings, &path).unwrap();
    let loaded = loader::load_settings(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.toml");
    fs::write(
        &path,
        "interfaces = [\"spi\"]\n\n[defaults]\nhost = \"10.0.0.5\"\n\n[probe]\ntimeout_secs = 4\n",
    )
    .unwrap();

    let settings = loader::load_settings(&path).unwrap();
    assert_eq!(settings.interfaces, vec!["spi".to_string()]);
    assert_eq!(settings.defaults.host, "10.0.0.5");
    assert_eq!(settings.defaults.user, "webapp");
    assert_eq!(settings.probe.timeout_secs, 4);
    assert_eq!(settings.probe.port, 3306);
    assert_eq!(settings.layout.unit_name(), "sensor.service");
}

#[test]
fn test_invalid_toml_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.toml");
    fs::write(&path, "[layout\nservice_name = ").unwrap();

    assert!(matches!(
        loader::load_settings(&path),
        Err(SettingsError::InvalidToml(_))
    ));
}

#[test]
fn test_invalid_values_fail_validation_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.toml");
    fs::write(&path, "[layout]\ninstall_dir = \"/home/pi/my sensor\"\n").unwrap();

    assert!(matches!(
        loader::load_settings(&path),
        Err(SettingsError::ValidationFailed(_))
    ));
}

#[test]
fn test_explicit_missing_path_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");
    assert!(matches!(
        loader::resolve_settings_path(Some(&missing)),
        Err(SettingsError::FileNotFound(_))
    ));
}

#[test]
fn test_explicit_path_wins() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.toml");
    fs::write(&path, "log_dir = \"/tmp/sensor-logs\"\n").unwrap();

    let (settings, used) = loader::load_or_default(Some(&path)).unwrap();
    assert_eq!(used, Some(path));
    assert_eq!(settings.log_dir, PathBuf::from("/tmp/sensor-logs"));
}

#[test]
fn test_non_toml_extension_rejected() {
    assert!(loader::validate_settings_path(std::path::Path::new("/etc/settings.json")).is_err());
    assert!(loader::validate_settings_path(std::path::Path::new("/etc/settings.toml")).is_ok());
}
