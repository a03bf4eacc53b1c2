//! Settings file loader and serialization.

use super::Settings;
use crate::error::SettingsError;
use std::fs;
use std::path::{Path, PathBuf};

/// System-wide settings location
pub const SYSTEM_SETTINGS_PATH: &str = "/etc/sensor-provision/settings.toml";

/// Get the per-user settings path: ~/.config/sensor-provision/settings.toml
pub fn get_user_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sensor-provision").join("settings.toml"))
}

/// Pick the settings file to use.
///
/// An explicit path always wins (and must exist). Otherwise the system file,
/// then the per-user file; `None` means built-in defaults.
pub fn resolve_settings_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, SettingsError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.display().to_string()));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let system = PathBuf::from(SYSTEM_SETTINGS_PATH);
    if system.exists() {
        return Ok(Some(system));
    }

    Ok(get_user_settings_path().filter(|p| p.exists()))
}

/// Load settings from a TOML file and validate them.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    validate_settings_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SettingsError::FileNotFound(path.display().to_string())
        } else {
            SettingsError::IoError(e)
        }
    })?;

    let settings: Settings = toml::from_str(&content)?;
    settings.validate()?;
    Ok(settings)
}

/// Resolve and load, falling back to defaults. Returns the file actually used.
pub fn load_or_default(explicit: Option<&Path>) -> Result<(Settings, Option<PathBuf>), SettingsError> {
    match resolve_settings_path(explicit)? {
        Some(path) => {
            let settings = load_settings(&path)?;
            log::info!("[Settings] Loaded settings from {}", path.display());
            Ok((settings, Some(path)))
        }
        None => {
            log::info!("[Settings] No settings file found, using built-in defaults");
            Ok((Settings::default(), None))
        }
    }
}

/// Save settings to a TOML file, creating the parent directory.
pub fn save_settings(settings: &Settings, path: &Path) -> Result<(), SettingsError> {
    validate_settings_path(path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(path, to_toml_string(settings)?)?;
    Ok(())
}

pub fn to_toml_string(settings: &Settings) -> Result<String, SettingsError> {
    Ok(toml::to_string_pretty(settings)?)
}

/// Validate settings path (.toml extension required).
pub fn validate_settings_path(path: &Path) -> Result<(), SettingsError> {
    if path.as_os_str().is_empty() {
        return Err(SettingsError::ValidationFailed(
            "Settings path cannot be empty".to_string(),
        ));
    }

    match path.extension() {
        Some(ext) if ext == "toml" => Ok(()),
        Some(ext) => Err(SettingsError::ValidationFailed(format!(
            "Settings file must have .toml extension, got .{}",
            ext.to_string_lossy()
        ))),
        None => Err(SettingsError::ValidationFailed(
            "Settings file must have .toml extension".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_settings() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/settings.toml");

        let mut original = Settings::default();
        original.defaults.host = "10.1.1.1".to_string();
        original.layout.service_name = "heading-sensor".to_string();
        original.packages.pip.clear();
        original.app_source = Some(PathBuf::from("/opt/app/sensor.py"));

        save_settings(&original, &path).expect("Failed to save settings");
        let loaded = load_settings(&path).expect("Failed to load settings");
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        fs::write(&path, "[probe]\ntimeout_secs = 3\n").unwrap();

        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded.probe.timeout_secs, 3);
        assert_eq!(loaded.probe.port, 3306);
        assert_eq!(loaded.defaults.user, "webapp");
    }

    #[test]
    fn test_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        fs::write(&path, "interfaces = [").unwrap();
        assert!(matches!(load_settings(&path), Err(SettingsError::InvalidToml(_))));
    }

    #[test]
    fn test_invalid_values_rejected_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        fs::write(&path, "[layout]\ninstall_dir = \"relative/dir\"\n").unwrap();
        assert!(matches!(
            load_settings(&path),
            Err(SettingsError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = load_settings(Path::new("/nonexistent/settings.toml"));
        assert!(matches!(result, Err(SettingsError::FileNotFound(_))));
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let result = resolve_settings_path(Some(Path::new("/nonexistent/settings.toml")));
        assert!(matches!(result, Err(SettingsError::FileNotFound(_))));
    }

    #[test]
    fn test_validate_settings_path() {
        assert!(validate_settings_path(Path::new("settings.toml")).is_ok());
        assert!(validate_settings_path(Path::new("settings.json")).is_err());
        assert!(validate_settings_path(Path::new("settings")).is_err());
        assert!(validate_settings_path(Path::new("")).is_err());
    }

    #[test]
    fn test_default_settings_render_as_toml() {
        let text = to_toml_string(&Settings::default()).unwrap();
        assert!(text.contains("[layout]"));
        assert!(text.contains("service_name = \"sensor\""));
        assert!(!text.contains("password"));
    }
}
