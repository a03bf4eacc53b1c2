//! Configuration module for sensor provisioning.
//!
//! Two kinds of configuration flow through a run:
//!
//! - `Settings`: static, non-secret knobs (install layout, package sets,
//!   interfaces, probe timeout, built-in answer defaults) read from a TOML file
//!   before anything happens.
//! - `ProvisioningConfig`: the site-specific answers collected from the operator
//!   by `ConfigCollector`. Immutable once collected.
//!
//! # Module Structure
//!
//! - `collector`: interactive collection with defaults and confirmation
//! - `prompt`: the `InteractiveSource` abstraction (terminal and scripted)
//! - `loader`: settings file resolution, loading and saving
//! - `validator`: field validation rules shared with artifact generation

pub mod collector;
pub mod loader;
pub mod prompt;
pub mod validator;

pub use collector::ConfigCollector;
pub use prompt::{InteractiveSource, ScriptedSource, TerminalSource};

use crate::error::SettingsError;
use crate::system;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Answers used when the operator presses enter on an optional prompt.
///
/// There is deliberately no password here: secrets must be typed in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDefaults {
    pub host: String,
    pub user: String,
    pub sensor_pin: u32,
    pub database: String,
}

impl Default for FieldDefaults {
    fn default() -> Self {
        FieldDefaults {
            host: "192.168.1.54".to_string(),
            user: "webapp".to_string(),
            sensor_pin: 17,
            database: "iwt_db".to_string(),
        }
    }
}

/// Where generated artifacts go and how the service is described.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub install_dir: PathBuf,
    pub app_entry: String,
    pub config_file: String,
    pub service_name: String,
    pub unit_dir: PathBuf,
    pub run_user: String,
    pub python: PathBuf,
    pub restart_delay_secs: u32,
    pub status_log_lines: u32,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            install_dir: PathBuf::from("/home/pi/sensor"),
            app_entry: "sensor.py".to_string(),
            config_file: "config.py".to_string(),
            service_name: "sensor".to_string(),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            run_user: "pi".to_string(),
            python: PathBuf::from("/usr/bin/python3"),
            restart_delay_secs: 10,
            status_log_lines: 50,
        }
    }
}

impl Layout {
    /// Unit file name, e.g. `sensor.service`
    pub fn unit_name(&self) -> String {
        format!("{}.service", self.service_name)
    }
}

/// Packages the sensor application needs on the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSet {
    pub apt: Vec<String>,
    pub pip: Vec<String>,
}

impl Default for PackageSet {
    fn default() -> Self {
        PackageSet {
            apt: [
                "python3",
                "python3-pip",
                "python3-rpi.gpio",
                "python3-mysql.connector",
                "python3-pil",
                "python3-spidev",
                "python3-schedule",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            pip: vec!["luma.oled".to_string()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub timeout_secs: u64,
    pub port: u16,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        ProbeSettings {
            timeout_secs: 10,
            port: 3306,
        }
    }
}

/// Static provisioning settings, loaded from `settings.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Hardware interfaces to enable (raspi-config names)
    pub interfaces: Vec<String>,
    /// Device nodes expected to exist once the interfaces are enabled
    pub interface_devices: Vec<PathBuf>,
    /// Sensor application to stage into the install directory
    pub app_source: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub defaults: FieldDefaults,
    pub layout: Layout,
    pub packages: PackageSet,
    pub probe: ProbeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            interfaces: vec!["spi".to_string(), "i2c".to_string()],
            interface_devices: vec![
                PathBuf::from("/dev/spidev0.0"),
                PathBuf::from("/dev/i2c-1"),
            ],
            app_source: None,
            log_dir: PathBuf::from("/var/log/sensor-provision"),
            defaults: FieldDefaults::default(),
            layout: Layout::default(),
            packages: PackageSet::default(),
            probe: ProbeSettings::default(),
        }
    }
}

impl Settings {
    /// Reject settings that would produce broken artifacts, unsafe host
    /// commands or an unbounded probe.
    ///
    /// Runs before any step, so a bad file never leaves the host half-changed.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let layout = &self.layout;
        let defaults = &self.defaults;
        for (name, result) in [
            ("defaults.host", validator::validate_host(&defaults.host)),
            ("defaults.user", validator::validate_user(&defaults.user)),
            ("defaults.database", validator::validate_database(&defaults.database)),
            ("layout.run_user", validator::validate_user(&layout.run_user)),
        ] {
            result.map_err(|reason| {
                SettingsError::ValidationFailed(format!("{}: {}", name, reason))
            })?;
        }
        let host_inputs = self
            .interfaces
            .iter()
            .map(|name| ("interfaces", system::validate_interface(name)))
            .chain(
                self.packages
                    .apt
                    .iter()
                    .map(|name| ("packages.apt", system::validate_apt_package(name))),
            )
            .chain(
                self.packages
                    .pip
                    .iter()
                    .map(|name| ("packages.pip", system::validate_pip_package(name))),
            );
        for (name, result) in host_inputs {
            result.map_err(|e| SettingsError::ValidationFailed(format!("{}: {}", name, e)))?;
        }
        for device in &self.interface_devices {
            validator::validate_path_field(device).map_err(|reason| {
                SettingsError::ValidationFailed(format!("interface_devices: {}", reason))
            })?;
        }
        if !validator::is_valid_service_name(&layout.service_name) {
            return Err(SettingsError::ValidationFailed(format!(
                "Invalid service name: '{}'",
                layout.service_name
            )));
        }
        for (name, dir) in [
            ("install_dir", &layout.install_dir),
            ("unit_dir", &layout.unit_dir),
            ("python", &layout.python),
        ] {
            if !dir.is_absolute() {
                return Err(SettingsError::ValidationFailed(format!(
                    "layout.{} must be an absolute path, got {}",
                    name,
                    dir.display()
                )));
            }
            validator::validate_path_field(dir).map_err(|reason| {
                SettingsError::ValidationFailed(format!("layout.{}: {}", name, reason))
            })?;
        }
        for (name, file) in [
            ("app_entry", &layout.app_entry),
            ("config_file", &layout.config_file),
        ] {
            if !validator::is_plain_file_name(file) {
                return Err(SettingsError::ValidationFailed(format!(
                    "layout.{} must be a plain file name, got '{}'",
                    name, file
                )));
            }
        }
        if layout.restart_delay_secs == 0 {
            return Err(SettingsError::ValidationFailed(
                "layout.restart_delay_secs must be positive".to_string(),
            ));
        }
        if layout.status_log_lines == 0 {
            return Err(SettingsError::ValidationFailed(
                "layout.status_log_lines must be positive".to_string(),
            ));
        }
        if self.probe.timeout_secs == 0 {
            return Err(SettingsError::ValidationFailed(
                "probe.timeout_secs must be positive".to_string(),
            ));
        }
        validator::validate_sensor_pin(self.defaults.sensor_pin).map_err(|reason| {
            SettingsError::ValidationFailed(format!("defaults.sensor_pin: {}", reason))
        })?;
        Ok(())
    }
}
