/// System module: host capabilities behind `SystemWrapper`, input validation,
/// and the data-store connectivity probe.

pub mod probe;

pub use probe::ConnectivityProbe;

use crate::error::StepError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

/// Logging macros for convenient access
/// Use the log crate directly for target-aware routing
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::log::info!("{}", msg);
    }}
}

#[macro_export]
macro_rules! log_parsed {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        // Use target="parsed" for high-level events
        $crate::log::info!(target: "parsed", "{}", msg);
    }}
}

/// Interfaces `raspi-config nonint do_<name> 0` knows how to enable
pub const KNOWN_INTERFACES: &[&str] = &["spi", "i2c", "serial_hw", "onewire", "ssh", "rgpio"];

/// systemctl verbs the provisioning steps may issue
pub const SYSTEMCTL_VERBS: &[&str] = &["daemon-reload", "enable", "start", "stop", "restart"];

static APT_PACKAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9+.\-]+$").expect("Invalid apt package regex"));

static PIP_PACKAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-]*(==[A-Za-z0-9.]+)?$").expect("Invalid pip package regex"));

static UNIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.@\-]*\.service$").expect("Invalid unit regex"));

/// Host capabilities the provisioning steps consume.
///
/// Every operation is idempotent: asking for an already-installed package,
/// an already-enabled interface or an already-enabled unit succeeds.
pub trait SystemWrapper: Send + Sync {
    /// True when running with effective uid 0
    fn is_privileged(&self) -> bool;

    fn refresh_package_index(&self) -> Result<(), StepError>;

    fn install_packages(&self, packages: &[String]) -> Result<(), StepError>;

    fn install_pip_packages(&self, packages: &[String]) -> Result<(), StepError>;

    fn enable_interface(&self, interface: &str) -> Result<(), StepError>;

    fn device_present(&self, path: &Path) -> bool;

    fn create_dir(&self, path: &Path) -> Result<(), StepError>;

    /// Copy `from` to `to`. Returns `false` when `to` already had identical content.
    fn copy_file(&self, from: &Path, to: &Path) -> Result<bool, StepError>;

    /// Issue one supervisor verb, optionally against a unit.
    fn systemctl(&self, verb: &str, unit: Option<&str>) -> Result<(), StepError>;
}

pub fn validate_apt_package(name: &str) -> Result<(), StepError> {
    if APT_PACKAGE_RE.is_match(name) {
        Ok(())
    } else {
        Err(StepError::InvalidInput(format!(
            "Package name contains invalid characters: {}",
            name
        )))
    }
}

pub fn validate_pip_package(name: &str) -> Result<(), StepError> {
    if PIP_PACKAGE_RE.is_match(name) {
        Ok(())
    } else {
        Err(StepError::InvalidInput(format!(
            "Python package name contains invalid characters: {}",
            name
        )))
    }
}

pub fn validate_interface(name: &str) -> Result<(), StepError> {
    if KNOWN_INTERFACES.contains(&name) {
        Ok(())
    } else {
        Err(StepError::InvalidInput(format!(
            "Unknown hardware interface '{}'. Known: {}",
            name,
            KNOWN_INTERFACES.join(", ")
        )))
    }
}

pub fn validate_systemctl(verb: &str, unit: Option<&str>) -> Result<(), StepError> {
    if !SYSTEMCTL_VERBS.contains(&verb) {
        return Err(StepError::InvalidInput(format!("Unsupported systemctl verb: {}", verb)));
    }
    if let Some(unit) = unit {
        if !UNIT_RE.is_match(unit) {
            return Err(StepError::InvalidInput(format!("Invalid unit name: {}", unit)));
        }
    }
    Ok(())
}

/// Default production implementation of SystemWrapper
///
/// Shells out to apt-get, pip, raspi-config and systemctl. Arguments are
/// always passed as separate argv entries, never through a shell.
pub struct SystemImpl;

impl SystemImpl {
    pub fn new() -> Self {
        SystemImpl
    }
}

impl Default for SystemImpl {
    fn default() -> Self {
        SystemImpl::new()
    }
}

/// Run a command to completion, logging its output.
fn run_command(program: &str, args: &[&str], envs: &[(&str, &str)]) -> Result<(), StepError> {
    let display = format!("{} {}", program, args.join(" "));
    log_info!("[System] Running: {}", display);

    let output = Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .output()
        .map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StepError::CommandNotFound(program.to_string())
            } else {
                StepError::CommandFailed {
                    cmd: display.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        log::info!("[{}] stdout: {}", program, stdout.trim_end());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        log::info!("[{}] stderr: {}", program, stderr.trim_end());
    }

    if output.status.success() {
        Ok(())
    } else {
        let last_line = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("no error output");
        Err(StepError::CommandFailed {
            cmd: display,
            reason: format!("exit status {:?}: {}", output.status.code(), last_line.trim()),
        })
    }
}

impl SystemWrapper for SystemImpl {
    fn is_privileged(&self) -> bool {
        nix::unistd::Uid::effective().is_root()
    }

    fn refresh_package_index(&self) -> Result<(), StepError> {
        run_command("apt-get", &["update"], &[("DEBIAN_FRONTEND", "noninteractive")])
    }

    fn install_packages(&self, packages: &[String]) -> Result<(), StepError> {
        if packages.is_empty() {
            return Ok(());
        }
        for pkg in packages {
            validate_apt_package(pkg)?;
        }
        let mut args = vec!["install", "-y", "--no-install-recommends", "--"];
        args.extend(packages.iter().map(String::as_str));
        run_command("apt-get", &args, &[("DEBIAN_FRONTEND", "noninteractive")])
    }

    fn install_pip_packages(&self, packages: &[String]) -> Result<(), StepError> {
        if packages.is_empty() {
            return Ok(());
        }
        for pkg in packages {
            validate_pip_package(pkg)?;
        }
        let mut args = vec!["-m", "pip", "install", "--upgrade-strategy", "only-if-needed"];
        args.extend(packages.iter().map(String::as_str));
        // Newer Raspberry Pi OS marks the system interpreter as externally managed
        run_command("python3", &args, &[("PIP_BREAK_SYSTEM_PACKAGES", "1")])
    }

    fn enable_interface(&self, interface: &str) -> Result<(), StepError> {
        validate_interface(interface)?;
        let action = format!("do_{}", interface);
        run_command("raspi-config", &["nonint", &action, "0"], &[])
    }

    fn device_present(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir(&self, path: &Path) -> Result<(), StepError> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<bool, StepError> {
        let source = fs::read(from)?;
        if let Ok(existing) = fs::read(to) {
            if existing == source {
                return Ok(false);
            }
        }
        fs::write(to, source)?;
        Ok(true)
    }

    fn systemctl(&self, verb: &str, unit: Option<&str>) -> Result<(), StepError> {
        validate_systemctl(verb, unit)?;
        let mut args = vec![verb];
        if let Some(unit) = unit {
            args.push(unit);
        }
        run_command("systemctl", &args, &[])
    }
}
