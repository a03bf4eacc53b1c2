//! Field validation rules.
//!
//! Shared by the collector (bad operator input is rejected early) and the
//! artifact generator (a hand-built config still cannot break the rendered
//! Python, systemd or shell syntax).

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Highest BCM GPIO number on the 40-pin header
pub const MAX_GPIO_PIN: u32 = 27;

static IDENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]{0,63}$").expect("Invalid identity regex"));

static HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.\-]{0,252}$").expect("Invalid host regex"));

static USER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{1,32}$").expect("Invalid user regex"));

static DATABASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_$]{1,64}$").expect("Invalid database regex"));

static SERVICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.@\-]{0,63}$").expect("Invalid service regex"));

/// Device label: letters, digits, `_`, `.`, `-`; starts alphanumeric.
pub fn validate_identity(value: &str) -> Result<(), String> {
    if IDENTITY_RE.is_match(value) {
        Ok(())
    } else {
        Err(format!(
            "'{}' must be 1-64 letters, digits, '_', '.' or '-', starting with a letter or digit",
            value
        ))
    }
}

pub fn validate_host(value: &str) -> Result<(), String> {
    if HOST_RE.is_match(value) {
        Ok(())
    } else {
        Err(format!("'{}' is not a host name or IPv4 address", value))
    }
}

pub fn validate_user(value: &str) -> Result<(), String> {
    if USER_RE.is_match(value) {
        Ok(())
    } else {
        Err(format!(
            "'{}' must be 1-32 letters, digits, '_', '.' or '-'",
            value
        ))
    }
}

pub fn validate_database(value: &str) -> Result<(), String> {
    if DATABASE_RE.is_match(value) {
        Ok(())
    } else {
        Err(format!("'{}' is not a valid database name", value))
    }
}

/// Passwords are free text except for characters that would end or escape
/// a quoted string in the generated configuration module.
pub fn validate_password(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("password must not be empty".to_string());
    }
    if let Some(bad) = value
        .chars()
        .find(|c| c.is_control() || matches!(c, '\'' | '"' | '\\'))
    {
        return Err(format!(
            "password contains an unsupported character ({:?})",
            bad
        ));
    }
    Ok(())
}

pub fn validate_sensor_pin(pin: u32) -> Result<(), String> {
    if pin == 0 || pin > MAX_GPIO_PIN {
        Err(format!("GPIO pin must be between 1 and {}, got {}", MAX_GPIO_PIN, pin))
    } else {
        Ok(())
    }
}

/// Paths end up unquoted in systemd directives and quoted in shell scripts.
pub fn validate_path_field(path: &Path) -> Result<(), String> {
    let text = path
        .to_str()
        .ok_or_else(|| "path is not valid UTF-8".to_string())?;
    if text
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '\'' | '"' | '\\' | '$' | '`'))
    {
        return Err(format!("path '{}' contains whitespace or shell metacharacters", text));
    }
    Ok(())
}

pub fn is_valid_service_name(name: &str) -> bool {
    SERVICE_RE.is_match(name)
}

/// A bare file name: no separators, not `.` or `..`.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && validate_path_field(Path::new(name)).is_ok()
}
