//! Fixed template text for every generated artifact.
//!
//! Templates never embed timestamps or host facts: the same inputs always
//! render byte-identical output. Callers validate fields before rendering;
//! nothing here escapes.

/// First line of every generated file.
pub const GENERATED_MARKER: &str = "Generated by sensor-provision. Re-run provisioning to change.";

/// Python configuration module read by the sensor application.
///
/// Layout: `head_name`, `sensor_pin`, and a nested `database` mapping with
/// `host`, `user`, `password`, `database`.
pub fn get_config_module(
    head_name: &str,
    sensor_pin: u32,
    host: &str,
    user: &str,
    password: &str,
    database: &str,
) -> String {
    format!(
        r#"# {marker}
# Sensor configuration for {head_name}

CONFIG = {{
    'head_name': '{head_name}',
    'sensor_pin': {sensor_pin},
    'database': {{
        'host': '{host}',
        'user': '{user}',
        'password': '{password}',
        'database': '{database}',
    }},
}}
"#,
        marker = GENERATED_MARKER,
        head_name = head_name,
        sensor_pin = sensor_pin,
        host = host,
        user = user,
        password = password,
        database = database,
    )
}

/// systemd unit: always restart with a fixed delay, start after the network is online.
pub fn get_service_unit(
    head_name: &str,
    run_user: &str,
    working_dir: &str,
    exec_start: &str,
    restart_delay_secs: u32,
) -> String {
    format!(
        r#"# {marker}
[Unit]
Description=Sensor reporter ({head_name})
Wants=network-online.target
After=network-online.target

[Service]
Type=simple
User={run_user}
WorkingDirectory={working_dir}
ExecStart={exec_start}
Restart=always
RestartSec={restart_delay_secs}
StandardOutput=journal
StandardError=journal

[Install]
WantedBy=multi-user.target
"#,
        marker = GENERATED_MARKER,
        head_name = head_name,
        run_user = run_user,
        working_dir = working_dir,
        exec_start = exec_start,
        restart_delay_secs = restart_delay_secs,
    )
}

/// Operator script wrapping a single `systemctl` verb.
pub fn get_control_script(verb: &str, unit: &str) -> String {
    format!(
        r#"#!/bin/bash
# {marker}
set -e
sudo systemctl {verb} {unit}
"#,
        marker = GENERATED_MARKER,
        verb = verb,
        unit = unit,
    )
}

/// Status script: supervisor status plus the last `lines` journal entries.
pub fn get_status_script(unit: &str, lines: u32) -> String {
    format!(
        r#"#!/bin/bash
# {marker}
sudo systemctl status {unit} --no-pager || true
echo
echo "--- last {lines} log lines ---"
sudo journalctl -u {unit} -n {lines} --no-pager
"#,
        marker = GENERATED_MARKER,
        unit = unit,
        lines = lines,
    )
}
