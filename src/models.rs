//! Core data types for sensor provisioning.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Placeholder shown wherever the data-store password would be printed.
pub const REDACTED: &str = "********";

/// Remote data store the sensor application reports into.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStore {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database_name: String,
}

// Password never reaches logs through Debug formatting.
impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &REDACTED)
            .field("database_name", &self.database_name)
            .finish()
    }
}

/// Operator-supplied provisioning parameters.
///
/// Built once by the collector and afterwards only handed out as `&ProvisioningConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    pub device_identity: String,
    pub sensor_pin: u32,
    pub data_store: DataStore,
}

impl ProvisioningConfig {
    /// Copy suitable for printing or persisting: password replaced.
    pub fn redacted(&self) -> ProvisioningConfig {
        let mut copy = self.clone();
        copy.data_store.password = REDACTED.to_string();
        copy
    }

    /// Human-readable multi-line summary, password redacted.
    pub fn summary(&self) -> String {
        format!(
            "  Device identity : {}\n  Sensor GPIO pin : {}\n  Database host   : {}\n  Database user   : {}\n  Database pass   : {}\n  Database name   : {}",
            self.device_identity,
            self.sensor_pin,
            self.data_store.host,
            self.data_store.user,
            REDACTED,
            self.data_store.database_name,
        )
    }
}

/// The generated files, one variant per output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Key/value configuration consumed by the sensor application
    ConfigModule,
    /// systemd unit for the sensor application
    ServiceDescriptor,
    StartScript,
    StopScript,
    StatusScript,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::ConfigModule,
        ArtifactKind::ServiceDescriptor,
        ArtifactKind::StartScript,
        ArtifactKind::StopScript,
        ArtifactKind::StatusScript,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::ConfigModule => "config-module",
            ArtifactKind::ServiceDescriptor => "service-descriptor",
            ArtifactKind::StartScript => "start-script",
            ArtifactKind::StopScript => "stop-script",
            ArtifactKind::StatusScript => "status-script",
        }
    }

    pub fn is_operator_script(&self) -> bool {
        matches!(
            self,
            ArtifactKind::StartScript | ArtifactKind::StopScript | ArtifactKind::StatusScript
        )
    }

    pub fn mode(&self) -> ArtifactMode {
        match self {
            // Carries the data-store password
            ArtifactKind::ConfigModule => ArtifactMode::Secret,
            ArtifactKind::ServiceDescriptor => ArtifactMode::Regular,
            _ => ArtifactMode::Executable,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// File permission class of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactMode {
    Regular,
    Executable,
    /// Readable by the owner and its group only
    Secret,
}

impl ArtifactMode {
    /// Unix permission bits
    pub fn bits(&self) -> u32 {
        match self {
            ArtifactMode::Regular => 0o644,
            ArtifactMode::Executable => 0o755,
            ArtifactMode::Secret => 0o640,
        }
    }
}

/// A rendered file ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub content: String,
    pub mode: ArtifactMode,
}

/// Why a connectivity probe did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeFailure {
    /// Host name did not resolve
    Resolve,
    /// Nothing listening on the port
    Refused,
    /// No answer within the timeout
    TimedOut,
    /// Server answered with an error packet (e.g., host not allowed)
    Rejected,
    /// Something answered that is not a MySQL server
    Protocol,
    /// Any other socket error (network unreachable, reset, ...)
    Network,
}

impl ProbeFailure {
    /// True when re-running later will not help: the configuration itself is wrong.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            ProbeFailure::Resolve | ProbeFailure::Rejected | ProbeFailure::Protocol
        )
    }
}

/// Outcome of the data-store connectivity check. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub succeeded: bool,
    pub detail: String,
    pub failure: Option<ProbeFailure>,
}

impl ProbeResult {
    pub fn success(detail: impl Into<String>) -> Self {
        ProbeResult {
            succeeded: true,
            detail: detail.into(),
            failure: None,
        }
    }

    pub fn failed(failure: ProbeFailure, detail: impl Into<String>) -> Self {
        ProbeResult {
            succeeded: false,
            detail: detail.into(),
            failure: Some(failure),
        }
    }

    pub fn is_misconfiguration(&self) -> bool {
        self.failure.map_or(false, |f| f.is_misconfiguration())
    }
}
