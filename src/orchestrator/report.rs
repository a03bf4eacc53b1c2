//! Final provisioning summary.
//!
//! Printed to the operator and saved as JSON next to the logs. The password
//! never appears in either form.

use crate::artifacts::WrittenArtifact;
use crate::models::{ArtifactKind, ProbeResult, ProvisioningConfig};
use crate::orchestrator::runner::StepWarning;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name of the JSON copy inside the log directory
pub const REPORT_FILE_NAME: &str = "provision-report.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub backup: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWarning {
    pub step: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    /// Collected configuration, password already redacted
    pub config: ProvisioningConfig,
    pub artifacts: Vec<ArtifactEntry>,
    pub completed_steps: Vec<String>,
    pub warnings: Vec<ReportWarning>,
    pub probe: ProbeResult,
    pub generated_at: String,
}

impl ProvisionReport {
    pub fn new(
        config: &ProvisioningConfig,
        written: &[WrittenArtifact],
        completed_steps: Vec<String>,
        warnings: &[StepWarning],
        probe: ProbeResult,
    ) -> Self {
        ProvisionReport {
            config: config.redacted(),
            artifacts: written
                .iter()
                .map(|w| ArtifactEntry {
                    kind: w.artifact.kind,
                    path: w.artifact.path.clone(),
                    backup: w.backup.clone(),
                })
                .collect(),
            completed_steps,
            warnings: warnings
                .iter()
                .map(|w| ReportWarning {
                    step: w.step_name.clone(),
                    message: w.message.clone(),
                })
                .collect(),
            probe,
            generated_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Operator-facing text summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Provisioning complete ===\n\n");
        out.push_str("Configuration:\n");
        out.push_str(&self.config.summary());
        out.push_str("\n\nGenerated artifacts:\n");
        for artifact in &self.artifacts {
            out.push_str(&format!("  {:<20} {}\n", artifact.kind, artifact.path.display()));
            if let Some(backup) = &artifact.backup {
                out.push_str(&format!("  {:<20} previous kept at {}\n", "", backup.display()));
            }
        }

        out.push_str("\nData store connectivity:\n");
        if self.probe.succeeded {
            out.push_str(&format!("  OK: {}\n", self.probe.detail));
        } else if self.probe.is_misconfiguration() {
            out.push_str(&format!(
                "  WARNING (check configuration): {}\n",
                self.probe.detail
            ));
        } else {
            out.push_str(&format!(
                "  WARNING (not reachable yet, the sensor will keep retrying): {}\n",
                self.probe.detail
            ));
        }

        if !self.warnings.is_empty() {
            out.push_str("\nWarnings:\n");
            for warning in &self.warnings {
                out.push_str(&format!("  [{}] {}\n", warning.step, warning.message));
            }
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the JSON copy into `dir`, returning its path.
    pub fn save_json(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(REPORT_FILE_NAME);
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&path, json)?;
        Ok(path)
    }
}
