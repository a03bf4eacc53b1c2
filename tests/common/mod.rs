//! Shared fixtures for integration tests: a recording fake host.

#![allow(dead_code)]

use sensor_provision::error::StepError;
use sensor_provision::system::SystemWrapper;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Fake host that records every call and can be told to fail one operation.
#[derive(Default)]
pub struct FakeHost {
    pub calls: Mutex<Vec<String>>,
    pub unprivileged: bool,
    /// Call label (e.g. "apt-install") that returns CommandFailed
    pub fail_on: Option<String>,
    pub present: Mutex<HashSet<PathBuf>>,
}

impl FakeHost {
    pub fn new() -> Self {
        FakeHost::default()
    }

    pub fn failing_on(label: &str) -> Self {
        FakeHost {
            fail_on: Some(label.to_string()),
            ..FakeHost::default()
        }
    }

    pub fn unprivileged() -> Self {
        FakeHost {
            unprivileged: true,
            ..FakeHost::default()
        }
    }

    pub fn with_present(self, paths: &[&str]) -> Self {
        if let Ok(mut present) = self.present.lock() {
            present.extend(paths.iter().map(PathBuf::from));
        }
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    fn record(&self, label: &str, detail: String) -> Result<(), StepError> {
        self.calls.lock().unwrap().push(format!("{} {}", label, detail).trim().to_string());
        if self.fail_on.as_deref() == Some(label) {
            return Err(StepError::CommandFailed {
                cmd: label.to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

impl SystemWrapper for FakeHost {
    fn is_privileged(&self) -> bool {
        !self.unprivileged
    }

    fn refresh_package_index(&self) -> Result<(), StepError> {
        self.record("apt-update", String::new())
    }

    fn install_packages(&self, packages: &[String]) -> Result<(), StepError> {
        self.record("apt-install", packages.join(" "))
    }

    fn install_pip_packages(&self, packages: &[String]) -> Result<(), StepError> {
        self.record("pip-install", packages.join(" "))
    }

    fn enable_interface(&self, interface: &str) -> Result<(), StepError> {
        self.record("enable-interface", interface.to_string())
    }

    fn device_present(&self, path: &Path) -> bool {
        self.present.lock().unwrap().contains(path)
    }

    fn create_dir(&self, path: &Path) -> Result<(), StepError> {
        self.record("mkdir", path.display().to_string())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<bool, StepError> {
        self.record("copy", format!("{} {}", from.display(), to.display()))?;
        Ok(true)
    }

    fn systemctl(&self, verb: &str, unit: Option<&str>) -> Result<(), StepError> {
        self.record(
            &format!("systemctl-{}", verb),
            unit.unwrap_or_default().to_string(),
        )
    }
}
