//! Host preparation steps, run before any artifact is written.

use crate::config::Settings;
use crate::error::StepError;
use crate::orchestrator::runner::{step, BoxedStep, StepOutcome};
use crate::system::SystemWrapper;
use std::sync::Arc;

/// Ordered host preparation pipeline for `settings`.
pub fn system_steps(settings: &Settings, system: Arc<dyn SystemWrapper>) -> Vec<BoxedStep> {
    let mut steps = Vec::new();

    let sys = system.clone();
    steps.push(step("check-privileges", move || {
        if sys.is_privileged() {
            Ok(StepOutcome::Done)
        } else {
            Err(StepError::PermissionDenied(
                "provisioning installs packages and registers services; run it as root (sudo)"
                    .to_string(),
            ))
        }
    }));

    let sys = system.clone();
    steps.push(step("refresh-package-index", move || {
        sys.refresh_package_index().map(|_| StepOutcome::Done)
    }));

    let sys = system.clone();
    let apt = settings.packages.apt.clone();
    steps.push(step("install-packages", move || {
        sys.install_packages(&apt).map(|_| StepOutcome::Done)
    }));

    if !settings.packages.pip.is_empty() {
        let sys = system.clone();
        let pip = settings.packages.pip.clone();
        steps.push(step("install-python-packages", move || {
            sys.install_pip_packages(&pip).map(|_| StepOutcome::Done)
        }));
    }

    for interface in &settings.interfaces {
        let sys = system.clone();
        let name = interface.clone();
        steps.push(step(format!("enable-interface-{}", interface), move || {
            sys.enable_interface(&name).map(|_| StepOutcome::Done)
        }));
    }

    if !settings.interface_devices.is_empty() {
        let sys = system.clone();
        let devices = settings.interface_devices.clone();
        steps.push(step("verify-interfaces", move || {
            let missing: Vec<String> = devices
                .iter()
                .filter(|d| !sys.device_present(d))
                .map(|d| d.display().to_string())
                .collect();
            if missing.is_empty() {
                Ok(StepOutcome::Done)
            } else {
                // Interfaces enabled via raspi-config only appear after a reboot
                Ok(StepOutcome::Degraded(format!(
                    "device nodes missing: {}; reboot required before the sensor can use them",
                    missing.join(", ")
                )))
            }
        }));
    }

    let sys = system;
    let install_dir = settings.layout.install_dir.clone();
    let entry = install_dir.join(&settings.layout.app_entry);
    let source = settings.app_source.clone();
    steps.push(step("stage-application", move || {
        sys.create_dir(&install_dir)?;
        match &source {
            Some(source) => {
                if sys.copy_file(source, &entry)? {
                    log::info!(
                        "[Stage] Copied {} to {}",
                        source.display(),
                        entry.display()
                    );
                } else {
                    log::info!("[Stage] {} already up to date", entry.display());
                }
                Ok(StepOutcome::Done)
            }
            None if sys.device_present(&entry) => Ok(StepOutcome::Done),
            None => Ok(StepOutcome::Degraded(format!(
                "{} is not present; copy the sensor application there before starting the service",
                entry.display()
            ))),
        }
    }));

    steps
}
