//! Service registration steps, run after the unit file has been written.

use crate::config::Layout;
use crate::orchestrator::runner::{step, BoxedStep, StepOutcome};
use crate::system::SystemWrapper;
use std::sync::Arc;

/// Reload the unit table, enable the unit at boot, then restart it.
///
/// Restart rather than start so a regenerated configuration module takes
/// effect on a re-run; on a stopped unit it simply starts it.
pub fn service_steps(layout: &Layout, system: Arc<dyn SystemWrapper>) -> Vec<BoxedStep> {
    let unit = layout.unit_name();

    let sys = system.clone();
    let reload = step("reload-units", move || {
        sys.systemctl("daemon-reload", None).map(|_| StepOutcome::Done)
    });

    let sys = system.clone();
    let enable_unit = unit.clone();
    let enable = step("enable-service", move || {
        sys.systemctl("enable", Some(&enable_unit)).map(|_| StepOutcome::Done)
    });

    let sys = system;
    let restart = step("restart-service", move || {
        sys.systemctl("restart", Some(&unit)).map(|_| StepOutcome::Done)
    });

    vec![reload, enable, restart]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_step_names() {
        let steps = service_steps(&Layout::default(), Arc::new(crate::system::SystemImpl::new()));
        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["reload-units", "enable-service", "restart-service"]);
    }
}
