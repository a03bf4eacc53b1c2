//! Provisioning phase tracking.
//!
//! - `ProvisionPhase`: the discrete stages of one provisioning run
//! - `OrchestrationState`: current phase, visited phases, and the abort cause
//!
//! Transitions only move forward. `Aborted` is reachable from every
//! non-terminal phase; `Done` and `Aborted` are terminal.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisionPhase {
    /// Prompting the operator and confirming the summary
    CollectingConfig,

    /// Privilege check, packages, interfaces, app staging
    RunningSystemSteps,

    /// Rendering and writing the configuration module, unit and scripts
    GeneratingArtifacts,

    /// Registering, enabling and restarting the unit
    RunningServiceSteps,

    /// Checking data-store reachability
    Probing,

    /// Building and printing the final report
    Reporting,

    Done,

    /// Unrecoverable failure or operator cancellation
    Aborted,
}

impl ProvisionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionPhase::CollectingConfig => "collecting-config",
            ProvisionPhase::RunningSystemSteps => "running-system-steps",
            ProvisionPhase::GeneratingArtifacts => "generating-artifacts",
            ProvisionPhase::RunningServiceSteps => "running-service-steps",
            ProvisionPhase::Probing => "probing",
            ProvisionPhase::Reporting => "reporting",
            ProvisionPhase::Done => "done",
            ProvisionPhase::Aborted => "aborted",
        }
    }

    /// All valid phase transitions FROM this phase.
    pub fn valid_next_phases(&self) -> Vec<ProvisionPhase> {
        use ProvisionPhase::*;
        match self {
            CollectingConfig => vec![RunningSystemSteps, Aborted],
            RunningSystemSteps => vec![GeneratingArtifacts, Aborted],
            GeneratingArtifacts => vec![RunningServiceSteps, Aborted],
            RunningServiceSteps => vec![Probing, Aborted],
            Probing => vec![Reporting, Aborted],
            Reporting => vec![Done, Aborted],
            Done | Aborted => vec![],
        }
    }

    pub fn can_transition_to(&self, next: ProvisionPhase) -> bool {
        self.valid_next_phases().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProvisionPhase::Done | ProvisionPhase::Aborted)
    }
}

impl std::fmt::Display for ProvisionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Why a run ended in `Aborted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortRecord {
    /// Phase that was active when the failure happened
    pub phase: ProvisionPhase,
    /// Failing component or step name
    pub component: String,
    pub cause: String,
}

/// Snapshot of one provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationState {
    pub phase: ProvisionPhase,

    /// Every phase entered so far, in order
    pub history: Vec<ProvisionPhase>,

    pub start_time: SystemTime,

    pub last_update_time: SystemTime,

    pub abort: Option<AbortRecord>,
}

impl OrchestrationState {
    pub fn new() -> Self {
        let now = SystemTime::now();
        OrchestrationState {
            phase: ProvisionPhase::CollectingConfig,
            history: vec![ProvisionPhase::CollectingConfig],
            start_time: now,
            last_update_time: now,
            abort: None,
        }
    }

    /// Attempt to transition to the next phase.
    pub fn transition_to(&mut self, next_phase: ProvisionPhase) -> Result<(), String> {
        if !self.phase.can_transition_to(next_phase) {
            return Err(format!(
                "Invalid phase transition: {} -> {}",
                self.phase.as_str(),
                next_phase.as_str()
            ));
        }
        self.phase = next_phase;
        self.history.push(next_phase);
        self.last_update_time = SystemTime::now();
        Ok(())
    }

    /// Move to `Aborted`, remembering where and why. Ignored once terminal.
    pub fn record_abort(&mut self, component: impl Into<String>, cause: impl Into<String>) {
        if self.phase.is_terminal() {
            return;
        }
        self.abort = Some(AbortRecord {
            phase: self.phase,
            component: component.into(),
            cause: cause.into(),
        });
        self.phase = ProvisionPhase::Aborted;
        self.history.push(ProvisionPhase::Aborted);
        self.last_update_time = SystemTime::now();
    }

    pub fn has_visited(&self, phase: ProvisionPhase) -> bool {
        self.history.contains(&phase)
    }

    pub fn elapsed_since_start(&self) -> Result<std::time::Duration, std::time::SystemTimeError> {
        self.start_time.elapsed()
    }
}

impl Default for OrchestrationState {
    fn default() -> Self {
        OrchestrationState::new()
    }
}
