//! Provisioning orchestration: CollectingConfig -> RunningSystemSteps ->
//! GeneratingArtifacts -> RunningServiceSteps -> Probing -> Reporting -> Done.
//!
//! Any fatal error moves the run to `Aborted` and nothing further touches
//! the host. A failed connectivity probe is not fatal.

pub mod phases;
pub mod report;
pub mod runner;
pub mod state;

pub use report::ProvisionReport;
pub use runner::{FnStep, ProvisioningStep, RunSummary, StepOutcome, StepRunner};
pub use state::{OrchestrationState, ProvisionPhase};

use crate::artifacts::{ArtifactGenerator, ArtifactStore};
use crate::config::{ConfigCollector, InteractiveSource, Settings};
use crate::error::ProvisionError;
use crate::log_parsed;
use crate::system::{ConnectivityProbe, SystemWrapper};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Drives one provisioning run end to end.
pub struct Orchestrator {
    /// Shared so callers can observe the phase while a run is in flight
    state: Arc<RwLock<OrchestrationState>>,

    settings: Settings,

    system: Arc<dyn SystemWrapper>,

    store: Arc<dyn ArtifactStore>,

    probe: ConnectivityProbe,

    /// Directory receiving the JSON report copy, if any
    report_dir: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        system: Arc<dyn SystemWrapper>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let probe = ConnectivityProbe::new(
            settings.probe.port,
            Duration::from_secs(settings.probe.timeout_secs),
        );
        Orchestrator {
            state: Arc::new(RwLock::new(OrchestrationState::new())),
            settings,
            system,
            store,
            probe,
            report_dir: None,
        }
    }

    /// Save `provision-report.json` into `dir` during the reporting phase.
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    pub fn with_probe(mut self, probe: ConnectivityProbe) -> Self {
        self.probe = probe;
        self
    }

    pub async fn current_phase(&self) -> ProvisionPhase {
        self.state.read().await.phase
    }

    pub async fn state(&self) -> OrchestrationState {
        self.state.read().await.clone()
    }

    /// Run every phase in order.
    ///
    /// On failure the state is left in `Aborted` with the failing component
    /// recorded, and the error is returned unchanged.
    pub async fn run(
        &self,
        source: &mut dyn InteractiveSource,
    ) -> Result<ProvisionReport, ProvisionError> {
        log_parsed!("PHASE: {}", ProvisionPhase::CollectingConfig);
        match self.execute(source).await {
            Ok(report) => Ok(report),
            Err(err) => {
                let mut state = self.state.write().await;
                if err.is_cancellation() {
                    log_parsed!("ABORTED: provisioning cancelled by operator");
                } else {
                    log_parsed!(
                        "ABORTED during {}: [{}] {}",
                        state.phase,
                        err.component(),
                        err
                    );
                }
                state.record_abort(err.component(), err.to_string());
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        source: &mut dyn InteractiveSource,
    ) -> Result<ProvisionReport, ProvisionError> {
        self.settings.validate()?;
        let collector = ConfigCollector::new(self.settings.defaults.clone());
        let config = collector.collect(source)?;
        log::info!("[Orchestrator] Collected configuration: {:?}", config);

        let runner = StepRunner::new();

        self.transition(ProvisionPhase::RunningSystemSteps).await?;
        let system_steps = phases::system_steps(&self.settings, self.system.clone());
        let system_summary = runner.run(&system_steps)?;

        self.transition(ProvisionPhase::GeneratingArtifacts).await?;
        let generator = ArtifactGenerator::new(self.settings.layout.clone(), self.store.clone());
        let written = generator.generate_all(&config)?;

        self.transition(ProvisionPhase::RunningServiceSteps).await?;
        let service_steps = phases::service_steps(&self.settings.layout, self.system.clone());
        let service_summary = runner.run(&service_steps)?;

        self.transition(ProvisionPhase::Probing).await?;
        let probe = self.probe.probe(&config.data_store).await;
        log_parsed!(
            "PROBE: {} ({})",
            if probe.succeeded { "reachable" } else { "not reachable" },
            probe.detail
        );

        self.transition(ProvisionPhase::Reporting).await?;
        let mut completed = system_summary.completed;
        completed.extend(service_summary.completed);
        let mut warnings = system_summary.warnings;
        warnings.extend(service_summary.warnings);
        let report = ProvisionReport::new(&config, &written, completed, &warnings, probe);
        self.publish(&report, source);

        self.transition(ProvisionPhase::Done).await?;
        if let Ok(elapsed) = self.state.read().await.elapsed_since_start() {
            log_parsed!("DONE: provisioned in {}s", elapsed.as_secs());
        }
        Ok(report)
    }

    /// Print the report and save its JSON copy. Failures here only warn.
    fn publish(&self, report: &ProvisionReport, source: &mut dyn InteractiveSource) {
        if let Err(e) = source.say(&report.render()) {
            log::warn!("[Orchestrator] Could not print report: {}", e);
        }
        if let Some(dir) = &self.report_dir {
            match report.save_json(dir) {
                Ok(path) => log::info!("[Orchestrator] Report saved to {}", path.display()),
                Err(e) => log::warn!(
                    "[Orchestrator] Could not save report in {}: {}",
                    dir.display(),
                    e
                ),
            }
        }
    }

    async fn transition(&self, next: ProvisionPhase) -> Result<(), ProvisionError> {
        self.state
            .write()
            .await
            .transition_to(next)
            .map_err(ProvisionError::InvalidTransition)?;
        log_parsed!("PHASE: {}", next);
        Ok(())
    }
}
