//! Fail-fast step pipeline.
//!
//! Steps run strictly in the order given, one at a time. The first failing
//! step stops the pipeline; later steps are never invoked. There is no retry:
//! every step is idempotent, so the operator simply re-runs provisioning.

use crate::error::{PipelineError, StepError};
use crate::log_parsed;

/// What a successful step reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// Succeeded, but something needs the operator's attention
    Degraded(String),
}

/// One named, idempotent unit of host configuration.
pub trait ProvisioningStep {
    fn name(&self) -> &str;

    /// Re-running against a host where this already applied must succeed.
    fn apply(&self) -> Result<StepOutcome, StepError>;
}

/// Closure-backed step.
pub struct FnStep<F> {
    name: String,
    action: F,
}

impl<F> FnStep<F>
where
    F: Fn() -> Result<StepOutcome, StepError>,
{
    pub fn new(name: impl Into<String>, action: F) -> Self {
        FnStep {
            name: name.into(),
            action,
        }
    }
}

impl<F> ProvisioningStep for FnStep<F>
where
    F: Fn() -> Result<StepOutcome, StepError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self) -> Result<StepOutcome, StepError> {
        (self.action)()
    }
}

/// Boxed closure step, the shape the phase builders hand out.
pub type BoxedStep = Box<dyn ProvisioningStep + Send>;

pub fn step<F>(name: impl Into<String>, action: F) -> BoxedStep
where
    F: Fn() -> Result<StepOutcome, StepError> + Send + 'static,
{
    Box::new(FnStep::new(name, action))
}

/// Warning raised by a step that still succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepWarning {
    pub step_name: String,
    pub message: String,
}

/// Result of a pipeline that ran to the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: Vec<String>,
    pub warnings: Vec<StepWarning>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StepRunner;

impl StepRunner {
    pub fn new() -> Self {
        StepRunner
    }

    pub fn run(&self, steps: &[BoxedStep]) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();
        let total = steps.len();

        for (index, step) in steps.iter().enumerate() {
            let name = step.name().to_string();
            log_parsed!("STEP [{}/{}]: {}", index + 1, total, name);

            match step.apply() {
                Ok(StepOutcome::Done) => {
                    log::info!("[StepRunner] '{}' completed", name);
                }
                Ok(StepOutcome::Degraded(message)) => {
                    log::warn!("[StepRunner] '{}' completed with warning: {}", name, message);
                    summary.warnings.push(StepWarning {
                        step_name: name.clone(),
                        message,
                    });
                }
                Err(cause) => {
                    log::error!("[StepRunner] '{}' failed: {}", name, cause);
                    return Err(PipelineError {
                        step_name: name,
                        cause,
                    });
                }
            }
            summary.completed.push(name);
        }

        Ok(summary)
    }
}
