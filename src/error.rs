//! Unified error type hierarchy for sensor provisioning
//!
//! Provides structured error handling with ConfigError, StepError, PipelineError,
//! GenerationError, SettingsError, and the umbrella ProvisionError.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Operator configuration collection errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required field missing: {0}")]
    MissingRequiredField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Provisioning cancelled by user")]
    UserCancelled,

    #[error("IO error while reading operator input: {0}")]
    IoError(#[from] io::Error),
}

/// Settings file loading and validation errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid TOML in settings: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Settings validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during settings operations: {0}")]
    IoError(#[from] io::Error),
}

/// Failure of a single provisioning step's action.
#[derive(Error, Debug)]
pub enum StepError {
    /// Host command ran but reported failure (e.g., apt-get, systemctl)
    #[error("Command '{cmd}' failed: {reason}")]
    CommandFailed { cmd: String, reason: String },

    /// Host command binary is not installed
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// Invalid input (e.g., package name with shell chars)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A named step in the pipeline failed; execution halted there.
#[derive(Error, Debug)]
#[error("Step '{step_name}' failed: {cause}")]
pub struct PipelineError {
    pub step_name: String,
    #[source]
    pub cause: StepError,
}

/// Artifact rendering or writing errors.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Could not write artifact {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Field '{field}' cannot be rendered: {reason}")]
    InvalidField { field: String, reason: String },
}

/// Top-level error for a provisioning run.
///
/// Every variant is fatal: the orchestrator transitions to `Aborted` and the
/// binary exits non-zero. Connectivity failures never appear here.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Orchestrator attempted an illegal phase transition
    #[error("Invalid phase transition: {0}")]
    InvalidTransition(String),
}

impl ProvisionError {
    /// Name of the component (or step) that failed, for operator display
    pub fn component(&self) -> String {
        match self {
            ProvisionError::Config(_) => "config".to_string(),
            ProvisionError::Pipeline(e) => e.step_name.clone(),
            ProvisionError::Generation(_) => "artifacts".to_string(),
            ProvisionError::Settings(_) => "settings".to_string(),
            ProvisionError::InvalidTransition(_) => "orchestrator".to_string(),
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, ProvisionError::Config(ConfigError::UserCancelled))
    }

    /// Process exit status for this failure: 2 for a declined run, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.is_cancellation() {
            2
        } else {
            1
        }
    }
}
