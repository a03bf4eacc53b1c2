//! Sensor appliance provisioning.
//!
//! Turns a freshly flashed Raspberry Pi image into a running sensor reporter:
//! collects the site configuration from the operator, installs packages,
//! enables hardware interfaces, writes the configuration module, service unit
//! and operator scripts, registers the service, and checks that the remote
//! data store answers.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Core data structures and types
//! - **config**: Settings file, operator prompts and field validation
//! - **artifacts**: Artifact templates, generation and backup-then-write storage
//! - **system**: Host capabilities (`SystemWrapper`) and the connectivity probe
//! - **orchestrator**: Step pipelines, phase state machine and the final report
//! - **log_collector**: Disk-persisting `log` backend

// Core foundational modules
pub mod error;
pub mod models;

// Host abstraction (commands, probe) and logging macros
pub mod system;

pub mod config;

pub mod artifacts;

// Robust, decoupled logging system
pub mod log_collector;

pub mod orchestrator;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::{LogCollector, LogLine};

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{
    ConfigError, GenerationError, PipelineError, ProvisionError, SettingsError, StepError,
};

pub use models::{
    ArtifactKind, ArtifactMode, DataStore, GeneratedArtifact, ProbeFailure, ProbeResult,
    ProvisioningConfig,
};

pub use artifacts::{ArtifactGenerator, ArtifactStore, FsStore, MemoryStore};
pub use config::{ConfigCollector, InteractiveSource, ScriptedSource, Settings, TerminalSource};
pub use orchestrator::{Orchestrator, ProvisionPhase, ProvisionReport, StepRunner};
pub use system::{ConnectivityProbe, SystemImpl, SystemWrapper};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
