//! Concrete provisioning pipelines.
//!
//! - **System steps** (`system`): privilege check, package index, packages,
//!   hardware interfaces, device-node verification, application staging
//! - **Service steps** (`service`): unit registration, enable at boot, restart
//!
//! Each builder turns `Settings` into an ordered list of steps for `StepRunner`.
//! Host effects go through `SystemWrapper`, so the pipelines run unchanged
//! against a fake host in tests.

pub mod service;
pub mod system;

pub use service::service_steps;
pub use system::system_steps;
