//! Artifact generation: configuration module, service unit, operator scripts.
//!
//! Rendering is a pure function of the `ProvisioningConfig` and the install
//! `Layout`. Writing goes through an `ArtifactStore` and never clobbers: an
//! existing file is renamed to a timestamped backup first.

pub mod store;
pub mod templates;

pub use store::{ArtifactStore, FsStore, MemoryStore};

use crate::config::validator;
use crate::config::Layout;
use crate::error::GenerationError;
use crate::models::{ArtifactKind, ArtifactMode, GeneratedArtifact, ProvisioningConfig};
use crate::log_parsed;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An artifact that reached the store, plus where its predecessor went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    pub artifact: GeneratedArtifact,
    pub backup: Option<PathBuf>,
}

/// Renders and writes the artifacts for one install layout.
pub struct ArtifactGenerator {
    layout: Layout,
    store: Arc<dyn ArtifactStore>,
}

impl ArtifactGenerator {
    pub fn new(layout: Layout, store: Arc<dyn ArtifactStore>) -> Self {
        ArtifactGenerator { layout, store }
    }

    /// Target path of each artifact kind.
    pub fn path_for(&self, kind: ArtifactKind) -> PathBuf {
        let install_dir = &self.layout.install_dir;
        match kind {
            ArtifactKind::ConfigModule => install_dir.join(&self.layout.config_file),
            ArtifactKind::ServiceDescriptor => self.layout.unit_dir.join(self.layout.unit_name()),
            ArtifactKind::StartScript => install_dir.join("start.sh"),
            ArtifactKind::StopScript => install_dir.join("stop.sh"),
            ArtifactKind::StatusScript => install_dir.join("status.sh"),
        }
    }

    /// Render one artifact without touching the store.
    pub fn render(
        &self,
        config: &ProvisioningConfig,
        kind: ArtifactKind,
    ) -> Result<GeneratedArtifact, GenerationError> {
        self.validate(config)?;

        let unit = self.layout.unit_name();
        let content = match kind {
            ArtifactKind::ConfigModule => templates::get_config_module(
                &config.device_identity,
                config.sensor_pin,
                &config.data_store.host,
                &config.data_store.user,
                &config.data_store.password,
                &config.data_store.database_name,
            ),
            ArtifactKind::ServiceDescriptor => {
                let working_dir = path_text(&self.layout.install_dir);
                let exec_start = format!(
                    "{} {}",
                    path_text(&self.layout.python),
                    path_text(&self.layout.install_dir.join(&self.layout.app_entry))
                );
                templates::get_service_unit(
                    &config.device_identity,
                    &self.layout.run_user,
                    &working_dir,
                    &exec_start,
                    self.layout.restart_delay_secs,
                )
            }
            ArtifactKind::StartScript => templates::get_control_script("start", &unit),
            ArtifactKind::StopScript => templates::get_control_script("stop", &unit),
            ArtifactKind::StatusScript => {
                templates::get_status_script(&unit, self.layout.status_log_lines)
            }
        };

        Ok(GeneratedArtifact {
            kind,
            path: self.path_for(kind),
            content,
            mode: kind.mode(),
        })
    }

    /// Render and write one artifact, backing up whatever was there.
    pub fn generate(
        &self,
        config: &ProvisioningConfig,
        kind: ArtifactKind,
    ) -> Result<GeneratedArtifact, GenerationError> {
        let artifact = self.render(config, kind)?;
        self.write_artifact(&artifact)?;
        Ok(artifact)
    }

    /// Render every kind first, then write them in order.
    ///
    /// A field that cannot be rendered therefore fails before anything is written.
    pub fn generate_all(
        &self,
        config: &ProvisioningConfig,
    ) -> Result<Vec<WrittenArtifact>, GenerationError> {
        let rendered = ArtifactKind::ALL
            .iter()
            .map(|kind| self.render(config, *kind))
            .collect::<Result<Vec<_>, _>>()?;

        let mut written = Vec::with_capacity(rendered.len());
        for artifact in rendered {
            let backup = self.write_artifact(&artifact)?;
            written.push(WrittenArtifact { artifact, backup });
        }
        Ok(written)
    }

    /// Back up any existing file at the artifact path, then write the new content.
    ///
    /// Returns the backup path when a previous file was moved aside.
    pub fn write_artifact(
        &self,
        artifact: &GeneratedArtifact,
    ) -> Result<Option<PathBuf>, GenerationError> {
        let path = &artifact.path;
        let write_failed = |source| GenerationError::WriteFailed {
            path: path.clone(),
            source,
        };

        let backup = if self.store.exists(path) {
            let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
            let backup = store::backup_path_for(path, &stamp, |p| self.store.exists(p));
            self.store.rename(path, &backup).map_err(write_failed)?;
            if artifact.mode == ArtifactMode::Secret {
                // Earlier runs may have left the file readable by everyone
                self.store
                    .set_mode(&backup, ArtifactMode::Secret)
                    .map_err(|source| GenerationError::WriteFailed {
                        path: backup.clone(),
                        source,
                    })?;
            }
            log::info!(
                "[Artifacts] Backed up {} to {}",
                path.display(),
                backup.display()
            );
            Some(backup)
        } else {
            None
        };

        self.store
            .write(path, &artifact.content, artifact.mode)
            .map_err(write_failed)?;
        log_parsed!("ARTIFACT: wrote {} ({})", path.display(), artifact.kind);
        Ok(backup)
    }

    fn validate(&self, config: &ProvisioningConfig) -> Result<(), GenerationError> {
        let store = &config.data_store;
        field("device_identity", validator::validate_identity(&config.device_identity))?;
        field("sensor_pin", validator::validate_sensor_pin(config.sensor_pin))?;
        field("database.host", validator::validate_host(&store.host))?;
        field("database.user", validator::validate_user(&store.user))?;
        field("database.password", validator::validate_password(&store.password))?;
        field("database.database", validator::validate_database(&store.database_name))?;
        field("layout.run_user", validator::validate_user(&self.layout.run_user))?;
        field("layout.install_dir", validator::validate_path_field(&self.layout.install_dir))?;
        field("layout.python", validator::validate_path_field(&self.layout.python))?;
        if !validator::is_plain_file_name(&self.layout.app_entry) {
            return Err(GenerationError::InvalidField {
                field: "layout.app_entry".to_string(),
                reason: format!("'{}' is not a plain file name", self.layout.app_entry),
            });
        }
        Ok(())
    }
}

fn field(name: &str, result: Result<(), String>) -> Result<(), GenerationError> {
    result.map_err(|reason| GenerationError::InvalidField {
        field: name.to_string(),
        reason,
    })
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
