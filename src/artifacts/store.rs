//! Artifact storage: backup-then-write over a small trait.
//!
//! `FsStore` is the real filesystem; `MemoryStore` keeps everything in a map
//! so generation and orchestration can be tested without touching disk.

use crate::models::ArtifactMode;
use nix::unistd::{chown, User};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage for generated artifacts.
pub trait ArtifactStore: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn read(&self, path: &Path) -> io::Result<String>;

    /// Move the file at `from` to `to`. `to` must not exist.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Replace the content at `path` in one step and apply `mode`.
    fn write(&self, path: &Path, content: &str, mode: ArtifactMode) -> io::Result<()>;

    /// Change the permissions of an existing file.
    fn set_mode(&self, path: &Path, mode: ArtifactMode) -> io::Result<()>;
}

/// Pick a backup name next to `path` that does not exist yet.
///
/// `<file>.<stamp>.bak`, then `<file>.<stamp>-1.bak`, `-2`, ... on collision.
pub fn backup_path_for(path: &Path, stamp: &str, exists: impl Fn(&Path) -> bool) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "artifact".to_string());

    let mut candidate = path.with_file_name(format!("{}.{}.bak", file_name, stamp));
    let mut counter = 1u32;
    while exists(&candidate) {
        candidate = path.with_file_name(format!("{}.{}-{}.bak", file_name, stamp, counter));
        counter += 1;
    }
    candidate
}

/// Real filesystem store.
///
/// With an owner set, `Secret` files are handed to that account and its
/// primary group so the service can read them while other users cannot.
#[derive(Debug, Default, Clone)]
pub struct FsStore {
    secret_owner: Option<String>,
}

impl FsStore {
    pub fn new() -> Self {
        FsStore::default()
    }

    pub fn with_secret_owner(mut self, user: impl Into<String>) -> Self {
        self.secret_owner = Some(user.into());
        self
    }

    fn hand_over(&self, path: &Path, mode: ArtifactMode) -> io::Result<()> {
        let Some(name) = self.secret_owner.as_deref() else {
            return Ok(());
        };
        if mode != ArtifactMode::Secret {
            return Ok(());
        }
        let user = User::from_name(name)
            .map_err(io::Error::from)?
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no such user: {}", name))
            })?;
        chown(path, Some(user.uid), Some(user.gid)).map_err(io::Error::from)
    }
}

impl ArtifactStore for FsStore {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if to.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("refusing to overwrite {}", to.display()),
            ));
        }
        fs::rename(from, to)
    }

    fn write(&self, path: &Path, content: &str, mode: ArtifactMode) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write beside the target, then rename over it: readers never see half a file.
        let staging = path.with_file_name(format!(
            ".{}.partial",
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        ));
        let result = fs::write(&staging, content)
            .and_then(|_| fs::set_permissions(&staging, fs::Permissions::from_mode(mode.bits())))
            .and_then(|_| self.hand_over(&staging, mode))
            .and_then(|_| fs::rename(&staging, path));
        if result.is_err() {
            let _ = fs::remove_file(&staging);
        }
        result
    }

    fn set_mode(&self, path: &Path, mode: ArtifactMode) -> io::Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode.bits()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub content: String,
    pub mode: ArtifactMode,
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<PathBuf, StoredFile>>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// A store on which every write fails, like a read-only mount.
    pub fn read_only() -> Self {
        MemoryStore {
            files: Mutex::new(BTreeMap::new()),
            read_only: true,
        }
    }

    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(
                path.into(),
                StoredFile {
                    content: content.into(),
                    mode: ArtifactMode::Regular,
                },
            );
        }
    }

    pub fn get(&self, path: &Path) -> Option<StoredFile> {
        self.files.lock().ok().and_then(|files| files.get(path).cloned())
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, BTreeMap<PathBuf, StoredFile>>> {
        self.files
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory store poisoned"))
    }
}

impl ArtifactStore for MemoryStore {
    fn exists(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        self.get(path)
            .map(|f| f.content)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only store"));
        }
        let mut files = self.lock()?;
        if files.contains_key(to) {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, to.display().to_string()));
        }
        let file = files
            .remove(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, from.display().to_string()))?;
        files.insert(to.to_path_buf(), file);
        Ok(())
    }

    fn write(&self, path: &Path, content: &str, mode: ArtifactMode) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only store"));
        }
        self.lock()?.insert(
            path.to_path_buf(),
            StoredFile {
                content: content.to_string(),
                mode,
            },
        );
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: ArtifactMode) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only store"));
        }
        let mut files = self.lock()?;
        let file = files
            .get_mut(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))?;
        file.mode = mode;
        Ok(())
    }
}
