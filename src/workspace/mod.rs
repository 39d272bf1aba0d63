//! Named workspaces under the per-user config directory.
//!
//! `config.json` records every registered workspace and which one is current.
//! Local workspaces live in `workspaces/<name>/`; git workspaces are external
//! directories registered with `workspace add`.

pub mod bundle;
pub mod legacy;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::store::{self, Store, StoreError, io_err};

pub use bundle::{EXPORT_FORMAT, ExportBundle, ImportReport, export, import};
pub use legacy::{MigrateReport, migrate};

pub const REGISTRY_FILE: &str = "config.json";
pub const LOCAL_WORKSPACES_DIR: &str = "workspaces";
pub const DEFAULT_WORKSPACE: &str = "default";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkspaceError {
    #[error("invalid workspace name `{name}`: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("workspace not found: {0}")]
    NotFound(String),

    #[error("workspace {0} already exists")]
    Exists(String),

    #[error("{0:?} already holds events; import needs an empty workspace")]
    NotEmpty(PathBuf),

    #[error("unsupported export format `{0}`")]
    UnsupportedFormat(String),

    #[error("malformed registry {path:?}: {source}")]
    Registry {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("legacy database {path:?}: {source}")]
    Legacy {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] crate::git::SyncError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceKind {
    Local,
    Git,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceEntry {
    pub name: String,
    pub kind: WorkspaceKind,
    pub dir: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_workspace: Option<String>,
    #[serde(default)]
    pub workspaces: Vec<WorkspaceEntry>,
}

/// A registry entry as listed to the user.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceView {
    #[serde(flatten)]
    pub entry: WorkspaceEntry,
    pub current: bool,
}

/// Where a command will run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedWorkspace {
    pub root: PathBuf,
    /// Registry name; `None` for a bare `--dir`.
    pub name: Option<String>,
}

/// Trimmed name; interior whitespace is kept.
pub fn validate_name(raw: &str) -> Result<String, WorkspaceError> {
    let name = raw.trim();
    let reject = |reason| {
        Err(WorkspaceError::InvalidName {
            name: raw.to_string(),
            reason,
        })
    };
    if name.is_empty() {
        return reject("must not be empty");
    }
    if name == "." || name == ".." {
        return reject("must not be `.` or `..`");
    }
    if name.contains(['/', '\\']) {
        return reject("must not contain path separators");
    }
    if name.chars().any(char::is_control) {
        return reject("must not contain control characters");
    }
    Ok(name.to_string())
}

/// The registry loaded from one config directory.
#[derive(Clone, Debug)]
pub struct Workspaces {
    config_dir: PathBuf,
    registry: Registry,
}

impl Workspaces {
    pub fn open(config_dir: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let config_dir = config_dir.into();
        let path = config_dir.join(REGISTRY_FILE);
        let registry = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|source| WorkspaceError::Registry { path, source })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Registry::default(),
            Err(source) => return Err(io_err(&path, source).into()),
        };
        Ok(Self {
            config_dir,
            registry,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn save(&self) -> Result<(), WorkspaceError> {
        let bytes =
            serde_json::to_vec_pretty(&self.registry).map_err(|source| StoreError::Encode {
                what: "workspace registry",
                source,
            })?;
        store::write_atomic(&self.config_dir.join(REGISTRY_FILE), &bytes)?;
        Ok(())
    }

    fn local_dir(&self, name: &str) -> PathBuf {
        self.config_dir.join(LOCAL_WORKSPACES_DIR).join(name)
    }

    pub fn get(&self, name: &str) -> Option<&WorkspaceEntry> {
        self.registry.workspaces.iter().find(|w| w.name == name)
    }

    fn require(&self, raw: &str) -> Result<&WorkspaceEntry, WorkspaceError> {
        let name = validate_name(raw)?;
        self.get(&name).ok_or(WorkspaceError::NotFound(name))
    }

    pub fn list(&self) -> Vec<WorkspaceView> {
        let current = self.current_name();
        self.registry
            .workspaces
            .iter()
            .map(|entry| WorkspaceView {
                current: current.as_deref() == Some(entry.name.as_str()),
                entry: entry.clone(),
            })
            .collect()
    }

    fn current_name(&self) -> Option<String> {
        self.registry
            .current_workspace
            .clone()
            .or_else(|| self.get(DEFAULT_WORKSPACE).map(|w| w.name.clone()))
    }

    pub fn current(&self) -> Option<&WorkspaceEntry> {
        self.current_name().and_then(|name| self.get(&name))
    }

    /// Create (or re-open) a local workspace. The first workspace becomes current.
    pub fn init(&mut self, raw: &str, now: OffsetDateTime) -> Result<WorkspaceEntry, WorkspaceError> {
        let name = validate_name(raw)?;
        let entry = match self.get(&name) {
            Some(existing) => existing.clone(),
            None => WorkspaceEntry {
                dir: self.local_dir(&name),
                name: name.clone(),
                kind: WorkspaceKind::Local,
            },
        };
        Store::init(&entry.dir, now)?;
        self.register(entry.clone())?;
        Ok(entry)
    }

    /// Register an external directory, initializing the layout inside it.
    pub fn add(
        &mut self,
        raw: &str,
        dir: &Path,
        now: OffsetDateTime,
    ) -> Result<WorkspaceEntry, WorkspaceError> {
        let name = validate_name(raw)?;
        if self.get(&name).is_some() {
            return Err(WorkspaceError::Exists(name));
        }
        fs::create_dir_all(dir).map_err(|source| io_err(dir, source))?;
        let dir = dir.canonicalize().map_err(|source| io_err(dir, source))?;
        Store::init(&dir, now)?;
        let entry = WorkspaceEntry {
            name,
            kind: WorkspaceKind::Git,
            dir,
        };
        self.register(entry.clone())?;
        Ok(entry)
    }

    fn register(&mut self, entry: WorkspaceEntry) -> Result<(), WorkspaceError> {
        if self.get(&entry.name).is_none() {
            tracing::info!(workspace = %entry.name, dir = %entry.dir.display(), "workspace registered");
            self.registry.workspaces.push(entry.clone());
        }
        if self.registry.current_workspace.is_none() {
            self.registry.current_workspace = Some(entry.name);
        }
        self.save()
    }

    pub fn use_workspace(&mut self, raw: &str) -> Result<WorkspaceEntry, WorkspaceError> {
        let entry = self.require(raw)?.clone();
        self.registry.current_workspace = Some(entry.name.clone());
        self.save()?;
        Ok(entry)
    }

    /// Rename; a local workspace's directory moves with it.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<WorkspaceEntry, WorkspaceError> {
        let old = self.require(from)?.clone();
        let name = validate_name(to)?;
        if self.get(&name).is_some() {
            return Err(WorkspaceError::Exists(name));
        }
        let mut renamed = WorkspaceEntry {
            name: name.clone(),
            ..old.clone()
        };
        if old.kind == WorkspaceKind::Local && old.dir == self.local_dir(&old.name) {
            let target = self.local_dir(&name);
            if old.dir.exists() {
                fs::rename(&old.dir, &target).map_err(|source| io_err(&old.dir, source))?;
            }
            renamed.dir = target;
        }
        if let Some(slot) = self.registry.workspaces.iter_mut().find(|w| w.name == old.name) {
            *slot = renamed.clone();
        }
        if self.registry.current_workspace.as_deref() == Some(old.name.as_str()) {
            self.registry.current_workspace = Some(name);
        }
        self.save()?;
        Ok(renamed)
    }

    /// Drop the registry entry. Files on disk are left alone.
    pub fn forget(&mut self, raw: &str) -> Result<WorkspaceEntry, WorkspaceError> {
        let entry = self.require(raw)?.clone();
        self.registry.workspaces.retain(|w| w.name != entry.name);
        if self.registry.current_workspace.as_deref() == Some(entry.name.as_str()) {
            self.registry.current_workspace = None;
        }
        self.save()?;
        Ok(entry)
    }

    /// `--dir`, then `--workspace`, then the current workspace, then `default`.
    pub fn resolve(
        &self,
        dir: Option<&Path>,
        workspace: Option<&str>,
    ) -> Result<ResolvedWorkspace, WorkspaceError> {
        if let Some(dir) = dir {
            return Ok(ResolvedWorkspace {
                root: dir.to_path_buf(),
                name: None,
            });
        }
        if let Some(raw) = workspace {
            let entry = self.require(raw)?;
            return Ok(ResolvedWorkspace {
                root: entry.dir.clone(),
                name: Some(entry.name.clone()),
            });
        }
        if let Some(entry) = self.current() {
            return Ok(ResolvedWorkspace {
                root: entry.dir.clone(),
                name: Some(entry.name.clone()),
            });
        }
        Ok(ResolvedWorkspace {
            root: self.local_dir(DEFAULT_WORKSPACE),
            name: Some(DEFAULT_WORKSPACE.to_string()),
        })
    }

    /// A fresh local workspace for import or migration; refuses taken names.
    pub(crate) fn create_local(
        &mut self,
        raw: &str,
        now: OffsetDateTime,
    ) -> Result<WorkspaceEntry, WorkspaceError> {
        let name = validate_name(raw)?;
        if self.get(&name).is_some() {
            return Err(WorkspaceError::Exists(name));
        }
        self.init(&name, now)
    }
}
