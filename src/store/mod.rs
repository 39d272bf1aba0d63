//! Workspace storage.
//!
//! The event log under `events/` is canonical. The snapshot under `.clarity/`
//! is derived: it is rewritten by every command and can always be rebuilt by
//! [`reindex`](reindex::reindex).

pub mod attachments;
pub mod doctor;
pub mod event_log;
pub mod layout;
pub mod reindex;
pub mod replay;
pub mod snapshot;

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::{Attachment, Event, State};

pub use attachments::StoredBlob;
pub use doctor::{DoctorOptions, DoctorReport, Issue, Severity};
pub use event_log::{EventLog, LogScan, MalformedLine};
pub use layout::{CANONICAL_PATHS, Layout};
pub use reindex::ReindexReport;
pub use replay::{Rejection, ReplayReport, Replayed, replay};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed json in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("no workspace at {0:?}; run `clarity init`")]
    NotInitialized(PathBuf),

    #[error("attachment is {bytes} bytes, over the {max} byte limit")]
    AttachmentTooLarge { bytes: u64, max: u64 },

    #[error("attachment path `{0}` is outside the workspace")]
    PathOutsideWorkspace(String),
}

pub(crate) fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Identity of a workspace, stored in `meta/workspace.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMeta {
    pub format_version: u32,
    pub workspace_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub const WORKSPACE_FORMAT_VERSION: u32 = 1;

impl WorkspaceMeta {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            format_version: WORKSPACE_FORMAT_VERSION,
            workspace_id: Uuid::new_v4(),
            created_at: now,
        }
    }
}

/// Handle on one workspace directory.
#[derive(Clone, Debug)]
pub struct Store {
    layout: Layout,
    log: EventLog,
}

impl Store {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let layout = Layout::new(root);
        let log = EventLog::new(layout.event_log());
        Self { layout, log }
    }

    /// Open a workspace that must already exist.
    pub fn open_existing(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::open(root);
        if !store.layout.is_initialized() {
            return Err(StoreError::NotInitialized(store.layout.root().to_path_buf()));
        }
        Ok(store)
    }

    /// Create the directory skeleton, workspace metadata and `.gitignore`.
    /// Existing files are left alone.
    pub fn init(root: impl Into<PathBuf>, now: OffsetDateTime) -> Result<Self, StoreError> {
        let store = Self::open(root);
        let layout = &store.layout;
        for dir in [
            layout.events_dir(),
            layout.meta_dir(),
            layout.resources_dir(),
            layout.derived_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|source| io_err(&dir, source))?;
        }
        if !layout.workspace_meta().exists() {
            store.write_meta(&WorkspaceMeta::new(now))?;
        }
        store.log.touch()?;
        ensure_gitignore(layout)?;
        tracing::info!(root = %layout.root().display(), "workspace initialized");
        Ok(store)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn read_meta(&self) -> Result<Option<WorkspaceMeta>, StoreError> {
        let path = self.layout.workspace_meta();
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Json { path, source }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(io_err(&path, source)),
        }
    }

    pub fn write_meta(&self, meta: &WorkspaceMeta) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(meta).map_err(|source| StoreError::Encode {
            what: "workspace metadata",
            source,
        })?;
        write_atomic(&self.layout.workspace_meta(), &bytes)
    }

    /// The snapshot; rebuilt from the log when the snapshot is missing but
    /// events exist (a fresh clone), empty otherwise.
    pub fn load(&self) -> Result<State, StoreError> {
        if let Some(state) = snapshot::load(&self.layout.snapshot())? {
            return Ok(state);
        }
        if self.log.is_empty()? {
            return Ok(State::new());
        }
        tracing::info!("snapshot missing; replaying event log");
        let scan = self.log.scan()?;
        Ok(replay(scan.events.iter().map(|(_, e)| e)).state)
    }

    pub fn save(&self, state: &State) -> Result<(), StoreError> {
        snapshot::save(&self.layout.snapshot(), state)
    }

    /// Persist one command: its events, then the snapshot that reflects them.
    pub fn commit(&self, events: &[Event], state: &State) -> Result<(), StoreError> {
        self.log.append_events(events)?;
        for event in events {
            tracing::debug!(event_id = %event.id, event_type = %event.kind, entity = %event.entity_id, "event appended");
        }
        self.save(state)
    }

    /// Append one record the caller has already applied to its aggregate.
    pub fn append_event(&self, event: &Event) -> Result<(), StoreError> {
        self.log.append(event)?;
        tracing::debug!(event_id = %event.id, event_type = %event.kind, entity = %event.entity_id, "event appended");
        Ok(())
    }

    pub fn attachment_abs_path(&self, attachment: &Attachment) -> Result<PathBuf, StoreError> {
        attachments::resolve(&self.layout, &attachment.relative_path)
    }

    pub fn store_attachment(
        &self,
        src: &Path,
        max_bytes: Option<u64>,
    ) -> Result<StoredBlob, StoreError> {
        attachments::store_file(&self.layout, src, max_bytes)
    }
}

/// Append the derived-state ignore line unless present.
pub fn ensure_gitignore(layout: &Layout) -> Result<bool, StoreError> {
    let path = layout.gitignore();
    let existing = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => return Err(io_err(&path, source)),
    };
    let present = existing
        .lines()
        .any(|line| matches!(line.trim(), ".clarity" | ".clarity/" | "/.clarity/"));
    if present {
        return Ok(false);
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| io_err(&path, source))?;
    let sep = if existing.is_empty() || existing.ends_with('\n') { "" } else { "\n" };
    writeln!(file, "{sep}{}", layout::DERIVED_IGNORE_LINE).map_err(|source| io_err(&path, source))?;
    Ok(true)
}

/// Temp file in the same directory, fsync, rename, fsync the directory.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::PathOutsideWorkspace(path.display().to_string()))?;
    fs::create_dir_all(dir).map_err(|source| io_err(dir, source))?;
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|source| io_err(dir, source))?;
    temp.write_all(data).map_err(|source| io_err(temp.path(), source))?;
    temp.as_file()
        .sync_all()
        .map_err(|source| io_err(path, source))?;
    temp.persist(path)
        .map_err(|err| io_err(path, err.error))?;
    fsync_dir(dir)
}

#[cfg(unix)]
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), StoreError> {
    let file = File::open(dir).map_err(|source| io_err(dir, source))?;
    file.sync_all().map_err(|source| io_err(dir, source))
}

#[cfg(not(unix))]
pub(crate) fn fsync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_ignores_derived_state() {
        let tmp = tempfile::tempdir().unwrap();
        let now = OffsetDateTime::UNIX_EPOCH;
        let store = Store::init(tmp.path(), now).unwrap();
        let meta = store.read_meta().unwrap().unwrap();
        Store::init(tmp.path(), now).unwrap();
        assert_eq!(store.read_meta().unwrap().unwrap(), meta);
        let ignore = fs::read_to_string(tmp.path().join(".gitignore")).unwrap();
        assert_eq!(ignore.matches(".clarity/").count(), 1);
        assert!(store.layout().event_log().is_file());
    }

    #[test]
    fn open_existing_requires_a_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            Store::open_existing(tmp.path()),
            Err(StoreError::NotInitialized(_))
        ));
    }

    #[test]
    fn load_replays_when_snapshot_is_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::init(tmp.path(), OffsetDateTime::UNIX_EPOCH).unwrap();
        let event = Event {
            id: crate::core::EventId::from_counter(1),
            ts: OffsetDateTime::UNIX_EPOCH,
            actor_id: crate::core::ActorId::from_counter(1),
            kind: "identity.create".into(),
            entity_id: "act-1".into(),
            payload: serde_json::json!({"kind": "human", "name": "Ada"}),
        };
        store.append_event(&event).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.actors.len(), 1);
        assert_eq!(loaded.next_ids.get("evt"), Some(&1));
        assert_eq!(loaded.next_ids.get("act"), Some(&1));
    }
}
