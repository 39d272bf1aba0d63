//! Whole-workspace export and import.
//!
//! A bundle carries the workspace metadata and every log line verbatim, so
//! importing it and replaying yields the aggregate the source had.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::WorkspaceError;
use crate::core::State;
use crate::store::reindex::reindex;
use crate::store::{ReindexReport, Store, StoreError, WorkspaceMeta, io_err};

pub const EXPORT_FORMAT: &str = "clarity.export.v1";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<WorkspaceMeta>,
    pub events: Vec<Value>,
}

impl ExportBundle {
    pub fn read(path: &Path) -> Result<Self, WorkspaceError> {
        let bytes = fs::read(path).map_err(|source| io_err(path, source))?;
        let bundle: Self = serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if bundle.format != EXPORT_FORMAT {
            return Err(WorkspaceError::UnsupportedFormat(bundle.format));
        }
        Ok(bundle)
    }

    pub fn write(&self, path: &Path) -> Result<(), WorkspaceError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|source| StoreError::Encode {
            what: "export bundle",
            source,
        })?;
        fs::write(path, bytes).map_err(|source| io_err(path, source))?;
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub event_count: usize,
    pub reindex: ReindexReport,
}

pub fn export(store: &Store) -> Result<ExportBundle, WorkspaceError> {
    Ok(ExportBundle {
        format: EXPORT_FORMAT.to_string(),
        meta: store.read_meta()?,
        events: store.log().read_values()?,
    })
}

/// Write `bundle` into the workspace at `root`, which must hold no events
/// yet, and rebuild the snapshot.
pub fn import(
    bundle: &ExportBundle,
    root: &Path,
    now: OffsetDateTime,
) -> Result<(State, ImportReport), WorkspaceError> {
    if bundle.format != EXPORT_FORMAT {
        return Err(WorkspaceError::UnsupportedFormat(bundle.format.clone()));
    }
    let store = Store::init(root, now)?;
    if !store.log().is_empty()? {
        return Err(WorkspaceError::NotEmpty(root.to_path_buf()));
    }
    if let Some(meta) = &bundle.meta {
        store.write_meta(meta)?;
    }
    store.log().append_values(&bundle.events)?;
    let (state, reindex) = reindex(&store)?;
    tracing::info!(events = bundle.events.len(), root = %root.display(), "workspace imported");
    Ok((
        state,
        ImportReport {
            event_count: bundle.events.len(),
            reindex,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActorKind, DepType};
    use crate::ops::{Clock, Engine, EngineOptions, NewItem};

    #[test]
    fn export_then_import_reproduces_the_aggregate() {
        let src = tempfile::tempdir().unwrap();
        let now = OffsetDateTime::UNIX_EPOCH;
        let store = Store::init(src.path(), now).unwrap();
        let mut engine = Engine::open(store, EngineOptions::default(), Clock::fixed(now)).unwrap();
        engine.create_identity(ActorKind::Human, "Ada", None, true).unwrap();
        engine.create_project("Alpha").unwrap();
        let a = engine
            .create_item(NewItem {
                title: "a".into(),
                tags: vec!["infra".into()],
                ..Default::default()
            })
            .unwrap();
        let b = engine
            .create_item(NewItem {
                title: "b".into(),
                ..Default::default()
            })
            .unwrap();
        engine.add_dep(a.id.as_str(), b.id.as_str(), DepType::Blocks).unwrap();
        engine.add_comment(b.id.as_str(), "hi", None).unwrap();
        engine.save().unwrap();

        let bundle = export(engine.store()).unwrap();
        let file = src.path().join("bundle.json");
        bundle.write(&file).unwrap();
        let read = ExportBundle::read(&file).unwrap();
        assert_eq!(read, bundle);

        let dst = tempfile::tempdir().unwrap();
        let (state, report) = import(&read, dst.path(), now).unwrap();
        assert_eq!(report.event_count, engine.emitted().len());
        assert_eq!(state.items, engine.state().items);
        assert_eq!(state.deps, engine.state().deps);
        assert_eq!(state.comments, engine.state().comments);
        assert_eq!(state.next_ids, engine.state().next_ids);
        assert_eq!(
            Store::open(dst.path()).read_meta().unwrap(),
            engine.store().read_meta().unwrap()
        );

        assert!(matches!(
            import(&read, dst.path(), now),
            Err(WorkspaceError::NotEmpty(_))
        ));
    }

    #[test]
    fn unknown_formats_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.json");
        fs::write(&file, r#"{"format":"other.v9","events":[]}"#).unwrap();
        assert!(matches!(
            ExportBundle::read(&file),
            Err(WorkspaceError::UnsupportedFormat(_))
        ));
    }
}
