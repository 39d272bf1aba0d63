//! Derived snapshot (`.clarity/state.json`).

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use super::{StoreError, io_err, write_atomic};
use crate::core::{DateTime, State};

/// `None` when no snapshot has been written yet.
pub fn load(path: &Path) -> Result<Option<State>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(io_err(path, source)),
    };
    let mut value: Value = serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if migrate_legacy(&mut value) {
        tracing::info!(path = %path.display(), "migrated legacy snapshot fields");
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
}

pub fn save(path: &Path, state: &State) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(state).map_err(|source| StoreError::Encode {
        what: "snapshot",
        source,
    })?;
    write_atomic(path, &bytes)
}

/// Rewrite pre-rename field names in place; true when anything changed.
///
/// `tasks` becomes `items`; inside records `dueAt`/`scheduleAt` become
/// `due`/`schedule` (plain date strings are lifted into `{date, time}`), and
/// `taskId`, `fromTaskId`, `toTaskId` gain their `item` spelling.
pub fn migrate_legacy(value: &mut Value) -> bool {
    let Some(root) = value.as_object_mut() else {
        return false;
    };
    let mut changed = rename(root, "tasks", "items");
    for (_, collection) in root.iter_mut() {
        let Some(entries) = collection.as_object_mut() else {
            continue;
        };
        for (_, entry) in entries.iter_mut() {
            let Some(record) = entry.as_object_mut() else {
                continue;
            };
            changed |= rename(record, "taskId", "itemId");
            changed |= rename(record, "fromTaskId", "fromItemId");
            changed |= rename(record, "toTaskId", "toItemId");
            for (old, new) in [("dueAt", "due"), ("scheduleAt", "schedule")] {
                if rename(record, old, new) {
                    changed = true;
                    lift_date(record, new);
                }
            }
        }
    }
    changed
}

fn rename(map: &mut Map<String, Value>, old: &str, new: &str) -> bool {
    if map.contains_key(new) {
        return map.remove(old).is_some();
    }
    match map.remove(old) {
        Some(value) => {
            map.insert(new.to_string(), value);
            true
        }
        None => false,
    }
}

fn lift_date(record: &mut Map<String, Value>, key: &str) {
    let Some(Value::String(raw)) = record.get(key) else {
        return;
    };
    let prefix: String = raw.chars().take(16).collect();
    let lifted = DateTime::parse(&prefix)
        .or_else(|_| DateTime::parse(&prefix.chars().take(10).collect::<String>()))
        .ok()
        .and_then(|dt| serde_json::to_value(dt).ok())
        .unwrap_or(Value::Null);
    record.insert(key.to_string(), lifted);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActorId, ItemId};
    use serde_json::json;

    #[test]
    fn missing_snapshot_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load(&tmp.path().join("state.json")).unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".clarity").join("state.json");
        let mut state = State::new();
        state.current_actor_id = Some(ActorId::from_counter(4));
        state.next_id::<ItemId>();
        save(&path, &state).unwrap();
        assert_eq!(load(&path).unwrap(), Some(state));
    }

    #[test]
    fn legacy_fields_are_renamed() {
        let mut legacy = json!({
            "version": 1,
            "tasks": {
                "item-1": {
                    "id": "item-1", "projectId": "proj-1", "outlineId": "out-1",
                    "rank": "h", "title": "t", "ownerActorId": "act-1",
                    "createdBy": "act-1", "createdAt": "2024-01-01T00:00:00Z",
                    "updatedAt": "2024-01-01T00:00:00Z",
                    "dueAt": "2024-02-03T09:30:00Z"
                }
            },
            "deps": {
                "dep-1": {
                    "id": "dep-1", "fromTaskId": "item-1", "toTaskId": "item-2",
                    "type": "blocks", "createdBy": "act-1", "createdAt": "2024-01-01T00:00:00Z"
                }
            },
            "comments": {
                "cmt-1": {
                    "id": "cmt-1", "taskId": "item-1", "authorId": "act-1",
                    "body": "hi", "createdAt": "2024-01-01T00:00:00Z"
                }
            }
        });
        assert!(migrate_legacy(&mut legacy));
        let state: State = serde_json::from_value(legacy).unwrap();
        let item = &state.items[&ItemId::from_counter(1)];
        let due = item.due.as_ref().unwrap();
        assert_eq!(due.date, "2024-02-03");
        assert_eq!(due.time.as_deref(), Some("09:30"));
        assert_eq!(state.deps.values().next().unwrap().to_item_id, ItemId::from_counter(2));
        assert_eq!(state.comments.values().next().unwrap().item_id, ItemId::from_counter(1));
    }

    #[test]
    fn current_snapshots_are_left_alone() {
        let mut value = serde_json::to_value(State::new()).unwrap();
        assert!(!migrate_legacy(&mut value));
    }
}
