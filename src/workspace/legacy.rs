//! One-shot import of a legacy SQLite workspace.
//!
//! The legacy database keeps current state only, so migration synthesizes the
//! events that would have produced it and writes them into a fresh workspace.
//! Tables read (all but `actors`, `projects`, `outlines` and `tasks` optional):
//!
//! ```text
//! actors(id, kind, name, user_id)
//! projects(id, name, created_by, created_at, archived)
//! outlines(id, project_id, name, created_by, created_at)
//! outline_statuses(outline_id, status_id, label, is_end_state, require_note, position)
//! tasks(id, outline_id, parent_id, title, description, status_id, priority, on_hold,
//!       due_at, schedule_at, owner_id, assigned_id, created_by, created_at, archived,
//!       sort_order)
//! task_tags(task_id, tag)
//! dependencies(from_task_id, to_task_id, type)
//! comments(id, task_id, author_id, body, created_at)
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags, Row};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use super::WorkspaceError;
use crate::core::event::{
    ArchivePayload, CommentAddPayload, DepAddPayload, IdentityCreatePayload, ItemCreatePayload,
    OutlineCreatePayload, ProjectCreatePayload,
};
use crate::core::{
    ActorId, ActorKind, ApplyMode, CommentId, DateTime, DepId, DepType, Event, EventId, EventType,
    ItemId, OutlineId, OutlineStatusDef, Priority, ProjectId, State, StatusId, apply_event,
    normalize_tag, rank,
};
use crate::git::{GitSync, SetupOptions, SetupReport};
use crate::store::reindex::reindex;
use crate::store::{StoreError, Store};

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateReport {
    pub actors: usize,
    pub projects: usize,
    pub outlines: usize,
    pub items: usize,
    pub deps: usize,
    pub comments: usize,
    /// Rows that could not be turned into a valid event.
    pub skipped: usize,
    pub event_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<SetupReport>,
}

/// Read `db` and write the equivalent event log into `root`, which must not
/// hold events yet. With `git`, the result is committed to a new repository.
pub fn migrate(
    db: &Path,
    root: &Path,
    now: OffsetDateTime,
    git: bool,
) -> Result<MigrateReport, WorkspaceError> {
    let sql_err = |source| WorkspaceError::Legacy {
        path: db.to_path_buf(),
        source,
    };
    let conn = Connection::open_with_flags(db, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(sql_err)?;
    let legacy = LegacyDb::read(&conn).map_err(sql_err)?;

    let store = Store::init(root, now)?;
    if !store.log().is_empty()? {
        return Err(WorkspaceError::NotEmpty(root.to_path_buf()));
    }
    let mut migrator = Migrator::new(now);
    migrator.run(&legacy)?;
    let values = migrator
        .events
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| StoreError::Encode {
            what: "event",
            source,
        })?;
    store.log().append_values(&values)?;
    reindex(&store)?;

    let mut report = migrator.report;
    report.event_count = values.len();
    if git {
        report.git = Some(GitSync::new(root).setup(&SetupOptions {
            initial_commit: true,
            ..SetupOptions::default()
        })?);
    }
    tracing::info!(db = %db.display(), events = report.event_count, skipped = report.skipped, "legacy workspace migrated");
    Ok(report)
}

// =============================================================================
// Reading
// =============================================================================

#[derive(Debug, Default)]
struct LegacyDb {
    actors: Vec<Row8>,
    projects: Vec<Row8>,
    outlines: Vec<Row8>,
    statuses: Vec<Row8>,
    tasks: Vec<Row8>,
    tags: Vec<Row8>,
    deps: Vec<Row8>,
    comments: Vec<Row8>,
}

/// A row flattened to optional text cells.
type Row8 = Vec<Option<String>>;

impl LegacyDb {
    fn read(conn: &Connection) -> rusqlite::Result<Self> {
        let mut db = Self {
            actors: select(conn, "SELECT id, kind, name, user_id FROM actors")?,
            projects: select(
                conn,
                "SELECT id, name, created_by, created_at, archived FROM projects",
            )?,
            outlines: select(
                conn,
                "SELECT id, project_id, name, created_by, created_at FROM outlines",
            )?,
            tasks: select(
                conn,
                "SELECT id, outline_id, parent_id, title, description, status_id, priority, \
                 on_hold, due_at, schedule_at, owner_id, assigned_id, created_by, created_at, \
                 archived, sort_order FROM tasks",
            )?,
            ..Self::default()
        };
        if table_exists(conn, "outline_statuses")? {
            db.statuses = select(
                conn,
                "SELECT outline_id, status_id, label, is_end_state, require_note, position \
                 FROM outline_statuses ORDER BY outline_id, position",
            )?;
        }
        if table_exists(conn, "task_tags")? {
            db.tags = select(conn, "SELECT task_id, tag FROM task_tags")?;
        }
        if table_exists(conn, "dependencies")? {
            db.deps = select(conn, "SELECT from_task_id, to_task_id, type FROM dependencies")?;
        }
        if table_exists(conn, "comments")? {
            db.comments = select(
                conn,
                "SELECT id, task_id, author_id, body, created_at FROM comments ORDER BY created_at, id",
            )?;
        }
        Ok(db)
    }
}

fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
}

fn select(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<Row8>> {
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let rows = stmt.query_map([], |row| cells(row, width))?;
    rows.collect()
}

fn cells(row: &Row<'_>, width: usize) -> rusqlite::Result<Row8> {
    (0..width)
        .map(|i| {
            Ok(match row.get::<_, SqlValue>(i)? {
                SqlValue::Null => None,
                SqlValue::Integer(n) => Some(n.to_string()),
                SqlValue::Real(f) => Some(f.to_string()),
                SqlValue::Text(s) => Some(s),
                SqlValue::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
            })
        })
        .collect()
}

fn cell(row: &Row8, i: usize) -> Option<&str> {
    row.get(i)
        .and_then(|c| c.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn flag(row: &Row8, i: usize) -> bool {
    matches!(cell(row, i), Some("1" | "true" | "TRUE" | "yes"))
}

// =============================================================================
// Synthesis
// =============================================================================

struct Migrator {
    state: State,
    events: Vec<Event>,
    report: MigrateReport,
    now: OffsetDateTime,
    last_ts: OffsetDateTime,
    actors: HashMap<String, ActorId>,
    fallback_actor: Option<ActorId>,
    projects: HashMap<String, ProjectId>,
    outlines: HashMap<String, OutlineId>,
    items: HashMap<String, ItemId>,
}

impl Migrator {
    fn new(now: OffsetDateTime) -> Self {
        Self {
            state: State::new(),
            events: Vec::new(),
            report: MigrateReport::default(),
            now,
            last_ts: OffsetDateTime::UNIX_EPOCH,
            actors: HashMap::new(),
            fallback_actor: None,
            projects: HashMap::new(),
            outlines: HashMap::new(),
            items: HashMap::new(),
        }
    }

    fn run(&mut self, db: &LegacyDb) -> Result<(), StoreError> {
        self.actors(db)?;
        self.projects(db)?;
        self.outlines(db)?;
        self.tasks(db)?;
        self.deps(db)?;
        self.comments(db)?;
        Ok(())
    }

    /// Apply strictly; a refused event is counted and dropped.
    fn emit(
        &mut self,
        ts: Option<&str>,
        actor: &ActorId,
        ty: EventType,
        entity_id: &str,
        payload: impl Serialize,
    ) -> Result<bool, StoreError> {
        let payload = serde_json::to_value(payload).map_err(|source| StoreError::Encode {
            what: "event payload",
            source,
        })?;
        // Timestamps never run backwards in the synthesized log.
        let ts = parse_ts(ts).unwrap_or(self.now).max(self.last_ts);
        let event = Event {
            id: self.state.next_id::<EventId>(),
            ts,
            actor_id: actor.clone(),
            kind: ty.as_str().to_string(),
            entity_id: entity_id.to_string(),
            payload,
        };
        match apply_event(&mut self.state, &event, ApplyMode::Strict) {
            Ok(_) => {
                self.last_ts = ts;
                self.events.push(event);
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(event_type = %ty.as_str(), entity = entity_id, "legacy row skipped: {err}");
                self.report.skipped += 1;
                Ok(false)
            }
        }
    }

    fn actor_or_fallback(&mut self, legacy: Option<&str>) -> Result<ActorId, StoreError> {
        if let Some(id) = legacy.and_then(|raw| self.actors.get(raw)) {
            return Ok(id.clone());
        }
        if let Some(id) = &self.fallback_actor {
            return Ok(id.clone());
        }
        let id = self.state.next_id::<ActorId>();
        self.emit(
            None,
            &id,
            EventType::IdentityCreate,
            id.as_str(),
            IdentityCreatePayload {
                kind: ActorKind::Human,
                name: unique_name(&self.state, "legacy"),
                user_id: None,
            },
        )?;
        self.report.actors += 1;
        self.fallback_actor = Some(id.clone());
        Ok(id)
    }

    fn actors(&mut self, db: &LegacyDb) -> Result<(), StoreError> {
        let kind_of = |row: &Row8| {
            cell(row, 1)
                .and_then(|k| k.parse::<ActorKind>().ok())
                .unwrap_or(ActorKind::Human)
        };
        // Humans first so agents can point at them.
        let mut rows: Vec<&Row8> = db.actors.iter().collect();
        rows.sort_by_key(|row| kind_of(row) == ActorKind::Agent);
        for row in rows {
            let (Some(legacy_id), Some(name)) = (cell(row, 0), cell(row, 2)) else {
                self.report.skipped += 1;
                continue;
            };
            let kind = kind_of(row);
            let user_id = match kind {
                ActorKind::Agent => Some(self.actor_or_fallback(cell(row, 3))?),
                ActorKind::Human => None,
            };
            let id = self.state.next_id::<ActorId>();
            let payload = IdentityCreatePayload {
                kind,
                name: unique_name(&self.state, name),
                user_id,
            };
            if self.emit(None, &id, EventType::IdentityCreate, id.as_str(), payload)? {
                self.actors.insert(legacy_id.to_string(), id);
                self.report.actors += 1;
            }
        }
        Ok(())
    }

    fn projects(&mut self, db: &LegacyDb) -> Result<(), StoreError> {
        for row in &db.projects {
            let (Some(legacy_id), Some(name)) = (cell(row, 0), cell(row, 1)) else {
                self.report.skipped += 1;
                continue;
            };
            let actor = self.actor_or_fallback(cell(row, 2))?;
            let id = self.state.next_id::<ProjectId>();
            let payload = ProjectCreatePayload {
                name: name.to_string(),
            };
            if !self.emit(cell(row, 3), &actor, EventType::ProjectCreate, id.as_str(), payload)? {
                continue;
            }
            self.report.projects += 1;
            if flag(row, 4) {
                self.emit(None, &actor, EventType::ProjectArchive, id.as_str(), ArchivePayload { archived: true })?;
            }
            self.projects.insert(legacy_id.to_string(), id);
        }
        Ok(())
    }

    fn outlines(&mut self, db: &LegacyDb) -> Result<(), StoreError> {
        let mut statuses: BTreeMap<&str, Vec<OutlineStatusDef>> = BTreeMap::new();
        for row in &db.statuses {
            let (Some(outline), Some(raw_id)) = (cell(row, 0), cell(row, 1)) else {
                continue;
            };
            let defs = statuses.entry(outline).or_default();
            let label = cell(row, 2).unwrap_or(raw_id);
            let mut def = OutlineStatusDef::new(raw_id, label, flag(row, 3));
            def.require_note = flag(row, 4);
            if !defs.iter().any(|d| d.id == def.id) {
                defs.push(def);
            }
        }
        for row in &db.outlines {
            let Some(legacy_id) = cell(row, 0) else {
                self.report.skipped += 1;
                continue;
            };
            let Some(project_id) = cell(row, 1).and_then(|p| self.projects.get(p)).cloned() else {
                self.report.skipped += 1;
                continue;
            };
            let actor = self.actor_or_fallback(cell(row, 3))?;
            let id = self.state.next_id::<OutlineId>();
            let status_defs = statuses
                .get(legacy_id)
                .filter(|defs| !defs.is_empty())
                .cloned()
                .unwrap_or_else(OutlineStatusDef::defaults);
            let payload = OutlineCreatePayload {
                project_id,
                name: cell(row, 2).map(str::to_string),
                status_defs,
            };
            if self.emit(cell(row, 4), &actor, EventType::OutlineCreate, id.as_str(), payload)? {
                self.outlines.insert(legacy_id.to_string(), id);
                self.report.outlines += 1;
            }
        }
        Ok(())
    }

    fn tasks(&mut self, db: &LegacyDb) -> Result<(), StoreError> {
        let mut tags: HashMap<&str, Vec<String>> = HashMap::new();
        for row in &db.tags {
            if let (Some(task), Some(tag)) = (cell(row, 0), cell(row, 1))
                && let Ok(tag) = normalize_tag(tag)
            {
                tags.entry(task).or_default().push(tag);
            }
        }

        // Ranks follow the integer order within each sibling group.
        let mut groups: BTreeMap<(Option<&str>, Option<&str>), Vec<&Row8>> = BTreeMap::new();
        for row in &db.tasks {
            groups.entry((cell(row, 1), cell(row, 2))).or_default().push(row);
        }
        let mut ranks: HashMap<&str, String> = HashMap::new();
        for rows in groups.values_mut() {
            rows.sort_by_key(|row| {
                (
                    cell(row, 15).and_then(|o| o.parse::<i64>().ok()).unwrap_or(i64::MAX),
                    cell(row, 0).map(str::to_string),
                )
            });
            for (row, rank) in rows.iter().zip(rank::spread(rows.len())) {
                if let Some(id) = cell(row, 0) {
                    ranks.insert(id, rank);
                }
            }
        }

        // Parents before children; whatever never becomes ready is orphaned.
        let mut pending: Vec<&Row8> = db.tasks.iter().collect();
        loop {
            let before = pending.len();
            let mut waiting = Vec::new();
            for row in pending {
                let parent_ready = cell(row, 2).is_none_or(|p| self.items.contains_key(p));
                let parent_known = cell(row, 2)
                    .is_none_or(|p| db.tasks.iter().any(|t| cell(t, 0) == Some(p)));
                if parent_ready || !parent_known {
                    self.task(row, &ranks, &tags)?;
                } else {
                    waiting.push(row);
                }
            }
            if waiting.is_empty() {
                break;
            }
            if waiting.len() == before {
                self.report.skipped += waiting.len();
                tracing::warn!(count = waiting.len(), "legacy tasks with cyclic parents skipped");
                break;
            }
            pending = waiting;
        }
        Ok(())
    }

    fn task(
        &mut self,
        row: &Row8,
        ranks: &HashMap<&str, String>,
        tags: &HashMap<&str, Vec<String>>,
    ) -> Result<(), StoreError> {
        let (Some(legacy_id), Some(title)) = (cell(row, 0), cell(row, 3)) else {
            self.report.skipped += 1;
            return Ok(());
        };
        let Some(outline_id) = cell(row, 1).and_then(|o| self.outlines.get(o)).cloned() else {
            self.report.skipped += 1;
            return Ok(());
        };
        let Some(outline) = self.state.outline(&outline_id).cloned() else {
            self.report.skipped += 1;
            return Ok(());
        };
        let creator = self.actor_or_fallback(cell(row, 12).or(cell(row, 10)))?;
        let owner = match cell(row, 10) {
            Some(raw) => self.actor_or_fallback(Some(raw))?,
            None => creator.clone(),
        };
        let assigned = cell(row, 11).and_then(|raw| self.actors.get(raw)).cloned();
        let status_id = match cell(row, 5) {
            Some(raw) => outline
                .resolve_status(raw)
                .or_else(|| outline.status(&StatusId::slug_from_label(raw)))
                .or_else(|| outline.first_status())
                .map(|s| s.id.clone()),
            None => None,
        };
        let parent_id = cell(row, 2).and_then(|p| self.items.get(p)).cloned();
        let id = self.state.next_id::<ItemId>();
        let payload = ItemCreatePayload {
            project_id: outline.project_id.clone(),
            outline_id,
            parent_id,
            rank: ranks
                .get(legacy_id)
                .cloned()
                .unwrap_or_else(|| rank::INITIAL.to_string()),
            title: title.to_string(),
            description: cell(row, 4).unwrap_or_default().to_string(),
            status_id,
            priority: cell(row, 6)
                .and_then(|p| p.parse::<i64>().ok())
                .and_then(|p| Priority::new(p).ok())
                .unwrap_or_default(),
            on_hold: flag(row, 7),
            due: legacy_date(cell(row, 8)),
            schedule: legacy_date(cell(row, 9)),
            tags: tags.get(legacy_id).cloned().unwrap_or_default(),
            owner_actor_id: owner,
            assigned_actor_id: assigned,
        };
        if !self.emit(cell(row, 13), &creator, EventType::ItemCreate, id.as_str(), payload)? {
            return Ok(());
        }
        self.report.items += 1;
        if flag(row, 14) {
            self.emit(None, &creator, EventType::ItemArchive, id.as_str(), ArchivePayload { archived: true })?;
        }
        self.items.insert(legacy_id.to_string(), id);
        Ok(())
    }

    fn deps(&mut self, db: &LegacyDb) -> Result<(), StoreError> {
        for row in &db.deps {
            let from = cell(row, 0).and_then(|f| self.items.get(f)).cloned();
            let to = cell(row, 1).and_then(|t| self.items.get(t)).cloned();
            let (Some(from), Some(to)) = (from, to) else {
                self.report.skipped += 1;
                continue;
            };
            let dep_type = cell(row, 2)
                .and_then(|t| t.parse::<DepType>().ok())
                .unwrap_or(DepType::Blocks);
            if self.state.find_dep(&from, &to, dep_type).is_some() {
                continue;
            }
            let actor = match self.state.item(&from) {
                Some(item) => item.owner_actor_id.clone(),
                None => self.actor_or_fallback(None)?,
            };
            let id = self.state.next_id::<DepId>();
            let payload = DepAddPayload {
                from_item_id: from,
                to_item_id: to,
                dep_type,
            };
            if self.emit(None, &actor, EventType::DepAdd, id.as_str(), payload)? {
                self.report.deps += 1;
            }
        }
        Ok(())
    }

    fn comments(&mut self, db: &LegacyDb) -> Result<(), StoreError> {
        for row in &db.comments {
            let item = cell(row, 1).and_then(|t| self.items.get(t)).cloned();
            let (Some(item_id), Some(body)) = (item, cell(row, 3)) else {
                self.report.skipped += 1;
                continue;
            };
            let author = self.actor_or_fallback(cell(row, 2))?;
            let id = self.state.next_id::<CommentId>();
            let payload = CommentAddPayload {
                item_id,
                reply_to_comment_id: None,
                body: body.to_string(),
            };
            if self.emit(cell(row, 4), &author, EventType::CommentAdd, id.as_str(), payload)? {
                self.report.comments += 1;
            }
        }
        Ok(())
    }
}

fn unique_name(state: &State, base: &str) -> String {
    let taken = |name: &str| state.actors.values().any(|a| a.name == name);
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base} ({n})"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// RFC 3339 or SQLite's `YYYY-MM-DD HH:MM:SS` (taken as UTC).
fn parse_ts(raw: Option<&str>) -> Option<OffsetDateTime> {
    let raw = raw?;
    OffsetDateTime::parse(raw, &Rfc3339).ok().or_else(|| {
        time::PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
            .ok()
            .map(|dt| dt.assume_utc())
    })
}

/// Full date-time strings keep only their calendar date.
fn legacy_date(raw: Option<&str>) -> Option<DateTime> {
    let raw = raw?;
    DateTime::parse(raw)
        .ok()
        .or_else(|| raw.get(..10).and_then(|d| DateTime::parse(d).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE actors(id INTEGER, kind TEXT, name TEXT, user_id INTEGER);
             CREATE TABLE projects(id INTEGER, name TEXT, created_by INTEGER, created_at TEXT, archived INTEGER);
             CREATE TABLE outlines(id INTEGER, project_id INTEGER, name TEXT, created_by INTEGER, created_at TEXT);
             CREATE TABLE tasks(id INTEGER, outline_id INTEGER, parent_id INTEGER, title TEXT,
                 description TEXT, status_id TEXT, priority INTEGER, on_hold INTEGER, due_at TEXT,
                 schedule_at TEXT, owner_id INTEGER, assigned_id INTEGER, created_by INTEGER,
                 created_at TEXT, archived INTEGER, sort_order INTEGER);
             CREATE TABLE task_tags(task_id INTEGER, tag TEXT);
             CREATE TABLE dependencies(from_task_id INTEGER, to_task_id INTEGER, type TEXT);
             CREATE TABLE comments(id INTEGER, task_id INTEGER, author_id INTEGER, body TEXT, created_at TEXT);
             INSERT INTO actors VALUES (1, 'human', 'Ada', NULL), (2, 'agent', 's1 bot', 1);
             INSERT INTO projects VALUES (1, 'Alpha', 1, '2024-01-01 09:00:00', 0);
             INSERT INTO outlines VALUES (1, 1, NULL, 1, '2024-01-01 09:00:00');
             INSERT INTO tasks VALUES
                 (10, 1, NULL, 'second', '', 'DONE', 1, 0, '2024-02-01T00:00:00Z', NULL, 1, NULL, 1, '2024-01-02 10:00:00', 0, 2),
                 (11, 1, NULL, 'first', 'd', 'todo', 2, 1, NULL, NULL, 1, 2, 1, '2024-01-02 10:00:00', 0, 1),
                 (12, 1, 11, 'child', '', NULL, 9, 0, NULL, NULL, 1, NULL, 1, NULL, 1, 0);
             INSERT INTO task_tags VALUES (11, '#infra'), (11, 'ops');
             INSERT INTO dependencies VALUES (10, 11, 'blocks'), (10, 99, 'blocks');
             INSERT INTO comments VALUES (1, 11, 2, 'started', '2024-01-03 08:00:00');",
        )
        .unwrap();
    }

    #[test]
    fn migrates_a_legacy_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("legacy.sqlite");
        legacy_db(&db);
        let root = dir.path().join("ws");
        let report = migrate(&db, &root, OffsetDateTime::UNIX_EPOCH, false).unwrap();
        assert_eq!(report.actors, 2);
        assert_eq!(report.projects, 1);
        assert_eq!(report.items, 3);
        assert_eq!(report.deps, 1);
        assert_eq!(report.comments, 1);
        assert_eq!(report.skipped, 1);

        let state = Store::open_existing(&root).unwrap().load().unwrap();
        let by_title = |t: &str| state.items.values().find(|i| i.title == t).unwrap();
        let (first, second, child) = (by_title("first"), by_title("second"), by_title("child"));
        assert!(first.rank < second.rank);
        assert_eq!(child.parent_id.as_ref(), Some(&first.id));
        assert!(child.archived);
        assert_eq!(first.tags, vec!["infra".to_string(), "ops".to_string()]);
        assert!(first.on_hold);
        assert_eq!(second.status_id.as_ref().map(StatusId::as_str), Some("done"));
        assert_eq!(second.due.as_ref().map(|d| d.date.as_str()), Some("2024-02-01"));
        assert_eq!(child.priority, Priority::default());
        let agent = state.actors.values().find(|a| a.name == "s1 bot").unwrap();
        assert_eq!(first.assigned_actor_id.as_ref(), Some(&agent.id));
    }

    #[test]
    fn refuses_a_populated_target() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("legacy.sqlite");
        legacy_db(&db);
        let root = dir.path().join("ws");
        migrate(&db, &root, OffsetDateTime::UNIX_EPOCH, false).unwrap();
        assert!(matches!(
            migrate(&db, &root, OffsetDateTime::UNIX_EPOCH, false),
            Err(WorkspaceError::NotEmpty(_))
        ));
    }
}
