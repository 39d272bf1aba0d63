//! Event application.
//!
//! Commands apply their freshly minted event in [`ApplyMode::Strict`]; replay
//! uses [`ApplyMode::Lenient`], where rule checks that would refuse the event
//! are logged and the event is applied anyway. Events that cannot be applied
//! at all (missing target, unreadable payload) fail in both modes.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use thiserror::Error;

use super::domain::{EntityKind, normalize_tag};
use super::error::CoreError;
use super::event::*;
use super::identity::{
    ActorId, AttachmentId, CommentId, DepId, ItemId, OutlineId, ProjectId, StatusId, WorklogId,
};
use super::model::{
    Actor, Attachment, Comment, Dependency, Item, Outline, OutlineStatusDef, Project, WorklogEntry,
};
use super::state::State;
use super::status::completion_blockers;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyMode {
    Strict,
    Lenient,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApplyError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Gate(String),

    #[error("malformed {event_type} payload: {source}")]
    Payload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApplyError {
    fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// What applying one event did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Unknown type or an idempotent duplicate create; nothing changed.
    pub skipped: bool,
    /// Rule checks overridden in lenient mode.
    pub overridden: Vec<String>,
}

struct Cx<'e> {
    mode: ApplyMode,
    event: &'e Event,
    skipped: bool,
    overridden: Vec<String>,
}

impl Cx<'_> {
    fn payload<T: DeserializeOwned>(&self) -> Result<T, ApplyError> {
        serde_json::from_value(self.event.payload.clone()).map_err(|source| ApplyError::Payload {
            event_type: self.event.kind.clone(),
            source,
        })
    }

    /// A rule check: fatal when strict, logged and ignored when lenient.
    fn check(&mut self, result: Result<(), ApplyError>) -> Result<(), ApplyError> {
        match (result, self.mode) {
            (Err(err), ApplyMode::Lenient) => {
                tracing::warn!(
                    event_id = %self.event.id,
                    event_type = %self.event.kind,
                    "replay override: {err}"
                );
                self.overridden.push(err.to_string());
                Ok(())
            }
            (result, _) => result,
        }
    }

    /// Re-creating an existing id: refused when strict, a no-op when lenient.
    fn duplicate(&mut self, kind: &'static str, id: &str) -> Result<(), ApplyError> {
        match self.mode {
            ApplyMode::Strict => Err(ApplyError::Conflict(format!("{kind} {id} already exists"))),
            ApplyMode::Lenient => {
                tracing::debug!(event_id = %self.event.id, "duplicate {kind} create {id} ignored");
                self.skipped = true;
                Ok(())
            }
        }
    }

    fn entity<T>(&self, parse: fn(&str) -> Result<T, CoreError>) -> Result<T, ApplyError> {
        parse(&self.event.entity_id).map_err(|e| ApplyError::Invalid(e.to_string()))
    }
}

fn ensure(cond: bool, err: impl FnOnce() -> ApplyError) -> Result<(), ApplyError> {
    if cond { Ok(()) } else { Err(err()) }
}

pub fn apply_event(
    state: &mut State,
    event: &Event,
    mode: ApplyMode,
) -> Result<ApplyOutcome, ApplyError> {
    let ty = event.event_type();
    let mut cx = Cx {
        mode,
        event,
        skipped: false,
        overridden: Vec::new(),
    };
    match ty {
        EventType::IdentityCreate => identity_create(state, &mut cx)?,
        EventType::IdentityUse => {
            let id = cx.entity(ActorId::parse)?;
            ensure(state.actors.contains_key(&id), || ApplyError::not_found("actor", &id))?;
            state.current_actor_id = Some(id);
        }
        EventType::ProjectCreate => project_create(state, &mut cx)?,
        EventType::ProjectUpdate => {
            let p: ProjectUpdatePayload = cx.payload()?;
            let project = project_mut(state, &cx.entity(ProjectId::parse)?)?;
            if let Some(name) = p.name {
                project.name = name;
            }
        }
        EventType::ProjectArchive => {
            let p: ArchivePayload = cx.payload()?;
            project_mut(state, &cx.entity(ProjectId::parse)?)?.archived = p.archived;
        }
        EventType::OutlineCreate => outline_create(state, &mut cx)?,
        EventType::OutlineArchive => {
            let p: ArchivePayload = cx.payload()?;
            outline_mut(state, &cx.entity(OutlineId::parse)?)?.archived = p.archived;
        }
        EventType::OutlineStatusAdd => status_add(state, &mut cx)?,
        EventType::OutlineStatusUpdate => status_update(state, &mut cx)?,
        EventType::OutlineStatusRemove => status_remove(state, &mut cx)?,
        EventType::OutlineStatusReorder => status_reorder(state, &mut cx)?,
        EventType::ItemCreate => item_create(state, &mut cx)?,
        EventType::ItemSetTitle => {
            let p: SetTitlePayload = cx.payload()?;
            cx.check(ensure(!p.title.trim().is_empty(), || {
                ApplyError::Invalid("title must not be empty".into())
            }))?;
            touch_item(state, &cx)?.title = p.title;
        }
        EventType::ItemSetDescription => {
            let p: SetDescriptionPayload = cx.payload()?;
            touch_item(state, &cx)?.description = p.description;
        }
        EventType::ItemSetStatus => item_set_status(state, &mut cx)?,
        EventType::ItemSetPriority => {
            let p: SetPriorityPayload = cx.payload()?;
            touch_item(state, &cx)?.priority = p.priority;
        }
        EventType::ItemSetOnHold => {
            let p: SetOnHoldPayload = cx.payload()?;
            touch_item(state, &cx)?.on_hold = p.on_hold;
        }
        EventType::ItemSetDue => {
            let p: SetDatePayload = cx.payload()?;
            touch_item(state, &cx)?.due = p.value;
        }
        EventType::ItemSetSchedule => {
            let p: SetDatePayload = cx.payload()?;
            touch_item(state, &cx)?.schedule = p.value;
        }
        EventType::ItemSetAssign => item_set_assign(state, &mut cx)?,
        EventType::ItemSetParent => item_set_parent(state, &mut cx)?,
        EventType::ItemMove => {
            let p: MovePayload = cx.payload()?;
            let id = cx.entity(ItemId::parse)?;
            ensure(state.items.contains_key(&id), || ApplyError::not_found("item", &id))?;
            apply_rebalance(state, &p.rebalance, cx.event);
            let item = touch_item(state, &cx)?;
            item.rank = p.rank;
        }
        EventType::ItemMoveOutline => item_move_outline(state, &mut cx)?,
        EventType::ItemTagsAdd | EventType::ItemTagsRemove | EventType::ItemTagsSet => {
            item_tags(state, &mut cx, &ty)?
        }
        EventType::ItemArchive => {
            let p: ArchivePayload = cx.payload()?;
            touch_item(state, &cx)?.archived = p.archived;
        }
        EventType::DepAdd => dep_add(state, &mut cx)?,
        EventType::DepRemove => {
            let id = cx.entity(DepId::parse)?;
            state
                .deps
                .remove(&id)
                .ok_or_else(|| ApplyError::not_found("dependency", &id))?;
        }
        EventType::CommentAdd => comment_add(state, &mut cx)?,
        EventType::WorklogAdd => worklog_add(state, &mut cx)?,
        EventType::AttachmentAdd => attachment_add(state, &mut cx)?,
        EventType::AttachmentRemove => {
            let id = cx.entity(AttachmentId::parse)?;
            state
                .attachments
                .remove(&id)
                .ok_or_else(|| ApplyError::not_found("attachment", &id))?;
        }
        EventType::Unknown(_) => cx.skipped = true,
    }
    Ok(ApplyOutcome {
        skipped: cx.skipped,
        overridden: cx.overridden,
    })
}

// =============================================================================
// Lookups
// =============================================================================

fn project_mut<'s>(state: &'s mut State, id: &ProjectId) -> Result<&'s mut Project, ApplyError> {
    state
        .projects
        .get_mut(id)
        .ok_or_else(|| ApplyError::not_found("project", id))
}

fn outline_mut<'s>(state: &'s mut State, id: &OutlineId) -> Result<&'s mut Outline, ApplyError> {
    state
        .outlines
        .get_mut(id)
        .ok_or_else(|| ApplyError::not_found("outline", id))
}

/// The event's item with `updatedAt` bumped to the event time.
fn touch_item<'s>(state: &'s mut State, cx: &Cx<'_>) -> Result<&'s mut Item, ApplyError> {
    let id = cx.entity(ItemId::parse)?;
    let item = state
        .items
        .get_mut(&id)
        .ok_or_else(|| ApplyError::not_found("item", &id))?;
    item.updated_at = cx.event.ts;
    Ok(item)
}

fn apply_rebalance(
    state: &mut State,
    rebalance: &std::collections::BTreeMap<ItemId, String>,
    event: &Event,
) {
    for (id, rank) in rebalance {
        if let Some(sibling) = state.items.get_mut(id) {
            sibling.rank = rank.clone();
            sibling.updated_at = event.ts;
        }
    }
}

fn validate_status_defs(defs: &[OutlineStatusDef]) -> Result<(), ApplyError> {
    ensure(!defs.is_empty(), || {
        ApplyError::Invalid("an outline needs at least one status".into())
    })?;
    let mut ids = BTreeSet::new();
    let mut labels = BTreeSet::new();
    for def in defs {
        ensure(!def.label.trim().is_empty(), || {
            ApplyError::Invalid("status label must not be empty".into())
        })?;
        ensure(ids.insert(def.id.clone()), || {
            ApplyError::Invalid(format!("duplicate status id {}", def.id))
        })?;
        ensure(labels.insert(def.label.to_lowercase()), || {
            ApplyError::Invalid(format!("duplicate status label {}", def.label))
        })?;
    }
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

fn identity_create(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let id = cx.entity(ActorId::parse)?;
    if state.actors.contains_key(&id) {
        return cx.duplicate("actor", id.as_str());
    }
    let p: IdentityCreatePayload = cx.payload()?;
    cx.check(ensure(!p.name.trim().is_empty(), || {
        ApplyError::Invalid("actor name must not be empty".into())
    }))?;
    let actor = Actor {
        id: id.clone(),
        kind: p.kind,
        name: p.name,
        user_id: p.user_id,
    };
    if !actor.is_human() {
        let owner_ok = actor
            .user_id
            .as_ref()
            .and_then(|u| state.actors.get(u))
            .is_some_and(Actor::is_human);
        cx.check(ensure(owner_ok, || {
            ApplyError::Invalid(format!("agent {id} needs a userId naming an existing human"))
        }))?;
    }
    state.actors.insert(id, actor);
    Ok(())
}

fn project_create(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let id = cx.entity(ProjectId::parse)?;
    if state.projects.contains_key(&id) {
        return cx.duplicate("project", id.as_str());
    }
    let p: ProjectCreatePayload = cx.payload()?;
    cx.check(ensure(!p.name.trim().is_empty(), || {
        ApplyError::Invalid("project name must not be empty".into())
    }))?;
    state.projects.insert(
        id.clone(),
        Project {
            id,
            name: p.name,
            created_by: cx.event.actor_id.clone(),
            created_at: cx.event.ts,
            archived: false,
        },
    );
    Ok(())
}

fn outline_create(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let id = cx.entity(OutlineId::parse)?;
    if state.outlines.contains_key(&id) {
        return cx.duplicate("outline", id.as_str());
    }
    let p: OutlineCreatePayload = cx.payload()?;
    ensure(state.projects.contains_key(&p.project_id), || {
        ApplyError::not_found("project", &p.project_id)
    })?;
    cx.check(validate_status_defs(&p.status_defs))?;
    state.outlines.insert(
        id.clone(),
        Outline {
            id,
            project_id: p.project_id,
            name: p.name,
            status_defs: p.status_defs,
            created_by: cx.event.actor_id.clone(),
            created_at: cx.event.ts,
            archived: false,
        },
    );
    Ok(())
}

fn status_add(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let p: StatusAddPayload = cx.payload()?;
    let outline_id = cx.entity(OutlineId::parse)?;
    let outline = outline_mut(state, &outline_id)?;
    if outline.status(&p.status_def.id).is_some() {
        return cx.duplicate("status", p.status_def.id.as_str());
    }
    let mut candidate = outline.status_defs.clone();
    let position = p.position.unwrap_or(candidate.len()).min(candidate.len());
    candidate.insert(position, p.status_def);
    cx.check(validate_status_defs(&candidate))?;
    outline.status_defs = candidate;
    Ok(())
}

fn status_update(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let p: StatusUpdatePayload = cx.payload()?;
    let outline_id = cx.entity(OutlineId::parse)?;
    let outline = outline_mut(state, &outline_id)?;
    let mut candidate = outline.status_defs.clone();
    let def = candidate
        .iter_mut()
        .find(|d| d.id == p.status_id)
        .ok_or_else(|| ApplyError::not_found("status", &p.status_id))?;
    if let Some(label) = p.label {
        def.label = label;
    }
    if let Some(end) = p.is_end_state {
        def.is_end_state = end;
    }
    if let Some(require_note) = p.require_note {
        def.require_note = require_note;
    }
    cx.check(validate_status_defs(&candidate))?;
    outline.status_defs = candidate;
    Ok(())
}

fn status_remove(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let p: StatusRemovePayload = cx.payload()?;
    let outline_id = cx.entity(OutlineId::parse)?;
    let in_use = state
        .items
        .values()
        .filter(|i| i.outline_id == outline_id && i.status_id.as_ref() == Some(&p.status_id))
        .count();
    let outline = state
        .outlines
        .get(&outline_id)
        .ok_or_else(|| ApplyError::not_found("outline", &outline_id))?;
    ensure(outline.status(&p.status_id).is_some(), || {
        ApplyError::not_found("status", &p.status_id)
    })?;
    let remaining = outline.status_defs.len() - 1;
    cx.check(ensure(in_use == 0, || {
        ApplyError::Conflict(format!("status {} is in use by {in_use} item(s)", p.status_id))
    }))?;
    cx.check(ensure(remaining > 0, || {
        ApplyError::Invalid("cannot remove the last status of an outline".into())
    }))?;
    outline_mut(state, &outline_id)?
        .status_defs
        .retain(|d| d.id != p.status_id);
    Ok(())
}

fn status_reorder(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let p: StatusReorderPayload = cx.payload()?;
    let outline_id = cx.entity(OutlineId::parse)?;
    let outline = outline_mut(state, &outline_id)?;
    let current: BTreeSet<&StatusId> = outline.status_defs.iter().map(|d| &d.id).collect();
    let requested: BTreeSet<&StatusId> = p.order.iter().collect();
    let exact = current == requested && requested.len() == p.order.len();
    cx.check(ensure(exact, || {
        ApplyError::Conflict("reorder must list every status exactly once".into())
    }))?;
    let mut reordered: Vec<OutlineStatusDef> = Vec::with_capacity(outline.status_defs.len());
    for id in &p.order {
        if let Some(def) = outline.status(id)
            && !reordered.iter().any(|d| &d.id == id)
        {
            reordered.push(def.clone());
        }
    }
    for def in &outline.status_defs {
        if !reordered.iter().any(|d| d.id == def.id) {
            reordered.push(def.clone());
        }
    }
    outline.status_defs = reordered;
    Ok(())
}

fn item_create(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let id = cx.entity(ItemId::parse)?;
    if state.items.contains_key(&id) {
        return cx.duplicate("item", id.as_str());
    }
    let p: ItemCreatePayload = cx.payload()?;
    let outline = state
        .outlines
        .get(&p.outline_id)
        .ok_or_else(|| ApplyError::not_found("outline", &p.outline_id))?;
    ensure(state.projects.contains_key(&p.project_id), || {
        ApplyError::not_found("project", &p.project_id)
    })?;
    let same_project = outline.project_id == p.project_id;
    let status_ok = p
        .status_id
        .as_ref()
        .is_none_or(|s| outline.status(s).is_some());
    cx.check(ensure(!p.title.trim().is_empty(), || {
        ApplyError::Invalid("title must not be empty".into())
    }))?;
    cx.check(ensure(same_project, || {
        ApplyError::Invalid(format!(
            "outline {} does not belong to project {}",
            p.outline_id, p.project_id
        ))
    }))?;
    cx.check(ensure(status_ok, || {
        ApplyError::Invalid(format!("status is not defined by outline {}", p.outline_id))
    }))?;
    if let Some(parent_id) = &p.parent_id {
        let parent_ok = state
            .items
            .get(parent_id)
            .is_some_and(|parent| parent.outline_id == p.outline_id);
        cx.check(ensure(parent_ok, || {
            ApplyError::Invalid(format!("parent {parent_id} is not an item of outline {}", p.outline_id))
        }))?;
    }
    cx.check(ensure(state.actors.contains_key(&p.owner_actor_id), || {
        ApplyError::not_found("actor", &p.owner_actor_id)
    }))?;
    let mut tags: Vec<String> = Vec::with_capacity(p.tags.len());
    for tag in p.tags {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    state.items.insert(
        id.clone(),
        Item {
            id,
            project_id: p.project_id,
            outline_id: p.outline_id,
            parent_id: p.parent_id,
            rank: p.rank,
            title: p.title,
            description: p.description,
            status_id: p.status_id,
            priority: p.priority,
            on_hold: p.on_hold,
            due: p.due,
            schedule: p.schedule,
            tags,
            archived: false,
            owner_actor_id: p.owner_actor_id,
            assigned_actor_id: p.assigned_actor_id,
            owner_delegated_from: None,
            owner_delegated_at: None,
            created_by: cx.event.actor_id.clone(),
            created_at: cx.event.ts,
            updated_at: cx.event.ts,
        },
    );
    Ok(())
}

fn item_set_status(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let p: SetStatusPayload = cx.payload()?;
    let id = cx.entity(ItemId::parse)?;
    let item = state
        .items
        .get(&id)
        .ok_or_else(|| ApplyError::not_found("item", &id))?;
    if let Some(status_id) = &p.status_id {
        let def = state
            .outline(&item.outline_id)
            .and_then(|o| o.status(status_id))
            .cloned();
        match def {
            None => cx.check(Err(ApplyError::Invalid(format!(
                "status {status_id} is not defined by outline {}",
                item.outline_id
            ))))?,
            Some(def) => {
                if def.require_note {
                    let has_note = p.note.as_deref().is_some_and(|n| !n.trim().is_empty());
                    cx.check(ensure(has_note, || {
                        ApplyError::Gate(format!("status {} requires a note", def.label))
                    }))?;
                }
                if def.is_end_state {
                    let blockers = completion_blockers(state, &id);
                    if let Some(message) = blockers.message(&id) {
                        cx.check(Err(ApplyError::Gate(message)))?;
                    }
                }
            }
        }
    }
    touch_item(state, cx)?.status_id = p.status_id;
    Ok(())
}

fn item_set_assign(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let p: SetAssignPayload = cx.payload()?;
    if let Some(assignee) = &p.assigned_actor_id {
        cx.check(ensure(state.actors.contains_key(assignee), || {
            ApplyError::not_found("actor", assignee)
        }))?;
    }
    cx.check(ensure(state.actors.contains_key(&p.owner_actor_id), || {
        ApplyError::not_found("actor", &p.owner_actor_id)
    }))?;
    let item = touch_item(state, cx)?;
    item.assigned_actor_id = p.assigned_actor_id;
    item.owner_actor_id = p.owner_actor_id;
    item.owner_delegated_from = p.owner_delegated_from;
    item.owner_delegated_at = p.owner_delegated_at;
    Ok(())
}

fn item_set_parent(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let p: SetParentPayload = cx.payload()?;
    let id = cx.entity(ItemId::parse)?;
    let item = state
        .items
        .get(&id)
        .ok_or_else(|| ApplyError::not_found("item", &id))?;
    if let Some(parent_id) = &p.parent_id {
        let parent = state
            .items
            .get(parent_id)
            .ok_or_else(|| ApplyError::not_found("item", parent_id))?;
        let same_outline = parent.outline_id == item.outline_id;
        cx.check(ensure(same_outline, || {
            ApplyError::Invalid(format!("parent {parent_id} lives in a different outline"))
        }))?;
        // A cycle would corrupt every tree walk, so it is refused even in replay.
        ensure(!state.is_self_or_ancestor(&id, parent_id), || {
            ApplyError::Conflict(format!("making {parent_id} the parent of {id} creates a cycle"))
        })?;
    }
    apply_rebalance(state, &p.rebalance, cx.event);
    let item = touch_item(state, cx)?;
    item.parent_id = p.parent_id;
    item.rank = p.rank;
    Ok(())
}

fn item_move_outline(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let p: MoveOutlinePayload = cx.payload()?;
    let id = cx.entity(ItemId::parse)?;
    let item = state
        .items
        .get(&id)
        .ok_or_else(|| ApplyError::not_found("item", &id))?;
    let target = state
        .outlines
        .get(&p.outline_id)
        .ok_or_else(|| ApplyError::not_found("outline", &p.outline_id))?;
    let same_project = target.project_id == item.project_id;
    let undefined: Vec<StatusId> = p
        .statuses
        .values()
        .flatten()
        .filter(|s| target.status(s).is_none())
        .cloned()
        .collect();
    cx.check(ensure(same_project, || {
        ApplyError::Invalid(format!(
            "outline {} belongs to a different project",
            p.outline_id
        ))
    }))?;
    cx.check(ensure(undefined.is_empty(), || {
        ApplyError::Invalid(format!(
            "statuses {undefined:?} are not defined by outline {}",
            p.outline_id
        ))
    }))?;
    let mut moved = vec![id.clone()];
    moved.extend(state.descendants(&id));
    let ts = cx.event.ts;
    for moved_id in &moved {
        if let Some(entry) = state.items.get_mut(moved_id) {
            entry.outline_id = p.outline_id.clone();
            if let Some(status) = p.statuses.get(moved_id) {
                entry.status_id = status.clone();
            }
            entry.updated_at = ts;
        }
    }
    let item = touch_item(state, cx)?;
    item.parent_id = None;
    item.rank = p.rank;
    Ok(())
}

fn item_tags(state: &mut State, cx: &mut Cx<'_>, ty: &EventType) -> Result<(), ApplyError> {
    let p: TagsPayload = cx.payload()?;
    let mut tags = Vec::with_capacity(p.tags.len());
    for raw in &p.tags {
        match normalize_tag(raw) {
            Ok(tag) => tags.push(tag),
            Err(err) => cx.check(Err(ApplyError::Invalid(err.to_string())))?,
        }
    }
    let item = touch_item(state, cx)?;
    match ty {
        EventType::ItemTagsAdd => {
            for tag in tags {
                if !item.tags.contains(&tag) {
                    item.tags.push(tag);
                }
            }
        }
        EventType::ItemTagsRemove => item.tags.retain(|t| !tags.contains(t)),
        _ => {
            item.tags.clear();
            for tag in tags {
                if !item.tags.contains(&tag) {
                    item.tags.push(tag);
                }
            }
        }
    }
    Ok(())
}

fn dep_add(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let id = cx.entity(DepId::parse)?;
    if state.deps.contains_key(&id) {
        return cx.duplicate("dependency", id.as_str());
    }
    let p: DepAddPayload = cx.payload()?;
    for end in [&p.from_item_id, &p.to_item_id] {
        ensure(state.items.contains_key(end), || ApplyError::not_found("item", end))?;
    }
    cx.check(ensure(p.from_item_id != p.to_item_id, || {
        ApplyError::Invalid("an item cannot depend on itself".into())
    }))?;
    if state
        .find_dep(&p.from_item_id, &p.to_item_id, p.dep_type)
        .is_some()
    {
        let edge = format!("{} {} {}", p.from_item_id, p.dep_type, p.to_item_id);
        return cx.duplicate("dependency", &edge);
    }
    state.deps.insert(
        id.clone(),
        Dependency {
            id,
            from_item_id: p.from_item_id,
            to_item_id: p.to_item_id,
            dep_type: p.dep_type,
            created_by: cx.event.actor_id.clone(),
            created_at: cx.event.ts,
        },
    );
    Ok(())
}

fn comment_add(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let id = cx.entity(CommentId::parse)?;
    if state.comments.contains_key(&id) {
        return cx.duplicate("comment", id.as_str());
    }
    let p: CommentAddPayload = cx.payload()?;
    ensure(state.items.contains_key(&p.item_id), || {
        ApplyError::not_found("item", &p.item_id)
    })?;
    cx.check(ensure(!p.body.trim().is_empty(), || {
        ApplyError::Invalid("comment body must not be empty".into())
    }))?;
    if let Some(reply_to) = &p.reply_to_comment_id {
        let ok = state
            .comments
            .get(reply_to)
            .is_some_and(|c| c.item_id == p.item_id);
        cx.check(ensure(ok, || {
            ApplyError::Invalid(format!("comment {reply_to} is not on item {}", p.item_id))
        }))?;
    }
    state.comments.insert(
        id.clone(),
        Comment {
            id,
            item_id: p.item_id,
            author_id: cx.event.actor_id.clone(),
            reply_to_comment_id: p.reply_to_comment_id,
            body: p.body,
            created_at: cx.event.ts,
        },
    );
    Ok(())
}

fn worklog_add(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let id = cx.entity(WorklogId::parse)?;
    if state.worklog.contains_key(&id) {
        return cx.duplicate("worklog entry", id.as_str());
    }
    let p: WorklogAddPayload = cx.payload()?;
    ensure(state.items.contains_key(&p.item_id), || {
        ApplyError::not_found("item", &p.item_id)
    })?;
    cx.check(ensure(!p.body.trim().is_empty(), || {
        ApplyError::Invalid("worklog body must not be empty".into())
    }))?;
    state.worklog.insert(
        id.clone(),
        WorklogEntry {
            id,
            item_id: p.item_id,
            author_id: cx.event.actor_id.clone(),
            body: p.body,
            created_at: cx.event.ts,
        },
    );
    Ok(())
}

fn attachment_add(state: &mut State, cx: &mut Cx<'_>) -> Result<(), ApplyError> {
    let id = cx.entity(AttachmentId::parse)?;
    if state.attachments.contains_key(&id) {
        return cx.duplicate("attachment", id.as_str());
    }
    let p: AttachmentAddPayload = cx.payload()?;
    let exists = match p.entity_kind {
        EntityKind::Item => ItemId::parse(&p.entity_id)
            .ok()
            .is_some_and(|i| state.items.contains_key(&i)),
        EntityKind::Comment => CommentId::parse(&p.entity_id)
            .ok()
            .is_some_and(|c| state.comments.contains_key(&c)),
    };
    cx.check(ensure(exists, || {
        ApplyError::not_found(p.entity_kind.as_str(), &p.entity_id)
    }))?;
    state.attachments.insert(
        id.clone(),
        Attachment {
            id,
            entity_kind: p.entity_kind,
            entity_id: p.entity_id,
            relative_path: p.relative_path,
            title: p.title,
            alt: p.alt,
            bytes: p.bytes,
            sha256: p.sha256,
            original_name: p.original_name,
            created_by: cx.event.actor_id.clone(),
            created_at: cx.event.ts,
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EventId;
    use serde_json::json;
    use time::OffsetDateTime;

    struct Log {
        state: State,
        seq: u64,
    }

    impl Log {
        fn new() -> Self {
            Self {
                state: State::new(),
                seq: 0,
            }
        }

        fn event(&mut self, kind: &str, entity: &str, payload: serde_json::Value) -> Event {
            self.seq += 1;
            Event {
                id: EventId::from_counter(self.seq),
                ts: OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(self.seq as i64),
                actor_id: ActorId::from_counter(1),
                kind: kind.into(),
                entity_id: entity.into(),
                payload,
            }
        }

        fn strict(&mut self, kind: &str, entity: &str, payload: serde_json::Value) -> Result<ApplyOutcome, ApplyError> {
            let event = self.event(kind, entity, payload);
            apply_event(&mut self.state, &event, ApplyMode::Strict)
        }

        fn lenient(&mut self, kind: &str, entity: &str, payload: serde_json::Value) -> Result<ApplyOutcome, ApplyError> {
            let event = self.event(kind, entity, payload);
            apply_event(&mut self.state, &event, ApplyMode::Lenient)
        }

        fn seed(&mut self) {
            self.strict("identity.create", "act-1", json!({"kind": "human", "name": "Ada"})).unwrap();
            self.strict("project.create", "proj-1", json!({"name": "Alpha"})).unwrap();
            self.strict(
                "outline.create",
                "out-1",
                json!({"projectId": "proj-1", "statusDefs": serde_json::to_value(OutlineStatusDef::defaults()).unwrap()}),
            )
            .unwrap();
        }

        fn item(&mut self, n: u64, parent: Option<&str>, status: &str) {
            self.strict(
                "item.create",
                &format!("item-{n}"),
                json!({
                    "projectId": "proj-1", "outlineId": "out-1", "parentId": parent,
                    "rank": "h", "title": format!("item {n}"), "statusId": status,
                    "ownerActorId": "act-1"
                }),
            )
            .unwrap();
        }
    }

    #[test]
    fn end_state_is_gated_by_children_and_deps() {
        let mut log = Log::new();
        log.seed();
        log.item(1, None, "todo");
        log.item(2, Some("item-1"), "doing");
        log.item(3, None, "todo");
        log.strict(
            "dep.add",
            "dep-1",
            json!({"fromItemId": "item-1", "toItemId": "item-3", "type": "blocks"}),
        )
        .unwrap();

        let err = log
            .strict("item.set_status", "item-1", json!({"statusId": "done"}))
            .unwrap_err();
        assert!(matches!(err, ApplyError::Gate(_)));
        assert!(err.to_string().contains("incomplete children and incomplete dependencies"));
        assert_eq!(
            log.state.items[&ItemId::from_counter(1)].status_id.as_ref().map(StatusId::as_str),
            Some("todo")
        );

        log.strict("item.set_status", "item-2", json!({"statusId": "done"})).unwrap();
        log.strict("item.set_status", "item-3", json!({"statusId": "done"})).unwrap();
        log.strict("item.set_status", "item-1", json!({"statusId": "done"})).unwrap();
    }

    #[test]
    fn lenient_mode_records_overrides() {
        let mut log = Log::new();
        log.seed();
        log.item(1, None, "todo");
        log.item(2, Some("item-1"), "doing");
        let outcome = log
            .lenient("item.set_status", "item-1", json!({"statusId": "done"}))
            .unwrap();
        assert_eq!(outcome.overridden.len(), 1);
        assert_eq!(
            log.state.items[&ItemId::from_counter(1)].status_id.as_ref().map(StatusId::as_str),
            Some("done")
        );
    }

    #[test]
    fn duplicate_creates_are_idempotent_when_lenient() {
        let mut log = Log::new();
        log.seed();
        let again = log
            .lenient("project.create", "proj-1", json!({"name": "Other"}))
            .unwrap();
        assert!(again.skipped);
        assert_eq!(log.state.projects[&ProjectId::from_counter(1)].name, "Alpha");
        assert!(matches!(
            log.strict("project.create", "proj-1", json!({"name": "Other"})),
            Err(ApplyError::Conflict(_))
        ));
    }

    #[test]
    fn unknown_types_are_skipped() {
        let mut log = Log::new();
        let outcome = log.strict("item.teleport", "item-1", json!({})).unwrap();
        assert!(outcome.skipped);
    }

    #[test]
    fn missing_targets_fail_in_both_modes() {
        let mut log = Log::new();
        log.seed();
        assert!(matches!(
            log.lenient("item.set_title", "item-9", json!({"title": "x"})),
            Err(ApplyError::NotFound { .. })
        ));
    }

    #[test]
    fn parent_cycles_are_refused() {
        let mut log = Log::new();
        log.seed();
        log.item(1, None, "todo");
        log.item(2, Some("item-1"), "todo");
        let err = log
            .lenient("item.set_parent", "item-1", json!({"parentId": "item-2", "rank": "h"}))
            .unwrap_err();
        assert!(matches!(err, ApplyError::Conflict(_)));
    }

    #[test]
    fn status_removal_blocked_while_in_use() {
        let mut log = Log::new();
        log.seed();
        log.item(1, None, "doing");
        let err = log
            .strict("outline.status.remove", "out-1", json!({"statusId": "doing"}))
            .unwrap_err();
        assert!(matches!(err, ApplyError::Conflict(_)));
        log.strict("outline.status.remove", "out-1", json!({"statusId": "todo"})).unwrap();
        let labels: Vec<&str> = log.state.outlines[&OutlineId::from_counter(1)]
            .status_defs
            .iter()
            .map(|d| d.label.as_str())
            .collect();
        assert_eq!(labels, vec!["DOING", "DONE"]);
    }

    #[test]
    fn move_outline_carries_descendants() {
        let mut log = Log::new();
        log.seed();
        log.strict(
            "outline.create",
            "out-2",
            json!({"projectId": "proj-1", "statusDefs": [{"id": "open", "label": "Open", "isEndState": false}]}),
        )
        .unwrap();
        log.item(1, None, "todo");
        log.item(2, Some("item-1"), "doing");
        log.strict(
            "item.move_outline",
            "item-1",
            json!({"outlineId": "out-2", "rank": "h", "statuses": {"item-1": "open", "item-2": null}}),
        )
        .unwrap();
        let parent = &log.state.items[&ItemId::from_counter(1)];
        let child = &log.state.items[&ItemId::from_counter(2)];
        assert_eq!(parent.outline_id, OutlineId::from_counter(2));
        assert_eq!(child.outline_id, OutlineId::from_counter(2));
        assert_eq!(child.parent_id, Some(ItemId::from_counter(1)));
        assert_eq!(child.status_id, None);
        assert!(log.state.check_invariants().iter().all(|v| !v.message.contains("outline")));
    }
}
