//! Domain operations.
//!
//! An [`Engine`] owns one workspace's aggregate for the duration of a command.
//! Every mutation validates against the aggregate, mints one event and applies
//! it strictly. Events stay in memory until [`Engine::save`] appends them and
//! writes the snapshot, so a command that fails halfway persists nothing.

pub mod agent;
pub mod attachments;
pub mod clock;
pub mod comments;
pub mod deps;
pub mod events;
pub mod identity;
pub mod items;
pub mod outlines;
pub mod projects;

use serde::Serialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::core::{
    Actor, ActorId, ApplyError, ApplyMode, CoreError, Event, EventId, EventType, Item, ItemId,
    Outline, OutlineId, Project, ProjectId, State, apply_event, permission,
};
use crate::store::{Store, StoreError};

pub use agent::{AgentRequest, AgentStart, EnsuredAgent};
pub use attachments::AttachmentTarget;
pub use clock::Clock;
pub use deps::{DepLinks, DepRef};
pub use events::EventQuery;
pub use items::{ClaimOutcome, ItemDetail, ItemQuery, MoveOutcome, NewItem, Placement, ReadyQuery};
pub use outlines::StatusPatch;
pub use projects::CreatedProject;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OpError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Gate(String),

    #[error("no current actor; run `clarity identity create` or pass --actor")]
    NoCurrentActor,

    #[error("no current project; run `clarity projects use` or pass --project")]
    NoCurrentProject,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode event payload: {0}")]
    Encode(#[source] serde_json::Error),
}

impl OpError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }
}

impl From<ApplyError> for OpError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NotFound { kind, id } => Self::NotFound { kind, id },
            ApplyError::Invalid(reason) => Self::InvalidArgument {
                field: "event",
                reason,
            },
            ApplyError::Conflict(msg) => Self::Conflict(msg),
            ApplyError::Gate(msg) => Self::Gate(msg),
            other => Self::Conflict(other.to_string()),
        }
    }
}

/// Knobs a command passes in from configuration and global flags.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// `--actor`: id or exact name; overrides the current actor.
    pub actor: Option<String>,
    pub grace_seconds: u64,
    pub attachment_max_bytes: Option<u64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            actor: None,
            grace_seconds: permission::DEFAULT_GRACE_SECONDS,
            attachment_max_bytes: None,
        }
    }
}

pub struct Engine {
    store: Store,
    state: State,
    clock: Clock,
    options: EngineOptions,
    emitted: Vec<Event>,
    /// Index into `emitted` of the first event not yet in the log.
    unsaved_from: usize,
}

impl Engine {
    pub fn open(store: Store, options: EngineOptions, clock: Clock) -> Result<Self, OpError> {
        let state = store.load()?;
        Ok(Self {
            store,
            state,
            clock,
            options,
            emitted: Vec::new(),
            unsaved_from: 0,
        })
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Events minted by this engine, oldest first.
    pub fn emitted(&self) -> &[Event] {
        &self.emitted
    }

    /// Minted events not yet written to the log.
    pub fn unsaved(&self) -> &[Event] {
        &self.emitted[self.unsaved_from..]
    }

    /// Append the unsaved events, then write the snapshot.
    pub fn save(&mut self) -> Result<(), OpError> {
        self.store.commit(self.unsaved(), &self.state)?;
        self.unsaved_from = self.emitted.len();
        Ok(())
    }

    /// Replace the in-memory aggregate, e.g. after a reindex.
    pub fn replace_state(&mut self, state: State) {
        self.state = state;
    }

    pub(crate) fn now(&mut self) -> OffsetDateTime {
        self.clock.now()
    }

    pub(crate) fn grace(&self) -> Duration {
        permission::grace_from_seconds(self.options.grace_seconds)
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// The acting identity: `--actor` when given, else the workspace's current actor.
    pub fn current_actor(&self) -> Result<&Actor, OpError> {
        if let Some(raw) = &self.options.actor {
            return self
                .state
                .find_actor(raw)
                .ok_or_else(|| OpError::not_found("actor", raw));
        }
        self.state
            .current_actor_id
            .as_ref()
            .and_then(|id| self.state.actor(id))
            .ok_or(OpError::NoCurrentActor)
    }

    pub(crate) fn current_actor_id(&self) -> Result<ActorId, OpError> {
        self.current_actor().map(|a| a.id.clone())
    }

    pub fn resolve_actor(&self, raw: &str) -> Result<&Actor, OpError> {
        self.state
            .find_actor(raw.trim())
            .ok_or_else(|| OpError::not_found("actor", raw))
    }

    pub fn item(&self, raw: &str) -> Result<&Item, OpError> {
        let id = ItemId::parse(raw.trim())?;
        self.state
            .item(&id)
            .ok_or_else(|| OpError::not_found("item", raw))
    }

    pub fn outline(&self, raw: &str) -> Result<&Outline, OpError> {
        let id = OutlineId::parse(raw.trim())?;
        self.state
            .outline(&id)
            .ok_or_else(|| OpError::not_found("outline", raw))
    }

    /// Project by id, else by exact name.
    pub fn project(&self, raw: &str) -> Result<&Project, OpError> {
        let raw = raw.trim();
        if let Ok(id) = ProjectId::parse(raw)
            && let Some(project) = self.state.project(&id)
        {
            return Ok(project);
        }
        self.state
            .projects
            .values()
            .find(|p| p.name == raw)
            .ok_or_else(|| OpError::not_found("project", raw))
    }

    /// `raw` when given, else the current project.
    pub fn project_or_current(&self, raw: Option<&str>) -> Result<&Project, OpError> {
        match raw {
            Some(raw) => self.project(raw),
            None => self
                .state
                .current_project_id
                .as_ref()
                .and_then(|id| self.state.project(id))
                .ok_or(OpError::NoCurrentProject),
        }
    }

    // =========================================================================
    // Permission
    // =========================================================================

    pub(crate) fn require_item_edit(&mut self, item: &ItemId) -> Result<ActorId, OpError> {
        let actor = self.current_actor_id()?;
        let now = self.now();
        let grace = self.grace();
        let target = self
            .state
            .item(item)
            .ok_or_else(|| OpError::not_found("item", item))?;
        if permission::can_edit(&self.state, &actor, target, now, grace) {
            Ok(actor)
        } else {
            Err(OpError::PermissionDenied(format!(
                "{actor} cannot edit {item} (owned by {})",
                target.owner_actor_id
            )))
        }
    }

    /// Projects and outlines are editable by anyone under the creator's owning human.
    pub(crate) fn require_container_edit(
        &self,
        created_by: &ActorId,
        what: &str,
    ) -> Result<ActorId, OpError> {
        let actor = self.current_actor_id()?;
        if permission::same_owning_human(&self.state, &actor, created_by) {
            Ok(actor)
        } else {
            Err(OpError::PermissionDenied(format!("{actor} cannot modify {what}")))
        }
    }

    // =========================================================================
    // Emission
    // =========================================================================

    /// Mint and apply strictly; the log is written by [`Engine::save`].
    pub(crate) fn emit(
        &mut self,
        actor: &ActorId,
        ty: EventType,
        entity_id: &str,
        payload: impl Serialize,
    ) -> Result<Event, OpError> {
        let payload = serde_json::to_value(payload).map_err(OpError::Encode)?;
        let ts = self.now();
        let event = Event {
            id: self.state.next_id::<EventId>(),
            ts,
            actor_id: actor.clone(),
            kind: ty.as_str().to_string(),
            entity_id: entity_id.to_string(),
            payload,
        };
        apply_event(&mut self.state, &event, ApplyMode::Strict)?;
        self.emitted.push(event.clone());
        Ok(event)
    }
}
