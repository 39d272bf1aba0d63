//! Core domain for clarity.
//!
//! Module hierarchy follows type dependency order:
//! - error: refused atoms
//! - identity: typed entity ids, StatusId
//! - domain: ActorKind, DepType, Priority, DateTime
//! - rank: lexicographic rank algebra
//! - model: Actor, Project, Outline, Item, Dependency, Comment, WorklogEntry, Attachment
//! - event: Event record and payload vocabulary
//! - state: the aggregate
//! - permission, status, ordering, graph, ready: rules and queries over the aggregate
//! - apply: event application (strict and lenient)

pub mod apply;
pub mod domain;
pub mod error;
pub mod event;
pub mod graph;
pub mod identity;
pub mod model;
pub mod ordering;
pub mod permission;
pub mod rank;
pub mod ready;
pub mod state;
pub mod status;

pub use apply::{ApplyError, ApplyMode, ApplyOutcome, apply_event};
pub use domain::{ActorKind, DateTime, DepType, EntityKind, Priority, normalize_tag};
pub use error::{CoreError, InvalidId, InvalidValue, RangeError};
pub use event::{Event, EventType};
pub use graph::{DepTreeNode, blocking_cycles, dep_tree};
pub use identity::{
    ActorId, AllocatedId, AttachmentId, CommentId, DepId, EventId, ItemId, OutlineId, ProjectId,
    StatusId, WorklogId,
};
pub use model::{
    Actor, Attachment, Comment, Dependency, Item, Outline, OutlineStatusDef, Project, WorklogEntry,
};
pub use ordering::{RankPlan, anchor_index, plan_insert};
pub use permission::{DEFAULT_GRACE_SECONDS, EditGrant, can_edit, edit_grant, same_owning_human};
pub use ready::{ReadyFilter, is_ready, ready_items};
pub use state::{InvariantViolation, STATE_VERSION, State};
pub use status::{CompletionBlockers, completion_blockers};
