//! Event records and the typed vocabulary.
//!
//! One record per line in the event log. `type` stays a string on the wire so
//! that records written by newer builds survive being read by older ones;
//! [`EventType::parse`] maps unknown strings to [`EventType::Unknown`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::domain::{ActorKind, DateTime, DepType, EntityKind, Priority};
use super::identity::{ActorId, CommentId, EventId, ItemId, OutlineId, ProjectId, StatusId};
use super::model::OutlineStatusDef;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub actor_id: ActorId,
    #[serde(rename = "type")]
    pub kind: String,
    pub entity_id: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    pub fn event_type(&self) -> EventType {
        EventType::parse(&self.kind)
    }

    /// Item this event concerns, directly or through its payload.
    pub fn touches_item(&self, item: &ItemId) -> bool {
        if self.entity_id == item.as_str() {
            return true;
        }
        ["itemId", "fromItemId", "toItemId"].iter().any(|key| {
            self.payload
                .get(key)
                .and_then(serde_json::Value::as_str)
                .is_some_and(|v| v == item.as_str())
        })
    }
}

macro_rules! event_types {
    ($($variant:ident => $wire:literal),+ $(,)?) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub enum EventType {
            $($variant,)+
            Unknown(String),
        }

        impl EventType {
            pub const KNOWN: &'static [&'static str] = &[$($wire),+];

            pub fn parse(raw: &str) -> Self {
                match raw {
                    $($wire => Self::$variant,)+
                    other => Self::Unknown(other.to_string()),
                }
            }

            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Unknown(raw) => raw,
                }
            }
        }
    };
}

event_types! {
    IdentityCreate => "identity.create",
    IdentityUse => "identity.use",
    ProjectCreate => "project.create",
    ProjectUpdate => "project.update",
    ProjectArchive => "project.archive",
    OutlineCreate => "outline.create",
    OutlineArchive => "outline.archive",
    OutlineStatusAdd => "outline.status.add",
    OutlineStatusUpdate => "outline.status.update",
    OutlineStatusRemove => "outline.status.remove",
    OutlineStatusReorder => "outline.status.reorder",
    ItemCreate => "item.create",
    ItemSetTitle => "item.set_title",
    ItemSetDescription => "item.set_description",
    ItemSetStatus => "item.set_status",
    ItemSetPriority => "item.set_priority",
    ItemSetOnHold => "item.set_on_hold",
    ItemSetDue => "item.set_due",
    ItemSetSchedule => "item.set_schedule",
    ItemSetAssign => "item.set_assign",
    ItemSetParent => "item.set_parent",
    ItemMove => "item.move",
    ItemMoveOutline => "item.move_outline",
    ItemTagsAdd => "item.tags_add",
    ItemTagsRemove => "item.tags_remove",
    ItemTagsSet => "item.tags_set",
    ItemArchive => "item.archive",
    DepAdd => "dep.add",
    DepRemove => "dep.remove",
    CommentAdd => "comment.add",
    WorklogAdd => "worklog.add",
    AttachmentAdd => "attachment.add",
    AttachmentRemove => "attachment.remove",
}

impl EventType {
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Creates carry their own entity id; every other type refers to an existing one.
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            Self::IdentityCreate
                | Self::ProjectCreate
                | Self::OutlineCreate
                | Self::ItemCreate
                | Self::DepAdd
                | Self::CommentAdd
                | Self::WorklogAdd
                | Self::AttachmentAdd
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityCreatePayload {
    pub kind: ActorKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ActorId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreatePayload {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Shared by `project.archive`, `outline.archive` and `item.archive`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivePayload {
    pub archived: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineCreatePayload {
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status_defs: Vec<OutlineStatusDef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAddPayload {
    pub status_def: OutlineStatusDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdatePayload {
    pub status_id: StatusId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_end_state: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_note: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRemovePayload {
    pub status_id: StatusId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReorderPayload {
    pub order: Vec<StatusId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCreatePayload {
    pub project_id: ProjectId,
    pub outline_id: OutlineId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,
    pub rank: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_id: Option<StatusId>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub on_hold: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<DateTime>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub owner_actor_id: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_actor_id: Option<ActorId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTitlePayload {
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDescriptionPayload {
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_id: Option<StatusId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPriorityPayload {
    pub priority: Priority,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetOnHoldPayload {
    pub on_hold: bool,
}

/// Shared by `item.set_due` and `item.set_schedule`; `null` clears.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDatePayload {
    #[serde(default)]
    pub value: Option<DateTime>,
}

/// Ownership fields are recorded explicitly so replay never depends on the clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAssignPayload {
    #[serde(default)]
    pub assigned_actor_id: Option<ActorId>,
    pub owner_actor_id: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_delegated_from: Option<ActorId>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner_delegated_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetParentPayload {
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    pub rank: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rebalance: BTreeMap<ItemId, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub rank: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rebalance: BTreeMap<ItemId, String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub rebalance_count: usize,
}

/// The item lands at the root of the target outline; descendants follow it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutlinePayload {
    pub outline_id: OutlineId,
    pub rank: String,
    /// New status per moved item (the item and each descendant).
    #[serde(default)]
    pub statuses: BTreeMap<ItemId, Option<StatusId>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagsPayload {
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepAddPayload {
    pub from_item_id: ItemId,
    pub to_item_id: ItemId,
    #[serde(rename = "type")]
    pub dep_type: DepType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentAddPayload {
    pub item_id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_comment_id: Option<CommentId>,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorklogAddPayload {
    pub item_id: ItemId,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentAddPayload {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub relative_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    pub bytes: u64,
    pub sha256: String,
    pub original_name: String,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}
