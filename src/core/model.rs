//! Aggregate entities.
//!
//! Field names are camelCase on disk; these structs are both the snapshot
//! representation and what command output serializes.

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use super::domain::{ActorKind, DateTime, DepType, EntityKind, Priority};
use super::identity::{
    ActorId, AttachmentId, CommentId, DepId, ItemId, OutlineId, ProjectId, StatusId, WorklogId,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: ActorId,
    pub kind: ActorKind,
    pub name: String,
    /// Owning human; required for agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ActorId>,
}

impl Actor {
    pub fn is_human(&self) -> bool {
        self.kind == ActorKind::Human
    }

    /// The human accountable for this actor.
    pub fn owner_human(&self) -> &ActorId {
        match (self.kind, &self.user_id) {
            (ActorKind::Agent, Some(user)) => user,
            _ => &self.id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_by: ActorId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineStatusDef {
    pub id: StatusId,
    pub label: String,
    #[serde(default)]
    pub is_end_state: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub require_note: bool,
}

impl OutlineStatusDef {
    pub fn new(id: &str, label: &str, is_end_state: bool) -> Self {
        Self {
            id: StatusId::slug_from_label(id),
            label: label.to_string(),
            is_end_state,
            require_note: false,
        }
    }

    /// `todo`, `doing`, `done` (end state).
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("todo", "TODO", false),
            Self::new("doing", "DOING", false),
            Self::new("done", "DONE", true),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outline {
    pub id: OutlineId,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status_defs: Vec<OutlineStatusDef>,
    pub created_by: ActorId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub archived: bool,
}

impl Outline {
    pub fn status(&self, id: &StatusId) -> Option<&OutlineStatusDef> {
        self.status_defs.iter().find(|def| &def.id == id)
    }

    /// Resolve by id first, then by case-insensitive label.
    pub fn resolve_status(&self, raw: &str) -> Option<&OutlineStatusDef> {
        let needle = raw.trim();
        self.status_defs
            .iter()
            .find(|def| def.id.as_str() == needle)
            .or_else(|| {
                self.status_defs
                    .iter()
                    .find(|def| def.label.eq_ignore_ascii_case(needle))
            })
    }

    pub fn is_end_state(&self, id: &StatusId) -> bool {
        self.status(id).is_some_and(|def| def.is_end_state)
    }

    pub fn first_status(&self) -> Option<&OutlineStatusDef> {
        self.status_defs.first()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub project_id: ProjectId,
    pub outline_id: OutlineId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,
    pub rank: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
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
    #[serde(default)]
    pub archived: bool,
    pub owner_actor_id: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_actor_id: Option<ActorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_delegated_from: Option<ActorId>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner_delegated_at: Option<OffsetDateTime>,
    pub created_by: ActorId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub id: DepId,
    pub from_item_id: ItemId,
    pub to_item_id: ItemId,
    #[serde(rename = "type")]
    pub dep_type: DepType,
    pub created_by: ActorId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub item_id: ItemId,
    pub author_id: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_comment_id: Option<CommentId>,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorklogEntry {
    pub id: WorklogId,
    pub item_id: ItemId,
    pub author_id: ActorId,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: AttachmentId,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    /// Workspace-relative path using `/` separators.
    pub relative_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    pub bytes: u64,
    pub sha256: String,
    pub original_name: String,
    pub created_by: ActorId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<StatusId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(s) if !s.trim().is_empty() => StatusId::parse(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_owner_human_is_user_id() {
        let human = ActorId::from_counter(1);
        let agent = Actor {
            id: ActorId::from_counter(2),
            kind: ActorKind::Agent,
            name: "abc codex".into(),
            user_id: Some(human.clone()),
        };
        assert_eq!(agent.owner_human(), &human);
        let person = Actor {
            id: human.clone(),
            kind: ActorKind::Human,
            name: "Ada".into(),
            user_id: None,
        };
        assert_eq!(person.owner_human(), &human);
    }

    #[test]
    fn status_resolves_by_id_then_label() {
        let outline = Outline {
            id: OutlineId::from_counter(1),
            project_id: ProjectId::from_counter(1),
            name: None,
            status_defs: OutlineStatusDef::defaults(),
            created_by: ActorId::from_counter(1),
            created_at: OffsetDateTime::UNIX_EPOCH,
            archived: false,
        };
        assert_eq!(outline.resolve_status("done").unwrap().label, "DONE");
        assert_eq!(outline.resolve_status("Doing").unwrap().id.as_str(), "doing");
        assert!(outline.resolve_status("nope").is_none());
        assert!(outline.is_end_state(&StatusId::parse("done").unwrap()));
    }

    #[test]
    fn empty_status_id_reads_as_unset() {
        let raw = serde_json::json!({
            "id": "item-1",
            "projectId": "proj-1",
            "outlineId": "out-1",
            "rank": "h",
            "title": "t",
            "statusId": "",
            "ownerActorId": "act-1",
            "createdBy": "act-1",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        });
        let item: Item = serde_json::from_value(raw).unwrap();
        assert_eq!(item.status_id, None);
        assert_eq!(item.priority, Priority::MEDIUM);
    }
}
