//! Items: creation, field edits, tree placement, claim and ready.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use time::OffsetDateTime;

use super::deps::DepLinks;
use super::outlines::resolve_status;
use super::{Engine, OpError};
use crate::core::event::{
    ArchivePayload, CommentAddPayload, ItemCreatePayload, MoveOutlinePayload, MovePayload,
    SetAssignPayload, SetDatePayload, SetDescriptionPayload, SetOnHoldPayload, SetParentPayload,
    SetPriorityPayload, SetStatusPayload, SetTitlePayload, TagsPayload,
};
use crate::core::{
    ActorId, Attachment, Comment, CommentId, DateTime, EntityKind, EventType, Item, ItemId,
    Outline, OutlineId, Priority, ReadyFilter, StatusId, WorklogEntry, anchor_index,
    completion_blockers, normalize_tag, permission, plan_insert, rank, ready_items,
};

/// Input to [`Engine::create_item`]. Unset placement fields fall back to the
/// parent's outline, then the named outline, then the project's default one.
#[derive(Clone, Debug, Default)]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub project: Option<String>,
    pub outline: Option<String>,
    pub parent: Option<String>,
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub on_hold: bool,
    pub due: Option<DateTime>,
    pub schedule: Option<DateTime>,
    pub tags: Vec<String>,
    pub assign: Option<String>,
}

/// Filters for [`Engine::list_items`]. Without `project` the current project
/// is used, unless `all_projects` is set.
#[derive(Clone, Debug, Default)]
pub struct ItemQuery {
    pub project: Option<String>,
    pub all_projects: bool,
    pub outline: Option<String>,
    pub parent: Option<String>,
    pub status: Option<String>,
    pub assigned: Option<String>,
    pub tag: Option<String>,
    pub include_archived: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ReadyQuery {
    pub project: Option<String>,
    pub outline: Option<String>,
    pub include_on_hold: bool,
    pub include_assigned: bool,
    pub limit: Option<usize>,
}

/// Where a moved item lands among its (new) siblings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    First,
    Last,
    Before(String),
    After(String),
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_label: Option<String>,
    pub ready: bool,
    pub children: Vec<ItemId>,
    pub deps: DepLinks,
    pub comments: Vec<Comment>,
    /// Only entries the acting identity may see.
    pub worklog: Vec<WorklogEntry>,
    pub attachments: Vec<Attachment>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOutcome {
    pub item: Item,
    /// False when the item was already assigned to the claimer.
    pub changed: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub item: Item,
    pub rebalance_count: usize,
}

impl Engine {
    // =========================================================================
    // Create / read
    // =========================================================================

    pub fn create_item(&mut self, new: NewItem) -> Result<Item, OpError> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(OpError::invalid("title", "must not be empty"));
        }
        let actor = self.current_actor_id()?;
        let (outline, parent_id) = self.creation_target(&new)?;
        if outline.archived {
            return Err(OpError::Conflict(format!("outline {} is archived", outline.id)));
        }
        let status_id = match &new.status {
            Some(raw) => Some(resolve_status(&outline, raw)?),
            None => outline.first_status().map(|def| def.id.clone()),
        };
        let tags = normalize_tags(&new.tags)?;
        let assignee = match &new.assign {
            Some(raw) => Some(self.resolve_actor(raw)?.id.clone()),
            None => None,
        };
        let id = self.state.next_id::<ItemId>();
        let siblings = self.sibling_ranks(&outline.id, parent_id.as_ref());
        let plan = plan_insert(&siblings, &id, siblings.len());
        let rank = plan.rank.clone();

        let self_assigned = assignee.as_ref() == Some(&actor);
        self.emit(
            &actor,
            EventType::ItemCreate,
            id.as_str(),
            ItemCreatePayload {
                project_id: outline.project_id.clone(),
                outline_id: outline.id.clone(),
                parent_id,
                rank,
                title,
                description: new.description,
                status_id,
                priority: new.priority.unwrap_or_default(),
                on_hold: new.on_hold,
                due: new.due,
                schedule: new.schedule,
                tags,
                owner_actor_id: actor.clone(),
                assigned_actor_id: if self_assigned { Some(actor.clone()) } else { None },
            },
        )?;
        if plan.used_fallback {
            // Tied sibling ranks: spread the whole set so the new item lands last.
            let rebalance_count = plan.rebalance_count();
            self.emit(
                &actor,
                EventType::ItemMove,
                id.as_str(),
                MovePayload {
                    rank: plan.rank,
                    rebalance: plan.rebalance,
                    rebalance_count,
                },
            )?;
        }
        if let Some(assignee) = assignee.filter(|_| !self_assigned) {
            self.set_assign(id.as_str(), Some(assignee.as_str()))?;
        }
        tracing::info!(item = %id, "item created");
        self.item(id.as_str()).cloned()
    }

    fn creation_target(&self, new: &NewItem) -> Result<(Outline, Option<ItemId>), OpError> {
        if let Some(raw) = &new.parent {
            let parent = self.item(raw)?;
            let outline = self
                .state
                .outline(&parent.outline_id)
                .ok_or_else(|| OpError::not_found("outline", &parent.outline_id))?;
            if let Some(named) = &new.outline
                && self.outline(named)?.id != outline.id
            {
                return Err(OpError::invalid(
                    "outline",
                    format!("parent {} lives in outline {}", parent.id, outline.id),
                ));
            }
            return Ok((outline.clone(), Some(parent.id.clone())));
        }
        let outline = match &new.outline {
            Some(raw) => self.outline(raw)?,
            None => self.default_outline(new.project.as_deref())?,
        };
        Ok((outline.clone(), None))
    }

    /// Matching items grouped by outline, each outline in tree order.
    pub fn list_items(&self, query: &ItemQuery) -> Result<Vec<&Item>, OpError> {
        let project = match (&query.project, query.all_projects) {
            (Some(raw), _) => Some(self.project(raw)?.id.clone()),
            (None, false) => self.state.current_project_id.clone(),
            (None, true) => None,
        };
        let outline = match &query.outline {
            Some(raw) => Some(self.outline(raw)?.id.clone()),
            None => None,
        };
        let parent = match &query.parent {
            Some(raw) => Some(self.item(raw)?.id.clone()),
            None => None,
        };
        let assigned = match &query.assigned {
            Some(raw) => Some(self.resolve_actor(raw)?.id.clone()),
            None => None,
        };
        let tag = query.tag.as_deref().map(normalize_tag).transpose()?;

        let mut out: Vec<&Item> = self
            .state
            .items
            .values()
            .filter(|i| query.include_archived || !i.archived)
            .filter(|i| project.as_ref().is_none_or(|p| &i.project_id == p))
            .filter(|i| outline.as_ref().is_none_or(|o| &i.outline_id == o))
            .filter(|i| parent.is_none() || i.parent_id == parent)
            .filter(|i| assigned.is_none() || i.assigned_actor_id == assigned)
            .filter(|i| tag.as_ref().is_none_or(|t| i.tags.contains(t)))
            .filter(|i| match &query.status {
                None => true,
                Some(raw) => self
                    .state
                    .outline_of(i)
                    .and_then(|o| o.resolve_status(raw))
                    .is_some_and(|def| i.status_id.as_ref() == Some(&def.id)),
            })
            .collect();
        out.sort_by_cached_key(|i| (i.outline_id.clone(), tree_path(&self.state, i)));
        Ok(out)
    }

    pub fn show_item(&self, raw: &str) -> Result<ItemDetail, OpError> {
        let item = self.item(raw)?;
        let status_label = item.status_id.as_ref().and_then(|s| {
            self.state
                .outline_of(item)
                .and_then(|o| o.status(s))
                .map(|def| def.label.clone())
        });
        let attachments = self
            .state
            .attachments
            .values()
            .filter(|a| a.entity_kind == EntityKind::Item && a.entity_id == item.id.as_str())
            .cloned()
            .collect();
        Ok(ItemDetail {
            status_label,
            ready: crate::core::is_ready(&self.state, item, false),
            children: self.state.children(&item.id).iter().map(|c| c.id.clone()).collect(),
            deps: self.dep_links(&item.id),
            comments: self.comments_of(&item.id).into_iter().cloned().collect(),
            worklog: self.visible_worklog(&item.id).into_iter().cloned().collect(),
            attachments,
            item: item.clone(),
        })
    }

    // =========================================================================
    // Field edits
    // =========================================================================

    fn edit_item(&mut self, raw: &str, ty: EventType, payload: impl Serialize) -> Result<Item, OpError> {
        let id = self.item(raw)?.id.clone();
        let actor = self.require_item_edit(&id)?;
        self.emit(&actor, ty, id.as_str(), payload)?;
        self.item(id.as_str()).cloned()
    }

    pub fn set_title(&mut self, raw: &str, title: &str) -> Result<Item, OpError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(OpError::invalid("title", "must not be empty"));
        }
        self.edit_item(
            raw,
            EventType::ItemSetTitle,
            SetTitlePayload {
                title: title.to_string(),
            },
        )
    }

    pub fn set_description(&mut self, raw: &str, description: &str) -> Result<Item, OpError> {
        self.edit_item(
            raw,
            EventType::ItemSetDescription,
            SetDescriptionPayload {
                description: description.to_string(),
            },
        )
    }

    pub fn set_priority(&mut self, raw: &str, priority: Priority) -> Result<Item, OpError> {
        self.edit_item(raw, EventType::ItemSetPriority, SetPriorityPayload { priority })
    }

    pub fn set_on_hold(&mut self, raw: &str, on_hold: bool) -> Result<Item, OpError> {
        self.edit_item(raw, EventType::ItemSetOnHold, SetOnHoldPayload { on_hold })
    }

    pub fn set_due(&mut self, raw: &str, value: Option<DateTime>) -> Result<Item, OpError> {
        self.edit_item(raw, EventType::ItemSetDue, SetDatePayload { value })
    }

    pub fn set_schedule(&mut self, raw: &str, value: Option<DateTime>) -> Result<Item, OpError> {
        self.edit_item(raw, EventType::ItemSetSchedule, SetDatePayload { value })
    }

    pub fn archive_item(&mut self, raw: &str, archived: bool) -> Result<Item, OpError> {
        self.edit_item(raw, EventType::ItemArchive, ArchivePayload { archived })
    }

    pub fn add_tags(&mut self, raw: &str, tags: &[String]) -> Result<Item, OpError> {
        let tags = normalize_tags(tags)?;
        self.edit_item(raw, EventType::ItemTagsAdd, TagsPayload { tags })
    }

    pub fn remove_tags(&mut self, raw: &str, tags: &[String]) -> Result<Item, OpError> {
        let tags = normalize_tags(tags)?;
        self.edit_item(raw, EventType::ItemTagsRemove, TagsPayload { tags })
    }

    pub fn set_tags(&mut self, raw: &str, tags: &[String]) -> Result<Item, OpError> {
        let tags = normalize_tags(tags)?;
        self.edit_item(raw, EventType::ItemTagsSet, TagsPayload { tags })
    }

    /// Change (or clear, with `None`) the status.
    ///
    /// Gates are checked before anything is written. A note is recorded as a
    /// comment on the item ahead of the status change.
    pub fn set_status(
        &mut self,
        raw: &str,
        status: Option<&str>,
        note: Option<&str>,
    ) -> Result<Item, OpError> {
        let item = self.item(raw)?.clone();
        let actor = self.require_item_edit(&item.id)?;
        let outline = self
            .state
            .outline(&item.outline_id)
            .cloned()
            .ok_or_else(|| OpError::not_found("outline", &item.outline_id))?;
        let status_id = status.map(|s| resolve_status(&outline, s)).transpose()?;
        let note = note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);

        if let Some(def) = status_id.as_ref().and_then(|s| outline.status(s)) {
            if def.require_note && note.is_none() {
                return Err(OpError::Gate(format!("status {} requires a note", def.label)));
            }
            if def.is_end_state
                && let Some(message) = completion_blockers(&self.state, &item.id).message(&item.id)
            {
                return Err(OpError::Gate(message));
            }
        }

        if let Some(body) = &note {
            let comment_id = self.state.next_id::<CommentId>();
            self.emit(
                &actor,
                EventType::CommentAdd,
                comment_id.as_str(),
                CommentAddPayload {
                    item_id: item.id.clone(),
                    reply_to_comment_id: None,
                    body: body.clone(),
                },
            )?;
        }
        self.emit(
            &actor,
            EventType::ItemSetStatus,
            item.id.as_str(),
            SetStatusPayload { status_id, note },
        )?;
        self.item(item.id.as_str()).cloned()
    }

    /// Assigning someone other than the owner hands ownership over; clearing
    /// the assignment leaves ownership where it is.
    pub fn set_assign(&mut self, raw: &str, assignee: Option<&str>) -> Result<Item, OpError> {
        let item = self.item(raw)?.clone();
        let actor = self.require_item_edit(&item.id)?;
        let assignee = match assignee {
            Some(raw) => Some(self.resolve_actor(raw)?.id.clone()),
            None => None,
        };
        let now = self.now();
        let payload = match assignee {
            Some(to) if to != item.owner_actor_id => SetAssignPayload {
                assigned_actor_id: Some(to.clone()),
                owner_actor_id: to,
                owner_delegated_from: Some(item.owner_actor_id.clone()),
                owner_delegated_at: Some(now),
            },
            assigned => keep_ownership(&item, assigned),
        };
        self.emit(&actor, EventType::ItemSetAssign, item.id.as_str(), payload)?;
        self.item(item.id.as_str()).cloned()
    }

    // =========================================================================
    // Placement
    // =========================================================================

    /// Reorder among current siblings.
    pub fn move_item(&mut self, raw: &str, placement: &Placement) -> Result<MoveOutcome, OpError> {
        let item = self.item(raw)?.clone();
        let actor = self.require_item_edit(&item.id)?;
        let siblings = self.sibling_ranks(&item.outline_id, item.parent_id.as_ref());
        let index = self.placement_index(&siblings, &item.id, placement)?;
        let plan = plan_insert(&siblings, &item.id, index);
        let rebalance_count = plan.rebalance_count();
        self.emit(
            &actor,
            EventType::ItemMove,
            item.id.as_str(),
            MovePayload {
                rank: plan.rank,
                rebalance: plan.rebalance,
                rebalance_count,
            },
        )?;
        Ok(MoveOutcome {
            item: self.item(item.id.as_str())?.clone(),
            rebalance_count,
        })
    }

    /// Re-parent within the same outline; `None` makes the item a root.
    pub fn set_parent(
        &mut self,
        raw: &str,
        parent: Option<&str>,
        placement: &Placement,
    ) -> Result<MoveOutcome, OpError> {
        let item = self.item(raw)?.clone();
        let actor = self.require_item_edit(&item.id)?;
        let parent_id = match parent {
            Some(raw) => {
                let parent = self.item(raw)?;
                if parent.outline_id != item.outline_id {
                    return Err(OpError::invalid(
                        "parent",
                        format!("{} lives in a different outline; use move-outline", parent.id),
                    ));
                }
                if self.state.is_self_or_ancestor(&item.id, &parent.id) {
                    return Err(OpError::Conflict(format!(
                        "making {} the parent of {} creates a cycle",
                        parent.id, item.id
                    )));
                }
                Some(parent.id.clone())
            }
            None => None,
        };
        let siblings = self.sibling_ranks(&item.outline_id, parent_id.as_ref());
        let index = self.placement_index(&siblings, &item.id, placement)?;
        let plan = plan_insert(&siblings, &item.id, index);
        let rebalance_count = plan.rebalance_count();
        self.emit(
            &actor,
            EventType::ItemSetParent,
            item.id.as_str(),
            SetParentPayload {
                parent_id,
                rank: plan.rank,
                rebalance: plan.rebalance,
            },
        )?;
        Ok(MoveOutcome {
            item: self.item(item.id.as_str())?.clone(),
            rebalance_count,
        })
    }

    /// Move an item and its subtree to another outline of the same project.
    ///
    /// The item becomes the last root of the target. Statuses carry over by
    /// id, then by label, else fall back to the target's first status; an
    /// explicit `status` applies to the moved item itself.
    pub fn move_outline(
        &mut self,
        raw: &str,
        outline: &str,
        status: Option<&str>,
    ) -> Result<Item, OpError> {
        let item = self.item(raw)?.clone();
        let actor = self.require_item_edit(&item.id)?;
        let target = self.outline(outline)?.clone();
        if target.id == item.outline_id {
            return Err(OpError::invalid("outline", format!("{} already lives in {}", item.id, target.id)));
        }
        if target.project_id != item.project_id {
            return Err(OpError::invalid(
                "outline",
                format!("{} belongs to a different project", target.id),
            ));
        }
        let explicit = status.map(|raw| resolve_status(&target, raw)).transpose()?;
        let source = self.state.outline(&item.outline_id);
        let mut statuses = BTreeMap::new();
        for id in std::iter::once(item.id.clone()).chain(self.state.descendants(&item.id)) {
            let mapped = match (&explicit, id == item.id) {
                (Some(status), true) => Some(status.clone()),
                _ => {
                    let current = self.state.item(&id).and_then(|i| i.status_id.as_ref());
                    map_status(source, &target, current)
                }
            };
            statuses.insert(id, mapped);
        }
        let rank = self
            .state
            .siblings(&target.id, None)
            .last()
            .and_then(|last| rank::after(&last.rank))
            .unwrap_or_else(|| rank::INITIAL.to_string());
        self.emit(
            &actor,
            EventType::ItemMoveOutline,
            item.id.as_str(),
            MoveOutlinePayload {
                outline_id: target.id.clone(),
                rank,
                statuses,
            },
        )?;
        self.item(item.id.as_str()).cloned()
    }

    fn sibling_ranks(&self, outline: &OutlineId, parent: Option<&ItemId>) -> Vec<(ItemId, String)> {
        self.state
            .siblings(outline, parent)
            .into_iter()
            .map(|s| (s.id.clone(), s.rank.clone()))
            .collect()
    }

    fn placement_index(
        &self,
        siblings: &[(ItemId, String)],
        moved: &ItemId,
        placement: &Placement,
    ) -> Result<usize, OpError> {
        let (anchor, after) = match placement {
            Placement::First => return Ok(0),
            Placement::Last => return Ok(usize::MAX),
            Placement::Before(raw) => (raw, false),
            Placement::After(raw) => (raw, true),
        };
        let anchor = self.item(anchor)?.id.clone();
        if &anchor == moved {
            return Err(OpError::invalid("anchor", "an item cannot be placed relative to itself"));
        }
        anchor_index(siblings, moved, &anchor, after).ok_or_else(|| {
            OpError::invalid("anchor", format!("{anchor} is not a sibling of {moved}"))
        })
    }

    // =========================================================================
    // Claim / ready
    // =========================================================================

    /// Assign the item to the acting identity.
    pub fn claim(&mut self, raw: &str, take_assigned: bool) -> Result<ClaimOutcome, OpError> {
        let actor = self.current_actor_id()?;
        self.claim_as(&actor, raw, take_assigned)
    }

    pub(crate) fn claim_as(
        &mut self,
        actor: &ActorId,
        raw: &str,
        take_assigned: bool,
    ) -> Result<ClaimOutcome, OpError> {
        let item = self.item(raw)?.clone();
        let assigned = item.assigned_actor_id.clone();
        match &assigned {
            Some(current) if current == actor => {
                return Ok(ClaimOutcome { item, changed: false });
            }
            Some(other) if !take_assigned => {
                return Err(OpError::Conflict(format!(
                    "{} is assigned to {other}; pass --take-assigned to take it over",
                    item.id
                )));
            }
            _ => {}
        }
        let now = self.now();
        let grace = self.grace();
        let allowed = permission::can_edit(&self.state, actor, &item, now, grace)
            || permission::same_owning_human(&self.state, actor, &item.owner_actor_id);
        if !allowed {
            return Err(OpError::PermissionDenied(format!(
                "{actor} cannot claim {} (owned by {})",
                item.id, item.owner_actor_id
            )));
        }
        let displaced = assigned.unwrap_or_else(|| item.owner_actor_id.clone());
        let payload = if &displaced == actor {
            keep_ownership(&item, Some(actor.clone()))
        } else {
            SetAssignPayload {
                assigned_actor_id: Some(actor.clone()),
                owner_actor_id: actor.clone(),
                owner_delegated_from: Some(displaced),
                owner_delegated_at: Some(now),
            }
        };
        self.emit(actor, EventType::ItemSetAssign, item.id.as_str(), payload)?;
        tracing::info!(item = %item.id, actor = %actor, "item claimed");
        Ok(ClaimOutcome {
            item: self.item(item.id.as_str())?.clone(),
            changed: true,
        })
    }

    pub fn ready(&self, query: &ReadyQuery) -> Result<Vec<&Item>, OpError> {
        let filter = ReadyFilter {
            include_on_hold: query.include_on_hold,
            include_assigned: query.include_assigned,
            project: match &query.project {
                Some(raw) => Some(self.project(raw)?.id.clone()),
                None => None,
            },
            outline: match &query.outline {
                Some(raw) => Some(self.outline(raw)?.id.clone()),
                None => None,
            },
            limit: query.limit,
        };
        let current = self.current_actor_id().ok();
        Ok(ready_items(&self.state, current.as_ref(), &filter))
    }
}

fn keep_ownership(item: &Item, assigned: Option<ActorId>) -> SetAssignPayload {
    SetAssignPayload {
        assigned_actor_id: assigned,
        owner_actor_id: item.owner_actor_id.clone(),
        owner_delegated_from: item.owner_delegated_from.clone(),
        owner_delegated_at: item.owner_delegated_at,
    }
}

fn normalize_tags(raw: &[String]) -> Result<Vec<String>, OpError> {
    let mut out = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = normalize_tag(tag)?;
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    Ok(out)
}

fn map_status(source: Option<&Outline>, target: &Outline, current: Option<&StatusId>) -> Option<StatusId> {
    let current = current?;
    if target.status(current).is_some() {
        return Some(current.clone());
    }
    source
        .and_then(|s| s.status(current))
        .and_then(|def| target.resolve_status(&def.label))
        .or_else(|| target.first_status())
        .map(|def| def.id.clone())
}

/// Sort key placing an item after its ancestors and in sibling order.
fn tree_path(state: &crate::core::State, item: &Item) -> Vec<(String, OffsetDateTime, ItemId)> {
    let mut path = Vec::new();
    let mut seen = BTreeSet::new();
    let mut cursor = Some(item);
    while let Some(node) = cursor {
        if !seen.insert(node.id.clone()) {
            break;
        }
        path.push((node.rank.clone(), node.created_at, node.id.clone()));
        cursor = node.parent_id.as_ref().and_then(|p| state.item(p));
    }
    path.reverse();
    path
}
