//! The aggregate.
//!
//! Every entity collection, the allocator counters, and two local UI hints
//! (`currentActorId`, `currentProjectId`). Derived from the event log; the
//! snapshot on disk is this struct serialized.
//!
//! INVARIANT: map keys equal the `id` field of their value.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::domain::{ActorKind, DepType};
use super::identity::{
    ActorId, AllocatedId, AttachmentId, CommentId, DepId, EventId, ItemId, OutlineId, ProjectId, WorklogId,
    counter_of,
};
use super::model::{Actor, Attachment, Comment, Dependency, Item, Outline, Project, WorklogEntry};

pub const STATE_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct State {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_actor_id: Option<ActorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_project_id: Option<ProjectId>,
    pub next_ids: BTreeMap<String, u64>,
    pub actors: BTreeMap<ActorId, Actor>,
    pub projects: BTreeMap<ProjectId, Project>,
    pub outlines: BTreeMap<OutlineId, Outline>,
    pub items: BTreeMap<ItemId, Item>,
    pub deps: BTreeMap<DepId, Dependency>,
    pub comments: BTreeMap<CommentId, Comment>,
    pub worklog: BTreeMap<WorklogId, WorklogEntry>,
    pub attachments: BTreeMap<AttachmentId, Attachment>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            current_actor_id: None,
            current_project_id: None,
            next_ids: BTreeMap::new(),
            actors: BTreeMap::new(),
            projects: BTreeMap::new(),
            outlines: BTreeMap::new(),
            items: BTreeMap::new(),
            deps: BTreeMap::new(),
            comments: BTreeMap::new(),
            worklog: BTreeMap::new(),
            attachments: BTreeMap::new(),
        }
    }
}

/// One broken aggregate invariant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvariantViolation {
    pub entity_id: String,
    pub message: String,
}

impl InvariantViolation {
    fn new(entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // ID allocation
    // =========================================================================

    /// Next counter for `prefix`; the caller formats it into a typed id.
    pub fn next_counter(&mut self, prefix: &str) -> u64 {
        let entry = self.next_ids.entry(prefix.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Mint the next id of type `T`; `next_id::<ItemId>()` yields `item-<n>`.
    pub fn next_id<T: AllocatedId>(&mut self) -> T {
        T::from_counter(self.next_counter(T::PREFIX))
    }

    /// Raise the counter for `prefix` so it never hands out `raw` again.
    pub fn observe_id(&mut self, raw: &str, prefix: &str) {
        if let Some(n) = counter_of(raw, prefix) {
            let entry = self.next_ids.entry(prefix.to_string()).or_insert(0);
            if *entry < n {
                *entry = n;
            }
        }
    }

    /// Counters become the max observed id per prefix; they never regress.
    pub fn rebuild_next_ids<'a>(&mut self, event_ids: impl IntoIterator<Item = &'a EventId>) {
        let observed: Vec<(String, &'static str)> = self
            .actors
            .keys()
            .map(|id| (id.as_str().to_string(), ActorId::PREFIX))
            .chain(self.projects.keys().map(|id| (id.as_str().to_string(), ProjectId::PREFIX)))
            .chain(self.outlines.keys().map(|id| (id.as_str().to_string(), OutlineId::PREFIX)))
            .chain(self.items.keys().map(|id| (id.as_str().to_string(), ItemId::PREFIX)))
            .chain(self.deps.keys().map(|id| (id.as_str().to_string(), DepId::PREFIX)))
            .chain(self.comments.keys().map(|id| (id.as_str().to_string(), CommentId::PREFIX)))
            .chain(self.worklog.keys().map(|id| (id.as_str().to_string(), WorklogId::PREFIX)))
            .chain(
                self.attachments
                    .keys()
                    .map(|id| (id.as_str().to_string(), AttachmentId::PREFIX)),
            )
            .chain(
                event_ids
                    .into_iter()
                    .map(|id| (id.as_str().to_string(), EventId::PREFIX)),
            )
            .collect();
        for (raw, prefix) in observed {
            self.observe_id(&raw, prefix);
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn actor(&self, id: &ActorId) -> Option<&Actor> {
        self.actors.get(id)
    }

    /// Actor by id, else by exact name.
    pub fn find_actor(&self, raw: &str) -> Option<&Actor> {
        let needle = raw.trim();
        self.actors
            .values()
            .find(|a| a.id.as_str() == needle)
            .or_else(|| self.actors.values().find(|a| a.name == needle))
    }

    /// `actor.userId` for agents, the actor itself for humans.
    pub fn owner_human(&self, id: &ActorId) -> Option<&ActorId> {
        self.actors.get(id).map(Actor::owner_human)
    }

    pub fn humans(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values().filter(|a| a.kind == ActorKind::Human)
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn outline(&self, id: &OutlineId) -> Option<&Outline> {
        self.outlines.get(id)
    }

    pub fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.get(id)
    }

    /// Outline of an item, when both resolve.
    pub fn outline_of(&self, item: &Item) -> Option<&Outline> {
        self.outlines.get(&item.outline_id)
    }

    /// Whether the item sits in an end state of its outline.
    pub fn is_done(&self, item: &Item) -> bool {
        match (&item.status_id, self.outline_of(item)) {
            (Some(status), Some(outline)) => outline.is_end_state(status),
            _ => false,
        }
    }

    /// Items sharing `outline` and `parent`, in display order.
    ///
    /// Ties on rank fall back to creation time, then id.
    pub fn siblings(&self, outline: &OutlineId, parent: Option<&ItemId>) -> Vec<&Item> {
        let mut out: Vec<&Item> = self
            .items
            .values()
            .filter(|i| &i.outline_id == outline && i.parent_id.as_ref() == parent)
            .collect();
        out.sort_by(|a, b| {
            a.rank
                .cmp(&b.rank)
                .then(a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    pub fn children(&self, id: &ItemId) -> Vec<&Item> {
        match self.items.get(id) {
            Some(item) => self.siblings(&item.outline_id, Some(id)),
            None => Vec::new(),
        }
    }

    /// Every descendant of `id`, parents before children.
    pub fn descendants(&self, id: &ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut queue = vec![id.clone()];
        let mut seen = BTreeSet::new();
        while let Some(next) = queue.pop() {
            for child in self.children(&next) {
                if seen.insert(child.id.clone()) {
                    out.push(child.id.clone());
                    queue.push(child.id.clone());
                }
            }
        }
        out
    }

    /// True when `ancestor` appears on the parent chain of `id` (or is `id`).
    pub fn is_self_or_ancestor(&self, ancestor: &ItemId, id: &ItemId) -> bool {
        let mut seen = BTreeSet::new();
        let mut cursor = Some(id.clone());
        while let Some(current) = cursor {
            if &current == ancestor {
                return true;
            }
            if !seen.insert(current.clone()) {
                return false;
            }
            cursor = self.items.get(&current).and_then(|i| i.parent_id.clone());
        }
        false
    }

    pub fn deps_from<'a>(&'a self, id: &'a ItemId) -> impl Iterator<Item = &'a Dependency> + 'a {
        self.deps.values().filter(move |d| &d.from_item_id == id)
    }

    pub fn deps_to<'a>(&'a self, id: &'a ItemId) -> impl Iterator<Item = &'a Dependency> + 'a {
        self.deps.values().filter(move |d| &d.to_item_id == id)
    }

    pub fn find_dep(&self, from: &ItemId, to: &ItemId, dep_type: DepType) -> Option<&Dependency> {
        self.deps
            .values()
            .find(|d| &d.from_item_id == from && &d.to_item_id == to && d.dep_type == dep_type)
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    /// Every violated aggregate invariant, in a stable order.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut out = Vec::new();

        for (id, actor) in &self.actors {
            if id != &actor.id {
                out.push(InvariantViolation::new(id.as_str(), "key does not match actor id"));
            }
            if actor.kind == ActorKind::Agent {
                match actor.user_id.as_ref().and_then(|u| self.actors.get(u)) {
                    Some(owner) if owner.kind == ActorKind::Human => {}
                    Some(_) => out.push(InvariantViolation::new(
                        id.as_str(),
                        "agent userId does not reference a human",
                    )),
                    None => out.push(InvariantViolation::new(
                        id.as_str(),
                        "agent userId does not resolve",
                    )),
                }
            }
        }

        for (id, outline) in &self.outlines {
            if !self.projects.contains_key(&outline.project_id) {
                out.push(InvariantViolation::new(
                    id.as_str(),
                    format!("project {} does not exist", outline.project_id),
                ));
            }
            if outline.status_defs.is_empty() {
                out.push(InvariantViolation::new(id.as_str(), "outline has no status definitions"));
            }
            let mut ids = BTreeSet::new();
            let mut labels = BTreeSet::new();
            for def in &outline.status_defs {
                if !ids.insert(def.id.clone()) {
                    out.push(InvariantViolation::new(
                        id.as_str(),
                        format!("duplicate status id {}", def.id),
                    ));
                }
                if !labels.insert(def.label.to_lowercase()) {
                    out.push(InvariantViolation::new(
                        id.as_str(),
                        format!("duplicate status label {}", def.label),
                    ));
                }
            }
        }

        for (id, item) in &self.items {
            if id != &item.id {
                out.push(InvariantViolation::new(id.as_str(), "key does not match item id"));
            }
            match self.outlines.get(&item.outline_id) {
                None => out.push(InvariantViolation::new(
                    id.as_str(),
                    format!("outline {} does not exist", item.outline_id),
                )),
                Some(outline) => {
                    if outline.project_id != item.project_id {
                        out.push(InvariantViolation::new(
                            id.as_str(),
                            "outline belongs to a different project",
                        ));
                    }
                    if let Some(status) = &item.status_id
                        && outline.status(status).is_none()
                    {
                        out.push(InvariantViolation::new(
                            id.as_str(),
                            format!("status {status} is not defined by outline {}", outline.id),
                        ));
                    }
                }
            }
            if let Some(parent_id) = &item.parent_id {
                match self.items.get(parent_id) {
                    None => out.push(InvariantViolation::new(
                        id.as_str(),
                        format!("parent {parent_id} does not exist"),
                    )),
                    Some(parent) if parent.outline_id != item.outline_id => {
                        out.push(InvariantViolation::new(
                            id.as_str(),
                            "parent lives in a different outline",
                        ))
                    }
                    Some(_) => {
                        if self.is_self_or_ancestor(id, parent_id) {
                            out.push(InvariantViolation::new(id.as_str(), "parent chain is cyclic"));
                        }
                    }
                }
            }
            if !self.actors.contains_key(&item.owner_actor_id) {
                out.push(InvariantViolation::new(
                    id.as_str(),
                    format!("owner {} does not exist", item.owner_actor_id),
                ));
            }
        }

        let mut blocking_pairs = BTreeSet::new();
        for (id, dep) in &self.deps {
            for end in [&dep.from_item_id, &dep.to_item_id] {
                if !self.items.contains_key(end) {
                    out.push(InvariantViolation::new(
                        id.as_str(),
                        format!("item {end} does not exist"),
                    ));
                }
            }
            if dep.dep_type == DepType::Blocks
                && !blocking_pairs.insert((dep.from_item_id.clone(), dep.to_item_id.clone()))
            {
                out.push(InvariantViolation::new(
                    id.as_str(),
                    format!(
                        "duplicate blocks edge {} -> {}",
                        dep.from_item_id, dep.to_item_id
                    ),
                ));
            }
        }

        for (id, comment) in &self.comments {
            if !self.items.contains_key(&comment.item_id) {
                out.push(InvariantViolation::new(
                    id.as_str(),
                    format!("item {} does not exist", comment.item_id),
                ));
            }
        }
        for (id, entry) in &self.worklog {
            if !self.items.contains_key(&entry.item_id) {
                out.push(InvariantViolation::new(
                    id.as_str(),
                    format!("item {} does not exist", entry.item_id),
                ));
            }
        }

        let mut probe = self.clone();
        probe.rebuild_next_ids(std::iter::empty());
        for (prefix, observed) in &probe.next_ids {
            let recorded = self.next_ids.get(prefix).copied().unwrap_or(0);
            if recorded < *observed {
                out.push(InvariantViolation::new(
                    prefix.as_str(),
                    format!("nextIds[{prefix}] = {recorded} is behind observed id {observed}"),
                ));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::OutlineStatusDef;
    use time::OffsetDateTime;

    fn human(n: u64) -> Actor {
        Actor {
            id: ActorId::from_counter(n),
            kind: ActorKind::Human,
            name: format!("human {n}"),
            user_id: None,
        }
    }

    fn seeded() -> State {
        let mut state = State::new();
        let owner = human(1);
        state.actors.insert(owner.id.clone(), owner);
        let project = Project {
            id: ProjectId::from_counter(1),
            name: "p".into(),
            created_by: ActorId::from_counter(1),
            created_at: OffsetDateTime::UNIX_EPOCH,
            archived: false,
        };
        state.projects.insert(project.id.clone(), project);
        let outline = Outline {
            id: OutlineId::from_counter(1),
            project_id: ProjectId::from_counter(1),
            name: None,
            status_defs: OutlineStatusDef::defaults(),
            created_by: ActorId::from_counter(1),
            created_at: OffsetDateTime::UNIX_EPOCH,
            archived: false,
        };
        state.outlines.insert(outline.id.clone(), outline);
        state
    }

    fn item(n: u64, rank: &str, parent: Option<u64>) -> Item {
        Item {
            id: ItemId::from_counter(n),
            project_id: ProjectId::from_counter(1),
            outline_id: OutlineId::from_counter(1),
            parent_id: parent.map(ItemId::from_counter),
            rank: rank.into(),
            title: format!("item {n}"),
            description: String::new(),
            status_id: None,
            priority: Default::default(),
            on_hold: false,
            due: None,
            schedule: None,
            tags: Vec::new(),
            archived: false,
            owner_actor_id: ActorId::from_counter(1),
            assigned_actor_id: None,
            owner_delegated_from: None,
            owner_delegated_at: None,
            created_by: ActorId::from_counter(1),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn next_counter_is_monotonic_per_prefix() {
        let mut state = State::new();
        assert_eq!(state.next_counter("item"), 1);
        assert_eq!(state.next_counter("item"), 2);
        assert_eq!(state.next_counter("act"), 1);
    }

    #[test]
    fn rebuild_never_regresses() {
        let mut state = seeded();
        state.next_ids.insert("item".into(), 40);
        state.items.insert(ItemId::from_counter(3), item(3, "h", None));
        state.rebuild_next_ids([&EventId::from_counter(9)]);
        assert_eq!(state.next_ids["item"], 40);
        assert_eq!(state.next_ids["evt"], 9);
        assert_eq!(state.next_ids["act"], 1);
    }

    #[test]
    fn siblings_break_rank_ties_by_creation_then_id() {
        let mut state = seeded();
        for (n, rank) in [(1, "h"), (2, "h"), (10, "a")] {
            state.items.insert(ItemId::from_counter(n), item(n, rank, None));
        }
        let order: Vec<&str> = state
            .siblings(&OutlineId::from_counter(1), None)
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(order, vec!["item-10", "item-1", "item-2"]);
    }

    #[test]
    fn descendants_and_ancestry() {
        let mut state = seeded();
        state.items.insert(ItemId::from_counter(1), item(1, "h", None));
        state.items.insert(ItemId::from_counter(2), item(2, "h", Some(1)));
        state.items.insert(ItemId::from_counter(3), item(3, "h", Some(2)));
        assert_eq!(
            state.descendants(&ItemId::from_counter(1)),
            vec![ItemId::from_counter(2), ItemId::from_counter(3)]
        );
        assert!(state.is_self_or_ancestor(&ItemId::from_counter(1), &ItemId::from_counter(3)));
        assert!(!state.is_self_or_ancestor(&ItemId::from_counter(3), &ItemId::from_counter(1)));
    }

    #[test]
    fn invariants_flag_dangling_references() {
        let mut state = seeded();
        state.next_ids.insert("item".into(), 5);
        state.next_ids.insert("act".into(), 1);
        state.next_ids.insert("proj".into(), 1);
        state.next_ids.insert("out".into(), 1);
        let mut orphan = item(5, "h", Some(99));
        orphan.owner_actor_id = ActorId::from_counter(42);
        state.items.insert(orphan.id.clone(), orphan);
        let violations = state.check_invariants();
        let messages: Vec<&str> = violations.iter().map(|v| v.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("parent item-99")));
        assert!(messages.iter().any(|m| m.contains("owner act-42")));
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn clean_state_has_no_violations() {
        let mut state = seeded();
        state.items.insert(ItemId::from_counter(1), item(1, "h", None));
        state.rebuild_next_ids(std::iter::empty());
        assert!(state.check_invariants().is_empty());
    }
}
