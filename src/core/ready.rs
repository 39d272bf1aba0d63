//! Ready selection: what can be picked up right now.

use super::domain::DepType;
use super::identity::{ActorId, OutlineId, ProjectId};
use super::model::Item;
use super::state::State;

#[derive(Clone, Debug, Default)]
pub struct ReadyFilter {
    pub include_on_hold: bool,
    /// Also list items assigned to other actors.
    pub include_assigned: bool,
    pub project: Option<ProjectId>,
    pub outline: Option<OutlineId>,
    pub limit: Option<usize>,
}

/// Not archived, not on hold (unless allowed), not done, and every outgoing
/// `blocks` edge points at something archived or done.
pub fn is_ready(state: &State, item: &Item, include_on_hold: bool) -> bool {
    if item.archived || (item.on_hold && !include_on_hold) || state.is_done(item) {
        return false;
    }
    state
        .deps_from(&item.id)
        .filter(|dep| dep.dep_type == DepType::Blocks)
        .filter_map(|dep| state.item(&dep.to_item_id))
        .all(|target| target.archived || state.is_done(target))
}

/// Ready items, the current actor's assignments first, then by priority,
/// creation time and id.
pub fn ready_items<'a>(
    state: &'a State,
    current: Option<&ActorId>,
    filter: &ReadyFilter,
) -> Vec<&'a Item> {
    let mut out: Vec<&Item> = state
        .items
        .values()
        .filter(|item| filter.project.as_ref().is_none_or(|p| &item.project_id == p))
        .filter(|item| filter.outline.as_ref().is_none_or(|o| &item.outline_id == o))
        .filter(|item| {
            state.project(&item.project_id).is_none_or(|p| !p.archived)
                && state.outline(&item.outline_id).is_none_or(|o| !o.archived)
        })
        .filter(|item| match (&item.assigned_actor_id, current) {
            (Some(assignee), Some(me)) if assignee == me => true,
            (Some(_), _) => filter.include_assigned,
            (None, _) => true,
        })
        .filter(|item| is_ready(state, item, filter.include_on_hold))
        .collect();
    out.sort_by(|a, b| {
        let mine = |item: &Item| current.is_some() && item.assigned_actor_id.as_ref() == current;
        mine(b)
            .cmp(&mine(a))
            .then(a.priority.cmp(&b.priority))
            .then(a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    if let Some(limit) = filter.limit {
        out.truncate(limit);
    }
    out
}
