//! Owner-based edit permission with delegation grace.

use time::{Duration, OffsetDateTime};

use super::identity::ActorId;
use super::model::Item;
use super::state::State;

/// Default delegation grace window.
pub const DEFAULT_GRACE_SECONDS: u64 = 3600;

/// Why `actor` may edit an item; `None` from [`edit_grant`] means denied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditGrant {
    Owner,
    /// Human editing an item owned by one of their agents.
    OwningHuman,
    /// Previous owner inside the delegation grace window.
    Delegated,
}

pub fn edit_grant(
    state: &State,
    actor: &ActorId,
    item: &Item,
    now: OffsetDateTime,
    grace: Duration,
) -> Option<EditGrant> {
    if actor == &item.owner_actor_id {
        return Some(EditGrant::Owner);
    }
    if let (Some(editor), Some(owner)) = (state.actor(actor), state.actor(&item.owner_actor_id))
        && editor.is_human()
        && !owner.is_human()
        && owner.owner_human() == actor
    {
        return Some(EditGrant::OwningHuman);
    }
    if item.owner_delegated_from.as_ref() == Some(actor)
        && let Some(at) = item.owner_delegated_at
        && now - at < grace
    {
        return Some(EditGrant::Delegated);
    }
    None
}

pub fn can_edit(
    state: &State,
    actor: &ActorId,
    item: &Item,
    now: OffsetDateTime,
    grace: Duration,
) -> bool {
    edit_grant(state, actor, item, now, grace).is_some()
}

/// Both actors resolve and answer to the same human.
pub fn same_owning_human(state: &State, a: &ActorId, b: &ActorId) -> bool {
    match (state.owner_human(a), state.owner_human(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

pub fn grace_from_seconds(seconds: u64) -> Duration {
    Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::ActorKind;
    use crate::core::identity::{ItemId, OutlineId, ProjectId};
    use crate::core::model::Actor;

    fn actor(n: u64, kind: ActorKind, user: Option<u64>) -> Actor {
        Actor {
            id: ActorId::from_counter(n),
            kind,
            name: format!("a{n}"),
            user_id: user.map(ActorId::from_counter),
        }
    }

    fn state() -> State {
        let mut state = State::new();
        for a in [
            actor(1, ActorKind::Human, None),
            actor(2, ActorKind::Agent, Some(1)),
            actor(3, ActorKind::Agent, Some(1)),
            actor(4, ActorKind::Human, None),
        ] {
            state.actors.insert(a.id.clone(), a);
        }
        state
    }

    fn item(owner: u64) -> Item {
        Item {
            id: ItemId::from_counter(1),
            project_id: ProjectId::from_counter(1),
            outline_id: OutlineId::from_counter(1),
            parent_id: None,
            rank: "h".into(),
            title: "x".into(),
            description: String::new(),
            status_id: None,
            priority: Default::default(),
            on_hold: false,
            due: None,
            schedule: None,
            tags: Vec::new(),
            archived: false,
            owner_actor_id: ActorId::from_counter(owner),
            assigned_actor_id: None,
            owner_delegated_from: None,
            owner_delegated_at: None,
            created_by: ActorId::from_counter(owner),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn owner_and_owning_human_may_edit() {
        let state = state();
        let now = OffsetDateTime::UNIX_EPOCH;
        let grace = grace_from_seconds(DEFAULT_GRACE_SECONDS);
        let owned_by_agent = item(2);
        assert_eq!(
            edit_grant(&state, &ActorId::from_counter(2), &owned_by_agent, now, grace),
            Some(EditGrant::Owner)
        );
        assert_eq!(
            edit_grant(&state, &ActorId::from_counter(1), &owned_by_agent, now, grace),
            Some(EditGrant::OwningHuman)
        );
        // A sibling agent or an unrelated human may not.
        assert!(!can_edit(&state, &ActorId::from_counter(3), &owned_by_agent, now, grace));
        assert!(!can_edit(&state, &ActorId::from_counter(4), &owned_by_agent, now, grace));
    }

    #[test]
    fn agent_cannot_edit_its_humans_item() {
        let state = state();
        let grace = grace_from_seconds(DEFAULT_GRACE_SECONDS);
        assert!(!can_edit(
            &state,
            &ActorId::from_counter(2),
            &item(1),
            OffsetDateTime::UNIX_EPOCH,
            grace
        ));
    }

    #[test]
    fn delegation_expires_after_grace() {
        let state = state();
        let mut delegated = item(3);
        delegated.owner_delegated_from = Some(ActorId::from_counter(2));
        delegated.owner_delegated_at = Some(OffsetDateTime::UNIX_EPOCH);
        let grace = grace_from_seconds(60);
        let previous = ActorId::from_counter(2);

        let inside = OffsetDateTime::UNIX_EPOCH + Duration::seconds(59);
        assert_eq!(
            edit_grant(&state, &previous, &delegated, inside, grace),
            Some(EditGrant::Delegated)
        );
        let outside = OffsetDateTime::UNIX_EPOCH + Duration::seconds(60);
        assert!(!can_edit(&state, &previous, &delegated, outside, grace));
        assert!(!can_edit(&state, &previous, &delegated, inside, grace_from_seconds(0)));
    }

    #[test]
    fn same_owning_human_groups_agents() {
        let state = state();
        assert!(same_owning_human(&state, &ActorId::from_counter(2), &ActorId::from_counter(3)));
        assert!(same_owning_human(&state, &ActorId::from_counter(1), &ActorId::from_counter(3)));
        assert!(!same_owning_human(&state, &ActorId::from_counter(4), &ActorId::from_counter(3)));
    }
}
