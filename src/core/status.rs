//! Completion gating for end-state transitions.

use super::domain::DepType;
use super::identity::ItemId;
use super::state::State;

/// What keeps an item from entering an end state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompletionBlockers {
    pub children: Vec<ItemId>,
    pub dependencies: Vec<ItemId>,
}

impl CompletionBlockers {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.dependencies.is_empty()
    }

    /// `None` when nothing blocks.
    pub fn message(&self, item: &ItemId) -> Option<String> {
        let reason = match (self.children.is_empty(), self.dependencies.is_empty()) {
            (true, true) => return None,
            (false, true) => "incomplete children".to_string(),
            (true, false) => "incomplete dependencies".to_string(),
            (false, false) => "incomplete children and incomplete dependencies".to_string(),
        };
        Some(format!("item {item} has {reason}"))
    }
}

/// Non-archived children with a set, non-end status; and `blocks` targets
/// that are neither archived nor done. Children without a status never block.
pub fn completion_blockers(state: &State, id: &ItemId) -> CompletionBlockers {
    let children = state
        .children(id)
        .into_iter()
        .filter(|child| !child.archived && child.status_id.is_some() && !state.is_done(child))
        .map(|child| child.id.clone())
        .collect();
    let dependencies = state
        .deps_from(id)
        .filter(|dep| dep.dep_type == DepType::Blocks)
        .filter_map(|dep| state.item(&dep.to_item_id))
        .filter(|target| !target.archived && !state.is_done(target))
        .map(|target| target.id.clone())
        .collect();
    CompletionBlockers {
        children,
        dependencies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_each_blocker_kind() {
        let id = ItemId::from_counter(1);
        let both = CompletionBlockers {
            children: vec![ItemId::from_counter(2)],
            dependencies: vec![ItemId::from_counter(3)],
        };
        assert_eq!(
            both.message(&id).unwrap(),
            "item item-1 has incomplete children and incomplete dependencies"
        );
        let deps_only = CompletionBlockers {
            children: Vec::new(),
            dependencies: vec![ItemId::from_counter(3)],
        };
        assert_eq!(
            deps_only.message(&id).unwrap(),
            "item item-1 has incomplete dependencies"
        );
        assert!(CompletionBlockers::default().message(&id).is_none());
    }
}
