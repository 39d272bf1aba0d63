//! Ordering planner: where a moved item lands among its siblings.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::identity::ItemId;
use super::rank;

/// Rank for the moved item plus any sibling ranks that must change with it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankPlan {
    pub rank: String,
    /// Full new ranking of the set when the fallback ran; empty otherwise.
    pub rebalance: BTreeMap<ItemId, String>,
    pub used_fallback: bool,
}

impl RankPlan {
    pub fn rebalance_count(&self) -> usize {
        self.rebalance.len()
    }
}

/// Plan a rank so `moved` ends up at `index` within `siblings`.
///
/// `siblings` is the destination set in display order; it may or may not
/// contain `moved` (a re-parent brings it from elsewhere). `index` counts
/// positions among the other siblings and is clamped to the end.
pub fn plan_insert(siblings: &[(ItemId, String)], moved: &ItemId, index: usize) -> RankPlan {
    let others: Vec<&(ItemId, String)> = siblings.iter().filter(|(id, _)| id != moved).collect();
    let index = index.min(others.len());

    let mut seen = BTreeSet::new();
    let has_duplicates = others.iter().any(|(_, r)| !seen.insert(r.as_str()));

    if !has_duplicates {
        let lower = index.checked_sub(1).and_then(|i| others.get(i)).map(|(_, r)| r.as_str());
        let upper = others.get(index).map(|(_, r)| r.as_str());
        let fitted = match (lower, upper) {
            (None, None) => Some(rank::INITIAL.to_string()),
            (Some(lo), None) => rank::after(lo),
            (None, Some(hi)) => rank::before(hi),
            (Some(lo), Some(hi)) => rank::between(lo, hi),
        };
        if let Some(rank) = fitted {
            return RankPlan {
                rank,
                rebalance: BTreeMap::new(),
                used_fallback: false,
            };
        }
    }

    let mut order: Vec<&ItemId> = others.iter().map(|(id, _)| id).collect();
    order.insert(index, moved);
    let ranks = rank::spread(order.len());
    let rebalance: BTreeMap<ItemId, String> = order
        .into_iter()
        .cloned()
        .zip(ranks)
        .collect();
    let rank = rebalance
        .get(moved)
        .cloned()
        .unwrap_or_else(|| rank::INITIAL.to_string());
    RankPlan {
        rank,
        rebalance,
        used_fallback: true,
    }
}

/// Index among the other siblings that puts the moved item right before or
/// after `anchor`; `None` when the anchor is not a sibling.
pub fn anchor_index(
    siblings: &[(ItemId, String)],
    moved: &ItemId,
    anchor: &ItemId,
    after: bool,
) -> Option<usize> {
    let pos = siblings
        .iter()
        .filter(|(id, _)| id != moved)
        .position(|(id, _)| id == anchor)?;
    Some(if after { pos + 1 } else { pos })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ranks: &[(u64, &str)]) -> Vec<(ItemId, String)> {
        ranks
            .iter()
            .map(|(n, r)| (ItemId::from_counter(*n), r.to_string()))
            .collect()
    }

    fn apply(siblings: &[(ItemId, String)], moved: &ItemId, plan: &RankPlan) -> Vec<ItemId> {
        let mut ranked: Vec<(String, ItemId)> = siblings
            .iter()
            .filter(|(id, _)| id != moved)
            .map(|(id, r)| (plan.rebalance.get(id).cloned().unwrap_or_else(|| r.clone()), id.clone()))
            .collect();
        ranked.push((plan.rank.clone(), moved.clone()));
        ranked.sort();
        ranked.into_iter().map(|(_, id)| id).collect()
    }

    #[test]
    fn midpoint_between_neighbours() {
        let siblings = set(&[(1, "a"), (2, "c"), (3, "x")]);
        let moved = ItemId::from_counter(3);
        let plan = plan_insert(&siblings, &moved, 1);
        assert_eq!(plan.rank, "b");
        assert!(!plan.used_fallback);
        assert_eq!(
            apply(&siblings, &moved, &plan),
            vec![ItemId::from_counter(1), moved.clone(), ItemId::from_counter(2)]
        );
    }

    #[test]
    fn duplicate_ranks_force_rebalance() {
        let siblings = set(&[(1, "h"), (2, "h"), (3, "h")]);
        let moved = ItemId::from_counter(3);
        let index = anchor_index(&siblings, &moved, &ItemId::from_counter(2), false).unwrap();
        let plan = plan_insert(&siblings, &moved, index);
        assert!(plan.used_fallback);
        assert_eq!(plan.rebalance_count(), 3);
        assert_eq!(
            apply(&siblings, &moved, &plan),
            vec![ItemId::from_counter(1), ItemId::from_counter(3), ItemId::from_counter(2)]
        );
    }

    #[test]
    fn no_room_falls_back() {
        let siblings = set(&[(1, "a"), (2, "a0"), (3, "q")]);
        let moved = ItemId::from_counter(3);
        let plan = plan_insert(&siblings, &moved, 1);
        assert!(plan.used_fallback);
        assert_eq!(
            apply(&siblings, &moved, &plan),
            vec![ItemId::from_counter(1), moved.clone(), ItemId::from_counter(2)]
        );
    }

    #[test]
    fn edges_and_empty_sets() {
        let moved = ItemId::from_counter(9);
        assert_eq!(plan_insert(&[], &moved, 0).rank, "h");
        let siblings = set(&[(1, "h")]);
        assert_eq!(plan_insert(&siblings, &moved, 0).rank, "g");
        assert_eq!(plan_insert(&siblings, &moved, 5).rank, "i");
    }
}
