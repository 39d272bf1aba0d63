//! Dependency graph queries: cycles and trees.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::domain::DepType;
use super::identity::{ItemId, StatusId};
use super::state::State;

/// Cycles among `blocks` edges.
///
/// Each cycle starts and ends at the same item and is rotated so its smallest
/// id comes first; rotations of one cycle are reported once. Output order is
/// deterministic.
pub fn blocking_cycles(state: &State) -> Vec<Vec<ItemId>> {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum VisitState {
        Visiting,
        Visited,
    }

    let mut adjacency: BTreeMap<ItemId, Vec<ItemId>> = BTreeMap::new();
    let mut nodes: BTreeSet<ItemId> = BTreeSet::new();
    for dep in state.deps.values() {
        if dep.dep_type != DepType::Blocks {
            continue;
        }
        nodes.insert(dep.from_item_id.clone());
        nodes.insert(dep.to_item_id.clone());
        adjacency
            .entry(dep.from_item_id.clone())
            .or_default()
            .push(dep.to_item_id.clone());
    }
    for targets in adjacency.values_mut() {
        targets.sort();
        targets.dedup();
    }

    fn normalize(cycle: &[ItemId]) -> Vec<ItemId> {
        let mut base = cycle.to_vec();
        if base.len() > 1 && base.first() == base.last() {
            base.pop();
        }
        let Some(start) = base
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(i, _)| i)
        else {
            return base;
        };
        base.rotate_left(start);
        let first = base[0].clone();
        base.push(first);
        base
    }

    struct Walk<'a> {
        adjacency: &'a BTreeMap<ItemId, Vec<ItemId>>,
        state: BTreeMap<ItemId, VisitState>,
        stack: Vec<ItemId>,
        seen: BTreeSet<Vec<ItemId>>,
        cycles: Vec<Vec<ItemId>>,
    }

    impl Walk<'_> {
        fn dfs(&mut self, node: &ItemId) {
            self.state.insert(node.clone(), VisitState::Visiting);
            self.stack.push(node.clone());
            let targets = self.adjacency.get(node).cloned().unwrap_or_default();
            for target in &targets {
                match self.state.get(target) {
                    Some(VisitState::Visiting) => {
                        if let Some(pos) = self.stack.iter().position(|id| id == target) {
                            let mut cycle = self.stack[pos..].to_vec();
                            cycle.push(target.clone());
                            let normalized = normalize(&cycle);
                            if self.seen.insert(normalized.clone()) {
                                self.cycles.push(normalized);
                            }
                        }
                    }
                    Some(VisitState::Visited) => {}
                    None => self.dfs(target),
                }
            }
            self.stack.pop();
            self.state.insert(node.clone(), VisitState::Visited);
        }
    }

    let mut walk = Walk {
        adjacency: &adjacency,
        state: BTreeMap::new(),
        stack: Vec::new(),
        seen: BTreeSet::new(),
        cycles: Vec::new(),
    };
    for node in &nodes {
        if !walk.state.contains_key(node) {
            walk.dfs(node);
        }
    }
    let mut cycles = walk.cycles;
    cycles.sort();
    cycles
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepTreeNode {
    pub id: ItemId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<StatusId>,
    /// Edge type that led here; `None` for the root.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub dep_type: Option<DepType>,
    /// Already expanded elsewhere in this tree; children omitted.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub repeat: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DepTreeNode>,
}

/// Out-edge expansion from `root`. A node seen before is emitted once more
/// with `repeat: true` and is not expanded again, which also terminates cycles.
pub fn dep_tree(state: &State, root: &ItemId) -> Option<DepTreeNode> {
    let item = state.item(root)?;
    let mut visited = BTreeSet::new();
    visited.insert(root.clone());
    Some(DepTreeNode {
        id: root.clone(),
        title: item.title.clone(),
        status_id: item.status_id.clone(),
        dep_type: None,
        repeat: false,
        children: expand(state, root, &mut visited),
    })
}

fn expand(state: &State, from: &ItemId, visited: &mut BTreeSet<ItemId>) -> Vec<DepTreeNode> {
    let mut edges: Vec<(ItemId, DepType)> = state
        .deps_from(from)
        .map(|d| (d.to_item_id.clone(), d.dep_type))
        .collect();
    edges.sort();
    let mut out = Vec::with_capacity(edges.len());
    for (to, dep_type) in edges {
        let (title, status_id) = state
            .item(&to)
            .map(|i| (i.title.clone(), i.status_id.clone()))
            .unwrap_or_default();
        if !visited.insert(to.clone()) {
            out.push(DepTreeNode {
                id: to,
                title,
                status_id,
                dep_type: Some(dep_type),
                repeat: true,
                children: Vec::new(),
            });
            continue;
        }
        let children = expand(state, &to, visited);
        out.push(DepTreeNode {
            id: to,
            title,
            status_id,
            dep_type: Some(dep_type),
            repeat: false,
            children,
        });
    }
    out
}
