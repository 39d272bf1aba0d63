//! Dependencies between items.

use serde::Serialize;

use super::{Engine, OpError};
use crate::core::event::DepAddPayload;
use crate::core::{
    DepId, DepTreeNode, DepType, Dependency, EventType, ItemId, blocking_cycles, dep_tree,
};

/// How `deps remove` names an edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DepRef {
    Id(String),
    Edge {
        from: String,
        to: String,
        dep_type: DepType,
    },
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepLinks {
    pub outgoing: Vec<Dependency>,
    pub incoming: Vec<Dependency>,
}

impl Engine {
    /// `from` depends on `to`. Requires edit rights on `from`.
    pub fn add_dep(&mut self, from: &str, to: &str, dep_type: DepType) -> Result<Dependency, OpError> {
        let from = self.item(from)?.id.clone();
        let to = self.item(to)?.id.clone();
        if from == to {
            return Err(OpError::invalid("to", "an item cannot depend on itself"));
        }
        if let Some(existing) = self.state.find_dep(&from, &to, dep_type) {
            return Err(OpError::Conflict(format!(
                "{from} already {dep_type} {to} ({})",
                existing.id
            )));
        }
        let actor = self.require_item_edit(&from)?;
        let id = self.state.next_id::<DepId>();
        self.emit(
            &actor,
            EventType::DepAdd,
            id.as_str(),
            DepAddPayload {
                from_item_id: from,
                to_item_id: to,
                dep_type,
            },
        )?;
        self.dep(&id).cloned()
    }

    pub fn remove_dep(&mut self, target: &DepRef) -> Result<Dependency, OpError> {
        let dep = match target {
            DepRef::Id(raw) => self.dep(&DepId::parse(raw.trim())?)?.clone(),
            DepRef::Edge { from, to, dep_type } => {
                let from = self.item(from)?.id.clone();
                let to = self.item(to)?.id.clone();
                self.state
                    .find_dep(&from, &to, *dep_type)
                    .cloned()
                    .ok_or_else(|| OpError::not_found("dependency", format!("{from} {dep_type} {to}")))?
            }
        };
        let actor = self.require_item_edit(&dep.from_item_id)?;
        self.emit(&actor, EventType::DepRemove, dep.id.as_str(), serde_json::json!({}))?;
        Ok(dep)
    }

    pub fn dep_links(&self, item: &ItemId) -> DepLinks {
        DepLinks {
            outgoing: self.state.deps_from(item).cloned().collect(),
            incoming: self.state.deps_to(item).cloned().collect(),
        }
    }

    pub fn list_deps(&self, raw: &str) -> Result<DepLinks, OpError> {
        let id = self.item(raw)?.id.clone();
        Ok(self.dep_links(&id))
    }

    pub fn dep_tree(&self, raw: &str) -> Result<DepTreeNode, OpError> {
        let id = self.item(raw)?.id.clone();
        dep_tree(&self.state, &id).ok_or_else(|| OpError::not_found("item", raw))
    }

    /// Every `blocks` cycle, each listed once.
    pub fn dep_cycles(&self) -> Vec<Vec<ItemId>> {
        blocking_cycles(&self.state)
    }

    fn dep(&self, id: &DepId) -> Result<&Dependency, OpError> {
        self.state
            .deps
            .get(id)
            .ok_or_else(|| OpError::not_found("dependency", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ActorKind;
    use crate::ops::NewItem;
    use crate::ops::testkit::{self, act_as};

    fn items(fx: &mut testkit::Fixture, n: usize) -> Vec<ItemId> {
        (0..n)
            .map(|i| {
                fx.create_item(NewItem {
                    title: format!("item {i}"),
                    ..Default::default()
                })
                .unwrap()
                .id
            })
            .collect()
    }

    #[test]
    fn add_list_remove() {
        let mut fx = testkit::seeded();
        let ids = items(&mut fx, 2);
        let (a, b) = (ids[0].as_str(), ids[1].as_str());
        let dep = fx.add_dep(a, b, DepType::Blocks).unwrap();
        assert!(matches!(fx.add_dep(a, b, DepType::Blocks), Err(OpError::Conflict(_))));
        fx.add_dep(a, b, DepType::Related).unwrap();

        let links = fx.list_deps(b).unwrap();
        assert_eq!(links.incoming.len(), 2);
        assert!(links.outgoing.is_empty());

        let removed = fx
            .remove_dep(&DepRef::Edge {
                from: a.into(),
                to: b.into(),
                dep_type: DepType::Blocks,
            })
            .unwrap();
        assert_eq!(removed.id, dep.id);
        assert!(matches!(
            fx.remove_dep(&DepRef::Id(dep.id.to_string())),
            Err(OpError::NotFound { .. })
        ));
    }

    #[test]
    fn cycles_are_allowed_and_reported() {
        let mut fx = testkit::seeded();
        let ids = items(&mut fx, 3);
        fx.add_dep(ids[0].as_str(), ids[1].as_str(), DepType::Blocks).unwrap();
        fx.add_dep(ids[1].as_str(), ids[2].as_str(), DepType::Blocks).unwrap();
        fx.add_dep(ids[2].as_str(), ids[0].as_str(), DepType::Blocks).unwrap();
        assert_eq!(fx.dep_cycles().len(), 1);
        let tree = fx.dep_tree(ids[0].as_str()).unwrap();
        let repeat = &tree.children[0].children[0].children[0];
        assert_eq!(repeat.id, ids[0]);
        assert!(repeat.repeat);
    }

    #[test]
    fn only_editors_of_the_source_may_link() {
        let mut fx = testkit::seeded();
        let ids = items(&mut fx, 2);
        fx.create_identity(ActorKind::Human, "Bo", None, false).unwrap();
        act_as(&mut fx, "Bo");
        assert!(matches!(
            fx.add_dep(ids[0].as_str(), ids[1].as_str(), DepType::Blocks),
            Err(OpError::PermissionDenied(_))
        ));
    }
}
