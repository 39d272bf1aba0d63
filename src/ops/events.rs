//! Reading the event log back.

use super::{Engine, OpError};
use crate::core::{Event, ItemId};

#[derive(Clone, Debug, Default)]
pub struct EventQuery {
    /// Events about this item, directly or through their payload.
    pub item: Option<String>,
    pub entity: Option<String>,
    /// Exact type or a family prefix such as `item.`.
    pub event_type: Option<String>,
    pub actor: Option<String>,
    /// Keep only the newest `limit` matches.
    pub limit: Option<usize>,
}

impl Engine {
    /// Matching events in log order, including ones this engine has not saved yet.
    pub fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, OpError> {
        let item = match &query.item {
            Some(raw) => Some(ItemId::parse(raw.trim())?),
            None => None,
        };
        let actor = match &query.actor {
            Some(raw) => Some(self.resolve_actor(raw)?.id.clone()),
            None => None,
        };
        let scan = self.store.log().scan()?;
        let mut out: Vec<Event> = scan
            .events
            .into_iter()
            .map(|(_, event)| event)
            .chain(self.unsaved().iter().cloned())
            .filter(|e| item.as_ref().is_none_or(|i| e.touches_item(i)))
            .filter(|e| query.entity.as_deref().is_none_or(|id| e.entity_id == id.trim()))
            .filter(|e| actor.as_ref().is_none_or(|a| &e.actor_id == a))
            .filter(|e| {
                query.event_type.as_deref().is_none_or(|ty| {
                    e.kind == ty || (ty.ends_with('.') && e.kind.starts_with(ty))
                })
            })
            .collect();
        if let Some(limit) = query.limit
            && out.len() > limit
        {
            out.drain(..out.len() - limit);
        }
        Ok(out)
    }

    /// History of one item.
    pub fn item_events(&self, raw: &str, limit: Option<usize>) -> Result<Vec<Event>, OpError> {
        let id = self.item(raw)?.id.clone();
        self.list_events(&EventQuery {
            item: Some(id.to_string()),
            limit,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DepType;
    use crate::ops::NewItem;
    use crate::ops::testkit;

    #[test]
    fn filters_by_item_type_and_limit() {
        let mut fx = testkit::seeded();
        let a = fx
            .create_item(NewItem {
                title: "a".into(),
                ..Default::default()
            })
            .unwrap();
        let b = fx
            .create_item(NewItem {
                title: "b".into(),
                ..Default::default()
            })
            .unwrap();
        fx.set_title(a.id.as_str(), "a2").unwrap();
        fx.add_dep(b.id.as_str(), a.id.as_str(), DepType::Related).unwrap();

        let kinds: Vec<String> = fx
            .item_events(a.id.as_str(), None)
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec!["item.create", "item.set_title", "dep.add"]);

        let items = fx
            .list_events(&EventQuery {
                event_type: Some("item.".into()),
                limit: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, "item.set_title");

        let all = fx.list_events(&EventQuery::default()).unwrap();
        assert_eq!(all.len(), fx.emitted().len());
    }
}
