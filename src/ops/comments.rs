//! Comments and the private worklog.

use super::{Engine, OpError};
use crate::core::event::{CommentAddPayload, WorklogAddPayload};
use crate::core::{Comment, CommentId, EventType, ItemId, WorklogEntry, WorklogId, permission};

impl Engine {
    /// Any actor may comment on any item.
    pub fn add_comment(
        &mut self,
        item: &str,
        body: &str,
        reply_to: Option<&str>,
    ) -> Result<Comment, OpError> {
        let item = self.item(item)?.id.clone();
        let body = non_empty_body(body)?;
        let reply_to = match reply_to {
            Some(raw) => {
                let id = CommentId::parse(raw.trim())?;
                match self.state.comments.get(&id) {
                    Some(parent) if parent.item_id == item => Some(id),
                    Some(_) => {
                        return Err(OpError::invalid("reply-to", format!("{id} is not on {item}")));
                    }
                    None => return Err(OpError::not_found("comment", &id)),
                }
            }
            None => None,
        };
        let actor = self.current_actor_id()?;
        let id = self.state.next_id::<CommentId>();
        self.emit(
            &actor,
            EventType::CommentAdd,
            id.as_str(),
            CommentAddPayload {
                item_id: item,
                reply_to_comment_id: reply_to,
                body,
            },
        )?;
        self.state
            .comments
            .get(&id)
            .cloned()
            .ok_or_else(|| OpError::not_found("comment", &id))
    }

    /// Comments on `item`, oldest first.
    pub fn comments_of(&self, item: &ItemId) -> Vec<&Comment> {
        let mut out: Vec<&Comment> = self
            .state
            .comments
            .values()
            .filter(|c| &c.item_id == item)
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn list_comments(&self, item: &str) -> Result<Vec<&Comment>, OpError> {
        let id = self.item(item)?.id.clone();
        Ok(self.comments_of(&id))
    }

    pub fn add_worklog(&mut self, item: &str, body: &str) -> Result<WorklogEntry, OpError> {
        let item = self.item(item)?.id.clone();
        let body = non_empty_body(body)?;
        let actor = self.current_actor_id()?;
        let id = self.state.next_id::<WorklogId>();
        self.emit(
            &actor,
            EventType::WorklogAdd,
            id.as_str(),
            WorklogAddPayload {
                item_id: item,
                body,
            },
        )?;
        self.state
            .worklog
            .get(&id)
            .cloned()
            .ok_or_else(|| OpError::not_found("worklog entry", &id))
    }

    /// Worklog entries on `item` written under the acting identity's owning
    /// human. Without an acting identity nothing is visible.
    pub fn visible_worklog(&self, item: &ItemId) -> Vec<&WorklogEntry> {
        let Ok(viewer) = self.current_actor_id() else {
            return Vec::new();
        };
        let mut out: Vec<&WorklogEntry> = self
            .state
            .worklog
            .values()
            .filter(|w| &w.item_id == item)
            .filter(|w| permission::same_owning_human(&self.state, &viewer, &w.author_id))
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn list_worklog(&self, item: &str) -> Result<Vec<&WorklogEntry>, OpError> {
        let id = self.item(item)?.id.clone();
        self.current_actor_id()?;
        Ok(self.visible_worklog(&id))
    }
}

fn non_empty_body(body: &str) -> Result<String, OpError> {
    if body.trim().is_empty() {
        Err(OpError::invalid("body", "must not be empty"))
    } else {
        Ok(body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::ActorKind;
    use crate::ops::testkit::{self, act_as};
    use crate::ops::{NewItem, OpError};

    #[test]
    fn anyone_comments_and_replies_stay_on_the_item() {
        let mut fx = testkit::seeded();
        let item = fx
            .create_item(NewItem {
                title: "x".into(),
                ..Default::default()
            })
            .unwrap();
        let other = fx
            .create_item(NewItem {
                title: "y".into(),
                ..Default::default()
            })
            .unwrap();
        fx.create_identity(ActorKind::Human, "Bo", None, false).unwrap();
        act_as(&mut fx, "Bo");
        let first = fx.add_comment(item.id.as_str(), "looks good", None).unwrap();
        let reply = fx
            .add_comment(item.id.as_str(), "agreed", Some(first.id.as_str()))
            .unwrap();
        assert_eq!(reply.reply_to_comment_id, Some(first.id.clone()));
        assert!(matches!(
            fx.add_comment(other.id.as_str(), "wrong thread", Some(first.id.as_str())),
            Err(OpError::InvalidArgument { .. })
        ));
        assert_eq!(fx.list_comments(item.id.as_str()).unwrap().len(), 2);
    }

    #[test]
    fn worklog_is_private_to_the_owning_human() {
        let mut fx = testkit::seeded();
        let item = fx
            .create_item(NewItem {
                title: "x".into(),
                ..Default::default()
            })
            .unwrap();
        fx.create_identity(ActorKind::Agent, "s1 bot", None, false).unwrap();
        fx.create_identity(ActorKind::Human, "Bo", None, false).unwrap();

        act_as(&mut fx, "s1 bot");
        fx.add_worklog(item.id.as_str(), "tried the obvious fix").unwrap();
        act_as(&mut fx, "Hana");
        assert_eq!(fx.list_worklog(item.id.as_str()).unwrap().len(), 1);
        act_as(&mut fx, "Bo");
        assert!(fx.list_worklog(item.id.as_str()).unwrap().is_empty());
        assert!(fx.show_item(item.id.as_str()).unwrap().worklog.is_empty());
    }
}
