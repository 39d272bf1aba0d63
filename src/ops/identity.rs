//! Actors: create, select, list.

use serde_json::json;

use super::{Engine, OpError};
use crate::core::event::IdentityCreatePayload;
use crate::core::{Actor, ActorId, ActorKind, EventType};

impl Engine {
    /// Register a human or agent.
    ///
    /// Agents need an owning human: `user` when given, else the current
    /// actor's owning human. The first human in a workspace becomes current
    /// even without `make_current`.
    pub fn create_identity(
        &mut self,
        kind: ActorKind,
        name: &str,
        user: Option<&str>,
        make_current: bool,
    ) -> Result<Actor, OpError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OpError::invalid("name", "must not be empty"));
        }
        if self.state.actors.values().any(|a| a.name == name) {
            return Err(OpError::Conflict(format!("an actor named `{name}` already exists")));
        }
        let user_id = match kind {
            ActorKind::Human => {
                if user.is_some() {
                    return Err(OpError::invalid("user", "only agents have an owning human"));
                }
                None
            }
            ActorKind::Agent => Some(self.owning_human_for_agent(user)?),
        };
        let current = self.current_actor_id().ok();
        let id = self.state.next_id::<ActorId>();
        let by = current.clone().unwrap_or_else(|| id.clone());
        self.emit(
            &by,
            EventType::IdentityCreate,
            id.as_str(),
            IdentityCreatePayload {
                kind,
                name: name.to_string(),
                user_id,
            },
        )?;
        let bootstrap = current.is_none() && kind == ActorKind::Human;
        if make_current || bootstrap {
            self.select_actor(&id)?;
        }
        tracing::info!(actor = %id, kind = kind.as_str(), "identity created");
        self.state
            .actor(&id)
            .cloned()
            .ok_or_else(|| OpError::not_found("actor", &id))
    }

    /// Make `raw` (id or exact name) the current actor.
    pub fn use_identity(&mut self, raw: &str) -> Result<Actor, OpError> {
        let actor = self.resolve_actor(raw)?.clone();
        self.select_actor(&actor.id)?;
        Ok(actor)
    }

    pub(crate) fn select_actor(&mut self, id: &ActorId) -> Result<(), OpError> {
        if self.state.current_actor_id.as_ref() == Some(id) {
            return Ok(());
        }
        self.emit(id, EventType::IdentityUse, id.as_str(), json!({}))?;
        Ok(())
    }

    pub fn actors(&self) -> Vec<&Actor> {
        self.state.actors.values().collect()
    }

    pub fn whoami(&self) -> Result<&Actor, OpError> {
        self.current_actor()
    }

    /// Human an agent created now would answer to.
    pub(crate) fn owning_human_for_agent(&self, user: Option<&str>) -> Result<ActorId, OpError> {
        match user {
            Some(raw) => {
                let actor = self.resolve_actor(raw)?;
                if actor.is_human() {
                    Ok(actor.id.clone())
                } else {
                    Err(OpError::invalid("user", format!("{} is not a human", actor.id)))
                }
            }
            None => {
                let current = self.current_actor().map_err(|_| {
                    OpError::invalid("user", "no owning human: pass --user or select a current actor")
                })?;
                Ok(current.owner_human().clone())
            }
        }
    }
}
