//! Session-scoped agent identities.
//!
//! An agent identity is keyed by a short session token: every invocation that
//! presents the same session under the same human resolves to the same actor.

use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::items::ClaimOutcome;
use super::{Engine, OpError};
use crate::core::{Actor, ActorKind};

const DEFAULT_DISPLAY_NAME: &str = "agent";
const LEGACY_SESSION_TAG: &str = "[agent-session:";

/// Unset fields fall back to the caller's environment (see the CLI) and then
/// to defaults: a random session, display name `agent`, and the current
/// actor's owning human.
#[derive(Clone, Debug, Default)]
pub struct AgentRequest {
    pub session: Option<String>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub make_current: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsuredAgent {
    pub actor: Actor,
    pub created: bool,
    pub session: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStart {
    pub agent: EnsuredAgent,
    pub claim: ClaimOutcome,
}

impl Engine {
    pub fn ensure_agent(&mut self, req: &AgentRequest) -> Result<EnsuredAgent, OpError> {
        let session = match req.session.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => normalize_session(raw),
            _ => random_session(),
        };
        let human = self.owning_human_for_agent(req.user.as_deref())?;
        let prefix = format!("{session} ");
        let legacy = format!("{LEGACY_SESSION_TAG}{session}]");
        let existing = self
            .state
            .actors
            .values()
            .filter(|a| a.kind == ActorKind::Agent && a.user_id.as_ref() == Some(&human))
            .find(|a| a.name.starts_with(&prefix) || a.name.starts_with(&legacy))
            .cloned();

        let (actor, created) = match existing {
            Some(actor) => {
                if req.make_current {
                    self.select_actor(&actor.id)?;
                }
                (actor, false)
            }
            None => {
                let display = req
                    .name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .unwrap_or(DEFAULT_DISPLAY_NAME);
                let name = format!("{session} {display}");
                let actor = self.create_identity(
                    ActorKind::Agent,
                    &name,
                    Some(human.as_str()),
                    req.make_current,
                )?;
                (actor, true)
            }
        };
        tracing::info!(actor = %actor.id, session = %session, created, "agent ensured");
        Ok(EnsuredAgent {
            actor,
            created,
            session,
        })
    }

    /// Ensure the session agent, make it current, and claim `item` as it.
    pub fn agent_start(
        &mut self,
        item: &str,
        req: &AgentRequest,
        take_assigned: bool,
    ) -> Result<AgentStart, OpError> {
        let req = AgentRequest {
            make_current: true,
            ..req.clone()
        };
        let agent = self.ensure_agent(&req)?;
        let claim = self.claim_as(&agent.actor.id, item, take_assigned)?;
        Ok(AgentStart { agent, claim })
    }
}

/// Whitespace collapses to `-`; a trailing `-YYYY-MM-DD` is swapped for a
/// stable three-letter suffix derived from the full input.
pub fn normalize_session(raw: &str) -> String {
    let token: String = raw
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    match strip_date_suffix(&token) {
        Some(base) => format!("{base}-{}", hash_letters(&token)),
        None => token,
    }
}

fn strip_date_suffix(token: &str) -> Option<&str> {
    let split = token.len().checked_sub(11)?;
    let (base, suffix) = (token.get(..split)?, token.get(split..)?);
    let bytes = suffix.as_bytes();
    let shape = bytes.iter().enumerate().all(|(i, b)| match i {
        0 | 5 | 8 => *b == b'-',
        _ => b.is_ascii_digit(),
    });
    shape.then_some(base)
}

fn hash_letters(raw: &str) -> String {
    Sha256::digest(raw.as_bytes())
        .iter()
        .take(3)
        .map(|b| char::from(b'a' + b % 26))
        .collect()
}

fn random_session() -> String {
    let mut rng = rand::rng();
    (0..3).map(|_| char::from(rng.random_range(b'a'..=b'z'))).collect()
}
