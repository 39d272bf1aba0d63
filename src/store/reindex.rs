//! Rebuild the snapshot from the event log.

use serde::Serialize;

use super::replay::{ReplayReport, replay};
use super::{Store, StoreError, snapshot};
use crate::core::{ActorId, ProjectId, State};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexReport {
    #[serde(flatten)]
    pub replay: ReplayReport,
    pub event_count: usize,
    pub malformed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_actor_id: Option<ActorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_project_id: Option<ProjectId>,
}

/// Replay the log, carry the local UI hints over from the previous snapshot
/// when they still resolve, and save.
pub fn reindex(store: &Store) -> Result<(State, ReindexReport), StoreError> {
    let previous = match snapshot::load(&store.layout().snapshot()) {
        Ok(state) => state,
        Err(err) => {
            tracing::warn!("previous snapshot unreadable, hints dropped: {err}");
            None
        }
    };
    let scan = store.log().scan()?;
    let replayed = replay(scan.iter());
    let mut state = replayed.state;

    if let Some(prev) = previous {
        if let Some(actor) = prev.current_actor_id
            && state.actors.contains_key(&actor)
        {
            state.current_actor_id = Some(actor);
        }
        if let Some(project) = prev.current_project_id
            && state.projects.contains_key(&project)
        {
            state.current_project_id = Some(project);
        }
    }
    if state
        .current_actor_id
        .as_ref()
        .is_some_and(|id| !state.actors.contains_key(id))
    {
        state.current_actor_id = None;
    }
    if state.current_actor_id.is_none() {
        let only_human = {
            let mut humans = state.humans();
            match (humans.next(), humans.next()) {
                (Some(only), None) => Some(only.id.clone()),
                _ => None,
            }
        };
        if let Some(id) = only_human {
            tracing::info!(actor = %id, "selecting the only human as current actor");
            state.current_actor_id = Some(id);
        }
    }

    store.save(&state)?;
    let report = ReindexReport {
        replay: replayed.report,
        event_count: scan.events.len(),
        malformed_count: scan.malformed.len(),
        current_actor_id: state.current_actor_id.clone(),
        current_project_id: state.current_project_id.clone(),
    };
    tracing::info!(
        events = report.event_count,
        applied = report.replay.applied_count,
        "reindex complete"
    );
    Ok((state, report))
}
