//! Deterministic replay of the event log into the aggregate.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::{ApplyMode, ApplyOutcome, Event, EventId, State, apply_event};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub applied_count: usize,
    pub skipped_count: usize,
    /// Unknown event types and how often each appeared.
    pub skipped_types: BTreeMap<String, usize>,
    pub duplicate_count: usize,
    /// Distinct events sharing an id, as minted by two clones.
    pub collision_count: usize,
    pub rejected_count: usize,
    /// Rule checks overridden while applying.
    pub override_count: usize,
}

/// An event that could not be applied at all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub event_id: EventId,
    pub event_type: String,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub struct Replayed {
    pub state: State,
    pub report: ReplayReport,
    pub rejections: Vec<Rejection>,
}

/// Apply `events` in order, leniently, to an empty aggregate.
///
/// An exact repeat of an event applies once; a different event that reuses
/// an id (two clones counting independently) still applies. Counters end at
/// the maximum id observed per prefix, so replaying the same log twice yields
/// the same aggregate.
pub fn replay<'a>(events: impl IntoIterator<Item = &'a Event>) -> Replayed {
    let mut state = State::new();
    let mut report = ReplayReport::default();
    let mut rejections = Vec::new();
    let mut seen: BTreeMap<EventId, Vec<&'a Event>> = BTreeMap::new();

    for event in events {
        let same_id = seen.entry(event.id.clone()).or_default();
        if same_id.iter().any(|prev| *prev == event) {
            report.duplicate_count += 1;
            continue;
        }
        if !same_id.is_empty() {
            tracing::warn!(event_id = %event.id, "event id reused by a different event");
            report.collision_count += 1;
        }
        same_id.push(event);
        let ty = event.event_type();
        if !ty.is_known() {
            report.skipped_count += 1;
            *report.skipped_types.entry(event.kind.clone()).or_insert(0) += 1;
            continue;
        }
        match apply_event(&mut state, event, ApplyMode::Lenient) {
            Ok(ApplyOutcome {
                skipped: true,
                overridden,
            }) => {
                report.skipped_count += 1;
                report.override_count += overridden.len();
            }
            Ok(outcome) => {
                report.applied_count += 1;
                report.override_count += outcome.overridden.len();
            }
            Err(err) => {
                tracing::warn!(event_id = %event.id, event_type = %event.kind, "replay rejected event: {err}");
                report.rejected_count += 1;
                rejections.push(Rejection {
                    event_id: event.id.clone(),
                    event_type: event.kind.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    state.rebuild_next_ids(seen.keys());
    tracing::debug!(
        applied = report.applied_count,
        skipped = report.skipped_count,
        rejected = report.rejected_count,
        "replay finished"
    );
    Replayed {
        state,
        report,
        rejections,
    }
}
