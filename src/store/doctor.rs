//! Event-log diagnostics.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use super::event_log::LogScan;
use super::replay::replay;
use crate::core::{Event, EventType};

/// Default tolerated backwards clock skew between consecutive events.
pub const DEFAULT_TIME_REGRESSION_ALLOWANCE_SECS: u64 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl Issue {
    fn new(severity: Severity, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            line: None,
            event_id: None,
        }
    }

    fn at(mut self, line: usize, event: &Event) -> Self {
        self.line = Some(line);
        self.event_id = Some(event.id.to_string());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorReport {
    pub issues: Vec<Issue>,
    pub has_errors: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct DoctorOptions {
    pub time_regression_allowance: Duration,
}

impl Default for DoctorOptions {
    fn default() -> Self {
        Self {
            time_regression_allowance: Duration::seconds(DEFAULT_TIME_REGRESSION_ALLOWANCE_SECS as i64),
        }
    }
}

/// Ids each create event introduces, keyed by entity prefix.
fn created_ids(scan: &LogScan) -> BTreeMap<&'static str, BTreeSet<String>> {
    let mut created: BTreeMap<&'static str, BTreeSet<String>> = BTreeMap::new();
    for event in scan.iter() {
        let prefix = match event.event_type() {
            EventType::IdentityCreate => "act",
            EventType::ProjectCreate => "proj",
            EventType::OutlineCreate => "out",
            EventType::ItemCreate => "item",
            _ => continue,
        };
        created
            .entry(prefix)
            .or_default()
            .insert(event.entity_id.clone());
    }
    created
}

/// References an event makes to actors, items and outlines, as `(kind, id)`.
fn references(event: &Event) -> Vec<(&'static str, String)> {
    let mut refs = vec![("act", event.actor_id.to_string())];
    let ty = event.event_type();
    if !ty.is_create() {
        for prefix in ["act", "proj", "out", "item"] {
            if event.entity_id.starts_with(&format!("{prefix}-")) {
                refs.push((prefix, event.entity_id.clone()));
            }
        }
    }
    for (key, prefix) in [
        ("itemId", "item"),
        ("fromItemId", "item"),
        ("toItemId", "item"),
        ("parentId", "item"),
        ("outlineId", "out"),
        ("projectId", "proj"),
        ("ownerActorId", "act"),
        ("assignedActorId", "act"),
        ("userId", "act"),
    ] {
        if let Some(id) = event.payload.get(key).and_then(|v| v.as_str()) {
            refs.push((prefix, id.to_string()));
        }
    }
    refs
}

pub fn diagnose(scan: &LogScan, options: &DoctorOptions) -> DoctorReport {
    let mut issues = Vec::new();

    for bad in &scan.malformed {
        let mut issue = Issue::new(
            Severity::Error,
            "malformed_line",
            format!("line {} is not a valid event: {}", bad.line, bad.error),
        );
        issue.line = Some(bad.line);
        issues.push(issue);
    }
    if scan.torn_tail {
        issues.push(Issue::new(
            Severity::Warning,
            "torn_tail",
            "the last line is incomplete and will be truncated on the next write",
        ));
    }

    let created = created_ids(scan);
    let mut seen_ids: BTreeMap<_, Vec<&Event>> = BTreeMap::new();
    let mut latest: Option<OffsetDateTime> = None;
    for (line, event) in &scan.events {
        let same_id = seen_ids.entry(event.id.clone()).or_default();
        if same_id.iter().any(|prev| *prev == event) {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    "duplicate_event_id",
                    format!("event id {} appears more than once", event.id),
                )
                .at(*line, event),
            );
        } else if !same_id.is_empty() {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    "event_id_collision",
                    format!("event id {} is shared by different events", event.id),
                )
                .at(*line, event),
            );
        }
        same_id.push(event);
        if !event.event_type().is_known() {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    "unknown_event_type",
                    format!("unknown event type {}", event.kind),
                )
                .at(*line, event),
            );
        }
        for (prefix, id) in references(event) {
            let known = created.get(prefix).is_some_and(|ids| ids.contains(&id));
            if !known {
                issues.push(
                    Issue::new(
                        Severity::Error,
                        "missing_reference",
                        format!("{} references {id}, which is never created", event.kind),
                    )
                    .at(*line, event),
                );
            }
        }
        if let Some(max) = latest
            && event.ts < max - options.time_regression_allowance
        {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    "time_regression",
                    format!("timestamp {} is earlier than a previous event at {max}", event.ts),
                )
                .at(*line, event),
            );
        }
        latest = Some(latest.map_or(event.ts, |max| max.max(event.ts)));
    }

    let replayed = replay(scan.iter());
    for rejection in &replayed.rejections {
        let mut issue = Issue::new(
            Severity::Error,
            "rejected_event",
            format!("{} could not be applied: {}", rejection.event_type, rejection.reason),
        );
        issue.event_id = Some(rejection.event_id.to_string());
        issue.line = scan
            .events
            .iter()
            .find(|(_, e)| e.id == rejection.event_id)
            .map(|(line, _)| *line);
        issues.push(issue);
    }
    for violation in replayed.state.check_invariants() {
        issues.push(Issue::new(
            Severity::Error,
            "invariant_violation",
            format!("{}: {}", violation.entity_id, violation.message),
        ));
    }

    let has_errors = issues.iter().any(|i| i.severity == Severity::Error);
    DoctorReport { issues, has_errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActorId, EventId};
    use serde_json::{Value, json};

    fn ev(n: u64, secs: i64, kind: &str, entity: &str, payload: Value) -> Event {
        Event {
            id: EventId::from_counter(n),
            ts: OffsetDateTime::UNIX_EPOCH + Duration::seconds(secs),
            actor_id: ActorId::from_counter(1),
            kind: kind.into(),
            entity_id: entity.into(),
            payload,
        }
    }

    fn scan(events: Vec<Event>) -> LogScan {
        LogScan {
            events: events.into_iter().enumerate().map(|(i, e)| (i + 1, e)).collect(),
            malformed: Vec::new(),
            torn_tail: false,
        }
    }

    fn codes(report: &DoctorReport) -> Vec<&'static str> {
        report.issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn clean_log_has_no_issues() {
        let report = diagnose(
            &scan(vec![
                ev(1, 1000, "identity.create", "act-1", json!({"kind": "human", "name": "Ada"})),
                ev(2, 1001, "project.create", "proj-1", json!({"name": "Alpha"})),
            ]),
            &DoctorOptions::default(),
        );
        assert_eq!(report, DoctorReport::default());
    }

    #[test]
    fn reports_each_problem_kind() {
        let mut input = scan(vec![
            ev(1, 1000, "identity.create", "act-1", json!({"kind": "human", "name": "Ada"})),
            ev(2, 1000, "comment.add", "cmt-1", json!({"itemId": "item-7", "body": "hi"})),
            ev(3, 100, "project.teleport", "proj-1", json!({})),
            ev(3, 1000, "identity.use", "act-1", json!({})),
            ev(1, 1000, "identity.create", "act-1", json!({"kind": "human", "name": "Ada"})),
        ]);
        input.malformed.push(super::super::event_log::MalformedLine {
            line: 9,
            error: "expected value".into(),
        });
        let report = diagnose(&input, &DoctorOptions::default());
        let codes = codes(&report);
        assert!(report.has_errors);
        for expected in [
            "malformed_line",
            "missing_reference",
            "unknown_event_type",
            "time_regression",
            "duplicate_event_id",
            "event_id_collision",
            "rejected_event",
        ] {
            assert!(codes.contains(&expected), "missing {expected} in {codes:?}");
        }
        let missing = report
            .issues
            .iter()
            .find(|i| i.code == "missing_reference")
            .unwrap();
        assert_eq!(missing.line, Some(2));
        assert_eq!(missing.event_id.as_deref(), Some("evt-2"));
    }

    #[test]
    fn regression_inside_allowance_is_fine() {
        let report = diagnose(
            &scan(vec![
                ev(1, 1000, "identity.create", "act-1", json!({"kind": "human", "name": "Ada"})),
                ev(2, 900, "identity.use", "act-1", json!({})),
            ]),
            &DoctorOptions::default(),
        );
        assert!(!codes(&report).contains(&"time_regression"));
    }
}
