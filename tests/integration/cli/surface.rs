//! The output envelope, errors and exit codes.

use std::fs::OpenOptions;
use std::io::Write;

use clarity::store::Layout;
use predicates::prelude::*;
use serde_json::Value;

use crate::fixtures::{Workspace, id_of};

#[test]
fn every_envelope_has_data_and_only_known_keys() {
    let ws = Workspace::seeded();
    ws.create_item("X", &[]);
    for args in [
        &["status"][..],
        &["identity", "list"],
        &["projects", "list"],
        &["items", "list"],
        &["items", "ready"],
        &["events", "list", "--limit", "3"],
    ] {
        let env = ws.envelope(args);
        let obj = env.as_object().expect("envelope is an object");
        assert!(obj.contains_key("data"), "{args:?}: {env}");
        for key in obj.keys() {
            assert!(["data", "meta", "_hints"].contains(&key.as_str()), "{args:?}: {key}");
        }
        if let Some(meta) = obj.get("meta") {
            assert!(meta.is_object());
        }
        if let Some(hints) = obj.get("_hints") {
            let hints = hints.as_array().expect("hints array");
            assert!(hints.iter().all(|h| h.as_str().is_some_and(|s| !s.trim().is_empty())));
        }
    }
}

#[test]
fn edn_output_keeps_data_first() {
    let ws = Workspace::seeded();
    ws.cmd()
        .args(["--format", "edn", "projects", "current"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{:data {"))
        .stdout(predicate::str::contains(":name \"Alpha\""));
}

#[test]
fn errors_go_to_stderr_with_a_nonzero_exit() {
    let ws = Workspace::seeded();
    ws.cmd()
        .args(["items", "show", "item-404"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::starts_with("error: "))
        .stderr(predicate::str::contains("item-404"));
}

#[test]
fn writes_without_an_identity_are_refused() {
    let ws = Workspace::new();
    let err = ws.fail(&["projects", "create", "Alpha"]);
    assert!(err.contains("identity"), "{err}");
}

#[test]
fn flag_spelling_is_forgiving() {
    let ws = Workspace::seeded();
    let held = ws.ok(&["items", "create", "X", "--On_Hold", "--prio=1"]);
    assert_eq!(held["onHold"], true);
    assert_eq!(held["priority"], 1);
}

#[test]
fn other_humans_cannot_edit_my_items() {
    let ws = Workspace::seeded();
    let x = ws.create_item("X", &[]);
    ws.ok(&["identity", "create", "Other"]);
    let err = ws.fail(&["--actor", "Other", "items", "set-title", &x, "Mine now"]);
    assert!(err.to_lowercase().contains("permission"), "{err}");
}

#[test]
fn doctor_fail_exits_two_when_the_log_is_damaged() {
    let ws = Workspace::seeded();
    ws.cmd().args(["doctor", "--fail"]).assert().success();

    let mut log = OpenOptions::new()
        .append(true)
        .open(Layout::new(ws.dir()).event_log())
        .expect("open log");
    writeln!(log, "{{not an event}}").expect("append garbage");

    let out = ws.cmd().args(["doctor", "--fail"]).output().expect("run doctor");
    assert_eq!(out.status.code(), Some(2));
    let env: Value = serde_json::from_slice(&out.stdout).expect("doctor still prints its report");
    assert!(env["meta"]["issueCount"].as_u64().is_some_and(|n| n > 0));
}

#[test]
fn outline_statuses_can_be_added_and_reordered() {
    let ws = Workspace::seeded();
    let outline = id_of(&ws.ok(&["outlines", "list"])[0]);
    ws.ok(&["outlines", "status", "add", &outline, "Review", "--require-note"]);
    let statuses = ws.ok(&["outlines", "status", "list", &outline]);
    let labels: Vec<&str> = statuses
        .as_array()
        .expect("statuses")
        .iter()
        .map(|s| s["label"].as_str().expect("label"))
        .collect();
    assert_eq!(labels.last(), Some(&"Review"));

    let mut reversed: Vec<String> = labels.iter().rev().map(|s| s.to_string()).collect();
    let mut args = vec!["outlines", "status", "reorder", outline.as_str()];
    args.extend(reversed.iter().map(String::as_str));
    ws.ok(&args);
    let after = ws.ok(&["outlines", "status", "list", &outline]);
    assert_eq!(after[0]["label"], "Review");

    reversed.pop();
    let mut short = vec!["outlines", "status", "reorder", outline.as_str()];
    short.extend(reversed.iter().map(String::as_str));
    ws.fail(&short);
}

#[test]
fn bad_environment_settings_are_logged_not_fatal() {
    let ws = Workspace::seeded();
    ws.cmd()
        .env_remove("LOG")
        .env("CLARITY_FORMAT", "yaml")
        .args(["projects", "current"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"))
        .stderr(predicate::str::contains("invalid CLARITY_FORMAT"));
}
