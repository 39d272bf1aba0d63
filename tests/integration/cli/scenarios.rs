//! End-to-end behaviour of the core workflows, through the binary.

use std::fs;

use clarity::store::Layout;
use serde_json::Value;

use crate::fixtures::{Workspace, id_of, titles};

#[test]
fn claim_needs_take_assigned_for_a_teammates_item() {
    let ws = Workspace::seeded();
    let a1 = id_of(&ws.ok(&["identity", "create", "A1", "--kind", "agent"]));
    let a2 = id_of(&ws.ok(&["identity", "create", "A2", "--kind", "agent"]));
    let x = ws.create_item("X", &["--assign", "A1"]);
    let before = ws.ok(&["items", "show", &x]);
    assert_eq!(before["assignedActorId"], a1.as_str());

    let err = ws.fail(&["--actor", "A2", "items", "claim", &x]);
    assert!(err.contains("take-assigned"), "{err}");
    assert_eq!(ws.ok(&["items", "show", &x]), before);

    let claimed = ws.ok(&["--actor", "A2", "items", "claim", &x, "--take-assigned"]);
    let item = &claimed["item"];
    assert_eq!(claimed["changed"], true);
    assert_eq!(item["assignedActorId"], a2.as_str());
    assert_eq!(item["ownerActorId"], a2.as_str());
    assert_eq!(item["ownerDelegatedFrom"], a1.as_str());
    assert!(item["ownerDelegatedAt"].is_string());
}

#[test]
fn completion_waits_for_children_and_blockers() {
    let ws = Workspace::seeded();
    let p = ws.create_item("P", &[]);
    ws.create_item("C", &["--parent", &p]);
    let q = ws.create_item("Q", &[]);
    ws.ok(&["deps", "add", &p, &q]);
    ws.ok(&["items", "set-status", &q, "doing"]);

    let err = ws.fail(&["items", "set-status", &p, "done"]);
    assert!(
        err.contains("has incomplete children and incomplete dependencies"),
        "{err}"
    );
}

#[test]
fn move_before_a_duplicate_rank_rebalances_every_sibling() {
    let ws = Workspace::seeded();
    let _a = ws.create_item("a", &[]);
    let b = ws.create_item("b", &[]);
    let c = ws.create_item("c", &[]);

    // Give all three the same rank, as two clones inserting concurrently would.
    let log = Layout::new(ws.dir()).event_log();
    let rewritten: String = fs::read_to_string(&log)
        .expect("event log")
        .lines()
        .map(|line| {
            let mut event: Value = serde_json::from_str(line).expect("event line");
            if event["type"] == "item.create" {
                event["payload"]["rank"] = Value::from("h");
            }
            format!("{event}\n")
        })
        .collect();
    fs::write(&log, rewritten).expect("rewrite log");
    ws.ok(&["reindex"]);
    assert_eq!(titles(&ws.ok(&["items", "list"])), ["a", "b", "c"]);

    let env = ws.envelope(&["items", "move", &c, "--before", &b]);
    assert_eq!(env["data"]["rebalanceCount"], 3);
    assert!(env["_hints"].is_array());
    assert_eq!(titles(&ws.ok(&["items", "list"])), ["a", "c", "b"]);

    let moves = ws.ok(&["events", "list", "--type", "item.move", "--limit", "1"]);
    let payload = &moves[0]["payload"];
    assert_eq!(payload["rebalanceCount"], 3);
    assert_eq!(payload["rebalance"].as_object().map(|m| m.len()), Some(3));
}

#[test]
fn ready_puts_my_items_first_and_hides_held_and_taken_ones() {
    let ws = Workspace::seeded();
    ws.ok(&["identity", "create", "Ace", "--kind", "agent"]);
    ws.ok(&["identity", "create", "Bex", "--kind", "agent"]);
    ws.create_item("item-ready", &[]);
    ws.create_item("item-hold", &["--on-hold"]);
    ws.create_item("item-assigned-other", &["--assign", "Bex"]);
    ws.create_item("item-mine", &["--assign", "Ace"]);

    let env = ws.envelope(&["--actor", "Ace", "items", "ready"]);
    assert_eq!(titles(&env["data"]), ["item-mine", "item-ready"]);
    assert_eq!(env["meta"]["count"], 2);
}

#[test]
fn reindex_keeps_the_current_actor() {
    let ws = Workspace::new();
    ws.ok(&["identity", "create", "Hana"]);
    let agent = id_of(&ws.ok(&["identity", "create", "Ace", "--kind", "agent", "--use"]));

    fs::remove_file(Layout::new(ws.dir()).snapshot()).expect("remove snapshot");
    let report = ws.ok(&["reindex"]);
    assert_eq!(report["currentActorId"], agent.as_str());
    assert_eq!(report["appliedCount"], report["eventCount"]);
    assert_eq!(report["skippedCount"], 0);
    assert_eq!(id_of(&ws.ok(&["identity", "whoami"])), agent);
}

#[test]
fn status_changes_round_trip() {
    let ws = Workspace::seeded();
    let x = ws.create_item("X", &[]);
    let original = ws.ok(&["items", "show", &x])["statusId"].clone();
    ws.ok(&["items", "set-status", &x, "doing"]);
    let back = ws.ok(&["items", "set-status", &x, original.as_str().expect("status")]);
    assert_eq!(back["statusId"], original);
}

#[test]
fn agent_start_mints_a_session_agent_and_claims() {
    let ws = Workspace::seeded();
    let x = ws.create_item("X", &[]);
    let out = ws
        .cmd()
        .args(["agent", "start", &x])
        .env("CLARITY_AGENT_SESSION", "run-2026-10-16")
        .output()
        .expect("run clarity");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let me = ws.ok(&["identity", "whoami"]);
    assert_eq!(me["kind"], "agent");
    let item = ws.ok(&["items", "show", &x]);
    assert_eq!(item["assignedActorId"], me["id"]);
}

#[test]
fn worklog_is_private_to_the_authors_human() {
    let ws = Workspace::seeded();
    ws.ok(&["identity", "create", "Other", "--use"]);
    ws.ok(&["identity", "use", "Hana"]);
    let x = ws.create_item("X", &[]);
    ws.ok(&["worklog", "add", &x, "private note"]);
    ws.ok(&["comments", "add", &x, "public note"]);

    assert_eq!(ws.ok(&["worklog", "list", &x]).as_array().map(Vec::len), Some(1));
    let theirs = ws.ok(&["--actor", "Other", "worklog", "list", &x]);
    assert_eq!(theirs.as_array().map(Vec::len), Some(0));
    let comments = ws.ok(&["--actor", "Other", "comments", "list", &x]);
    assert_eq!(comments[0]["body"], "public note");
}

#[test]
fn attachments_are_copied_in_and_exported() {
    let ws = Workspace::seeded();
    let x = ws.create_item("X", &[]);
    let src = ws.dir().join("notes.txt");
    fs::write(&src, "hello").expect("write source");

    let att = ws.ok(&[
        "attachments",
        "add",
        src.to_str().expect("utf8 path"),
        "--item",
        &x,
        "--title",
        "Notes",
    ]);
    let id = id_of(&att);
    assert_eq!(ws.ok(&["attachments", "list", "--item", &x])[0]["id"], id.as_str());

    let out = tempfile::tempdir().expect("export dir");
    let exported = ws.ok(&["attachments", "export", &id, out.path().to_str().expect("utf8")]);
    let path = exported["path"].as_str().expect("path");
    assert_eq!(fs::read_to_string(path).expect("exported file"), "hello");
}

#[test]
fn dependency_cycles_are_reported_not_refused() {
    let ws = Workspace::seeded();
    let a = ws.create_item("A", &[]);
    let b = ws.create_item("B", &[]);
    ws.ok(&["deps", "add", &a, &b]);
    ws.ok(&["deps", "add", &b, &a]);
    let env = ws.envelope(&["deps", "cycles"]);
    assert_eq!(env["meta"]["count"], 1);
    assert!(titles(&ws.ok(&["items", "ready"])).is_empty());
}

fn names(actors: &Value) -> Vec<String> {
    actors
        .as_array()
        .expect("array of actors")
        .iter()
        .map(|a| a["name"].as_str().expect("name").to_string())
        .collect()
}

#[test]
fn failed_agent_start_leaves_no_trace() {
    let ws = Workspace::seeded();
    ws.ok(&["identity", "create", "A1", "--kind", "agent"]);
    let x = ws.create_item("X", &["--assign", "A1"]);
    let before = ws.ok(&["events", "list"]);

    let out = ws
        .cmd()
        .args(["agent", "start", &x])
        .env("CLARITY_AGENT_SESSION", "zz")
        .output()
        .expect("run clarity");
    assert!(!out.status.success());
    assert_eq!(ws.ok(&["events", "list"]), before);

    ws.ok(&["identity", "create", "Bob"]);
    let listed = names(&ws.ok(&["identity", "list"]));
    let report = ws.ok(&["reindex"]);
    assert_eq!(report["collisionCount"], 0);
    assert_eq!(report["duplicateCount"], 0);
    assert_eq!(names(&ws.ok(&["identity", "list"])), listed);
    assert!(listed.contains(&"Bob".to_string()));
    assert!(listed.iter().all(|n| !n.starts_with("zz")));
}

#[test]
fn refused_completion_drops_its_note() {
    let ws = Workspace::seeded();
    let p = ws.create_item("P", &[]);
    ws.create_item("C", &["--parent", &p]);
    let before = ws.ok(&["events", "list"]);

    ws.fail(&["items", "set-status", &p, "done", "--note", "shipping it"]);
    assert_eq!(ws.ok(&["events", "list"]), before);
    assert_eq!(ws.ok(&["comments", "list", &p]), Value::Array(Vec::new()));

    ws.ok(&["comments", "add", &p, "after"]);
    let report = ws.ok(&["reindex"]);
    assert_eq!(report["collisionCount"], 0);
    assert_eq!(ws.ok(&["comments", "list", &p])[0]["body"], "after");
}

#[test]
fn create_with_an_assignee_lands_whole() {
    let ws = Workspace::seeded();
    ws.ok(&["identity", "create", "A1", "--kind", "agent"]);
    let before = ws.ok(&["events", "list"]);
    ws.fail(&["items", "create", "X", "--assign", "Nobody"]);
    assert_eq!(ws.ok(&["events", "list"]), before);

    let x = ws.create_item("X", &["--assign", "A1"]);
    let kinds: Vec<String> = ws
        .ok(&["items", "events", &x])
        .as_array()
        .expect("events")
        .iter()
        .map(|e| e["type"].as_str().expect("type").to_string())
        .collect();
    assert_eq!(kinds, ["item.create", "item.set_assign"]);
    assert_eq!(ws.ok(&["reindex"])["collisionCount"], 0);
}
