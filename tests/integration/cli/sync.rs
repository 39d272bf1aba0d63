//! Git sync between two clones of one remote.

use crate::fixtures::git::{Remote, git};
use crate::fixtures::{Workspace, id_of};

#[test]
fn push_after_divergence_rebases_and_retries_once() {
    let remote = Remote::new();
    let url = remote.url();

    let a = Workspace::at(&remote.fresh_repo("a"));
    a.ok(&["init"]);
    a.ok(&["identity", "create", "Hana"]);
    a.ok(&["projects", "create", "Alpha"]);
    let item = a.create_item("shared", &[]);
    let setup = a.ok(&["sync", "setup", "--url", &url, "--commit", "--push"]);
    assert_eq!(setup["committed"], true);
    assert_eq!(setup["pushed"], true);

    // The second clone writes and pushes first.
    let b = Workspace::at(&remote.clone_into("b"));
    b.ok(&["comments", "add", &item, "from b"]);
    let pushed = b.ok(&["sync", "push"]);
    assert_eq!(pushed["push"]["steps"], serde_json::json!(["commit", "push"]));

    // The first clone has one uncommitted event and a stale view of the remote.
    a.ok(&["worklog", "add", &item, "from a"]);
    let report = a.ok(&["sync", "push", "--pull", "-m", "worklog from a"]);
    let push = &report["push"];
    assert_eq!(
        push["steps"],
        serde_json::json!(["commit", "push:rejected", "pull", "push"])
    );
    assert_eq!(push["committed"], true);
    assert_eq!(push["pulled"], true);
    assert_eq!(push["pushed"], true);
    assert_eq!(report["reindex"]["collisionCount"], 1);

    // Both sides' events survive the union merge.
    let comments = a.ok(&["comments", "list", &item]);
    assert_eq!(comments[0]["body"], "from b");
    assert_eq!(a.ok(&["worklog", "list", &item])[0]["body"], "from a");
    assert!(git(a.dir(), &["log", "--format=%s"]).contains("worklog from a"));

    let status = a.ok(&["sync", "status"]);
    assert_eq!(status["ahead"], 0);
    assert_eq!(status["behind"], 0);
}

#[test]
fn pull_brings_in_the_other_clones_events() {
    let remote = Remote::new();
    let a = Workspace::at(&remote.fresh_repo("a"));
    a.ok(&["init"]);
    a.ok(&["identity", "create", "Hana"]);
    let project = id_of(&a.ok(&["projects", "create", "Alpha"])["project"]);
    a.ok(&["sync", "setup", "--url", &remote.url(), "--commit", "--push"]);

    // A fresh clone has no current project; name it.
    let b = Workspace::at(&remote.clone_into("b"));
    let item = id_of(&b.ok(&["items", "create", "from b", "--project", &project]));
    b.ok(&["sync", "push"]);

    let pulled = a.ok(&["sync", "pull"]);
    assert_eq!(pulled["pull"]["pulled"], true);
    assert_eq!(a.ok(&["items", "show", &item])["title"], "from b");
}

#[test]
fn resolve_is_idle_on_a_clean_clone() {
    let remote = Remote::new();
    let a = Workspace::at(&remote.fresh_repo("a"));
    a.ok(&["init"]);
    a.ok(&["identity", "create", "Hana"]);
    a.ok(&["sync", "setup", "--url", &remote.url(), "--commit", "--push"]);
    assert_eq!(a.ok(&["sync", "resolve"])["state"], "idle");
}
