//! Named workspaces under the per-user config directory.

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

use crate::fixtures::titles;

fn clarity(config: &TempDir, args: &[&str]) -> Value {
    let out = Command::cargo_bin("clarity")
        .expect("clarity binary")
        .env("CLARITY_CONFIG_DIR", config.path())
        .env_remove("CLARITY_DIR")
        .env_remove("CLARITY_WORKSPACE")
        .env_remove("CLARITY_ACTOR")
        .env_remove("CLARITY_FORMAT")
        .args(args)
        .output()
        .expect("run clarity");
    assert!(
        out.status.success(),
        "clarity {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let env: Value = serde_json::from_slice(&out.stdout).expect("json envelope");
    env["data"].clone()
}

#[test]
fn first_workspace_becomes_current_and_resolves_without_dir() {
    let config = TempDir::new().expect("config dir");
    let entry = clarity(&config, &["workspace", "init", "alpha"]);
    assert_eq!(entry["name"], "alpha");

    clarity(&config, &["identity", "create", "Hana"]);
    clarity(&config, &["projects", "create", "Alpha"]);
    clarity(&config, &["items", "create", "first"]);

    let current = clarity(&config, &["workspace", "current"]);
    assert_eq!(current["name"], "alpha");
    assert_eq!(current["initialized"], true);
    assert_eq!(titles(&clarity(&config, &["items", "list"])), ["first"]);

    let listed = clarity(&config, &["workspace", "list"]);
    assert_eq!(listed[0]["name"], "alpha");
    assert_eq!(listed[0]["current"], true);
}

#[test]
fn export_then_import_reproduces_the_items() {
    let config = TempDir::new().expect("config dir");
    clarity(&config, &["workspace", "init", "alpha"]);
    clarity(&config, &["identity", "create", "Hana"]);
    clarity(&config, &["projects", "create", "Alpha"]);
    clarity(&config, &["items", "create", "one"]);
    clarity(&config, &["items", "create", "two"]);

    let bundle = config.path().join("alpha.json");
    let bundle = bundle.to_str().expect("utf8 path");
    clarity(&config, &["workspace", "export", "--out", bundle]);
    let imported = clarity(&config, &["workspace", "import", bundle, "--name", "beta"]);
    assert_eq!(imported["import"]["reindex"]["rejectedCount"], 0);

    let original = clarity(&config, &["items", "list", "--all"]);
    let copy = clarity(&config, &["--workspace", "beta", "items", "list", "--all"]);
    assert_eq!(copy, original);

    // importing twice into the same place is refused
    let out = Command::cargo_bin("clarity")
        .expect("clarity binary")
        .env("CLARITY_CONFIG_DIR", config.path())
        .args(["workspace", "import", bundle, "--name", "beta"])
        .output()
        .expect("run clarity");
    assert!(!out.status.success());
}

#[test]
fn forget_keeps_the_files() {
    let config = TempDir::new().expect("config dir");
    let entry = clarity(&config, &["workspace", "init", "alpha"]);
    let dir = entry["dir"].as_str().expect("dir").to_string();
    clarity(&config, &["workspace", "forget", "alpha"]);
    assert!(std::path::Path::new(&dir).join("meta").exists());
    assert_eq!(clarity(&config, &["workspace", "list"]), Value::Array(Vec::new()));
}
