//! Shared helpers: a temp workspace driven through the real binary.

pub mod git;

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// A workspace directory plus an isolated per-user config directory.
pub struct Workspace {
    config: TempDir,
    dir: PathBuf,
    _owned: Option<TempDir>,
}

impl Workspace {
    /// A fresh, initialized workspace in a temp directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("workspace dir");
        let ws = Self {
            config: TempDir::new().expect("config dir"),
            dir: dir.path().to_path_buf(),
            _owned: Some(dir),
        };
        ws.ok(&["init"]);
        ws
    }

    /// Drive an existing directory (a git clone, say) without initializing it.
    pub fn at(dir: &Path) -> Self {
        Self {
            config: TempDir::new().expect("config dir"),
            dir: dir.to_path_buf(),
            _owned: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `clarity --dir <ws>` with the config directory pinned.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("clarity").expect("clarity binary");
        cmd.env("CLARITY_CONFIG_DIR", self.config.path())
            .env_remove("CLARITY_DIR")
            .env_remove("CLARITY_WORKSPACE")
            .env_remove("CLARITY_ACTOR")
            .env_remove("CLARITY_FORMAT")
            .env_remove("CLARITY_AGENT_SESSION")
            .env_remove("CLARITY_AGENT_NAME")
            .env_remove("CLARITY_AGENT_USER")
            .arg("--dir")
            .arg(&self.dir);
        cmd
    }

    /// Run, require success, return the whole envelope.
    pub fn envelope(&self, args: &[&str]) -> Value {
        let out = self.cmd().args(args).output().expect("run clarity");
        assert!(
            out.status.success(),
            "clarity {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
            panic!(
                "clarity {args:?} printed non-JSON ({e}): {}",
                String::from_utf8_lossy(&out.stdout)
            )
        })
    }

    /// Run, require success, return `data`.
    pub fn ok(&self, args: &[&str]) -> Value {
        self.envelope(args)["data"].clone()
    }

    /// Run, require failure, return stderr.
    pub fn fail(&self, args: &[&str]) -> String {
        let out = self.cmd().args(args).output().expect("run clarity");
        assert!(
            !out.status.success(),
            "clarity {args:?} unexpectedly succeeded: {}",
            String::from_utf8_lossy(&out.stdout)
        );
        assert!(out.stdout.is_empty(), "failed command wrote to stdout");
        String::from_utf8_lossy(&out.stderr).into_owned()
    }

    /// Human `Hana` plus project `Alpha`, both current.
    pub fn seeded() -> Self {
        let ws = Self::new();
        ws.ok(&["identity", "create", "Hana"]);
        ws.ok(&["projects", "create", "Alpha"]);
        ws
    }

    pub fn create_item(&self, title: &str, extra: &[&str]) -> String {
        let mut args = vec!["items", "create", title];
        args.extend_from_slice(extra);
        id_of(&self.ok(&args))
    }
}

pub fn id_of(value: &Value) -> String {
    value["id"]
        .as_str()
        .unwrap_or_else(|| panic!("no id in {value}"))
        .to_string()
}

pub fn titles(items: &Value) -> Vec<String> {
    items
        .as_array()
        .expect("array of items")
        .iter()
        .map(|i| i["title"].as_str().expect("title").to_string())
        .collect()
}
