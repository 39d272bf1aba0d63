//! Bare remote plus clones, driven with the git executable.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

pub fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test User"]);
}

pub struct Remote {
    root: TempDir,
}

impl Remote {
    pub fn new() -> Self {
        let root = TempDir::new().expect("remote root");
        git(root.path(), &["init", "--bare", "-b", "main", "remote.git"]);
        Self { root }
    }

    pub fn url(&self) -> String {
        self.root.path().join("remote.git").display().to_string()
    }

    /// An empty repository on `main`, ready for `clarity init`.
    pub fn fresh_repo(&self, name: &str) -> PathBuf {
        let dir = self.root.path().join(name);
        std::fs::create_dir_all(&dir).expect("repo dir");
        git(&dir, &["init", "-b", "main"]);
        configure_identity(&dir);
        dir
    }

    pub fn clone_into(&self, name: &str) -> PathBuf {
        git(self.root.path(), &["clone", &self.url(), name]);
        let dir = self.root.path().join(name);
        configure_identity(&dir);
        dir
    }
}
