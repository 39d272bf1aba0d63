//! On-disk workspace layout.
//!
//! Canonical paths (shared through git): `events/`, `meta/`, `resources/` and
//! the two git dotfiles. Derived paths (local only): `.clarity/`.

use std::path::{Path, PathBuf};

pub const EVENTS_DIR: &str = "events";
pub const EVENT_LOG_FILE: &str = "events.r1.jsonl";
pub const META_DIR: &str = "meta";
pub const WORKSPACE_META_FILE: &str = "workspace.json";
pub const WORKSPACE_CONFIG_FILE: &str = "clarity.toml";
pub const RESOURCES_DIR: &str = "resources";
pub const ATTACHMENTS_DIR: &str = "attachments";
pub const DERIVED_DIR: &str = ".clarity";
pub const SNAPSHOT_FILE: &str = "state.json";
pub const GITIGNORE_FILE: &str = ".gitignore";
pub const GITATTRIBUTES_FILE: &str = ".gitattributes";

/// Paths git sync stages and commits.
pub const CANONICAL_PATHS: [&str; 5] = [
    EVENTS_DIR,
    META_DIR,
    RESOURCES_DIR,
    GITIGNORE_FILE,
    GITATTRIBUTES_FILE,
];

/// `.gitignore` line keeping derived state out of commits.
pub const DERIVED_IGNORE_LINE: &str = ".clarity/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn events_dir(&self) -> PathBuf {
        self.root.join(EVENTS_DIR)
    }

    pub fn event_log(&self) -> PathBuf {
        self.events_dir().join(EVENT_LOG_FILE)
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.root.join(META_DIR)
    }

    pub fn workspace_meta(&self) -> PathBuf {
        self.meta_dir().join(WORKSPACE_META_FILE)
    }

    pub fn workspace_config(&self) -> PathBuf {
        self.meta_dir().join(WORKSPACE_CONFIG_FILE)
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.root.join(RESOURCES_DIR)
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.resources_dir().join(ATTACHMENTS_DIR)
    }

    pub fn derived_dir(&self) -> PathBuf {
        self.root.join(DERIVED_DIR)
    }

    pub fn snapshot(&self) -> PathBuf {
        self.derived_dir().join(SNAPSHOT_FILE)
    }

    pub fn gitignore(&self) -> PathBuf {
        self.root.join(GITIGNORE_FILE)
    }

    pub fn gitattributes(&self) -> PathBuf {
        self.root.join(GITATTRIBUTES_FILE)
    }

    /// A workspace exists once its event log or metadata does.
    pub fn is_initialized(&self) -> bool {
        self.event_log().is_file() || self.workspace_meta().is_file()
    }
}
