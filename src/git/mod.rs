//! Git integration.
//!
//! Provides:
//! - a status probe over git2 (branch, upstream, ahead/behind, conflicts)
//! - `GitSync`: setup, pull, push with one rebase-and-retry, resolve, remotes
//! - best-effort auto-sync run after mutating commands

pub mod autosync;
pub mod error;
pub mod runner;
pub mod status;
pub mod sync;

pub use autosync::{AUTOSYNC_TIMEOUT, autosync, warning};
pub use error::SyncError;
pub use runner::{GitOutput, GitRunner};
pub use status::{GitStatus, InProgress, probe};
pub use sync::{
    GitSync, PullReport, PushOptions, PushReport, Remote, Resolution, SetupOptions, SetupReport,
    SyncState, ensure_gitattributes,
};
