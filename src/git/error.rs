//! Git sync error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::error::Transience;
use crate::store::StoreError;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    #[error("{0:?} is not inside a git repository; run `clarity sync setup`")]
    NotARepo(PathBuf),

    #[error("failed to open repository at {0:?}: {1}")]
    OpenRepo(PathBuf, #[source] git2::Error),

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("failed to run `git {args}`: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`git {args}` timed out after {secs}s")]
    Timeout { args: String, secs: u64 },

    #[error("`git {args}` failed: {stderr}")]
    Command {
        args: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("push rejected (non-fast-forward)")]
    NonFastForward,

    #[error("writes are blocked: {0}; run `clarity sync resolve`")]
    Blocked(String),

    #[error("tracked files have uncommitted changes; commit or stash them first")]
    DirtyTracked,

    #[error("no upstream for branch {0}; pass a remote to `clarity sync setup`")]
    NoUpstream(String),

    #[error("remote {name} already points at {url}")]
    RemoteExists { name: String, url: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Whether retrying this sync may succeed.
    pub fn transience(&self) -> Transience {
        match self {
            SyncError::NonFastForward | SyncError::Timeout { .. } => Transience::Retryable,
            SyncError::Command { .. } | SyncError::Spawn { .. } => Transience::Unknown,
            SyncError::NotARepo(_)
            | SyncError::OpenRepo(..)
            | SyncError::Git(_)
            | SyncError::Blocked(_)
            | SyncError::DirtyTracked
            | SyncError::NoUpstream(_)
            | SyncError::RemoteExists { .. }
            | SyncError::Store(_) => Transience::Permanent,
        }
    }
}
