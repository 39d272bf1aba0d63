use thiserror::Error;

use crate::config::ConfigError;
use crate::core::CoreError;
use crate::git::SyncError;
use crate::ops::OpError;
use crate::store::StoreError;
use crate::workspace::WorkspaceError;

/// Whether retrying this operation may succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transience {
    /// Retry will never help without changing inputs/state.
    Permanent,
    /// Retry may help (a concurrent push, a slow remote).
    Retryable,
    /// Unknown if retry will help.
    Unknown,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        matches!(self, Transience::Retryable)
    }
}

/// Coarse classification surfaced to callers that branch on failures.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    InvalidArgument,
    Conflict,
    /// A completion or transition gate refused the change.
    Gate,
    Io,
    Sync,
    /// `doctor` found problems.
    Doctor,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Gate => "gate",
            ErrorKind::Io => "io",
            ErrorKind::Sync => "sync",
            ErrorKind::Doctor => "doctor",
        }
    }
}

/// Crate-level convenience error.
///
/// A thin wrapper over the per-capability errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Op(#[from] OpError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("doctor found {0} issue(s)")]
    Doctor(usize),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Core(_) => ErrorKind::InvalidArgument,
            Error::Op(e) => op_kind(e),
            Error::Store(e) => store_kind(e),
            Error::Sync(SyncError::Store(e)) => store_kind(e),
            Error::Sync(_) => ErrorKind::Sync,
            Error::Workspace(e) => match e {
                WorkspaceError::NotFound(_) => ErrorKind::NotFound,
                WorkspaceError::Exists(_) | WorkspaceError::NotEmpty(_) => ErrorKind::Conflict,
                WorkspaceError::InvalidName { .. } | WorkspaceError::UnsupportedFormat(_) => {
                    ErrorKind::InvalidArgument
                }
                WorkspaceError::Registry { .. } | WorkspaceError::Legacy { .. } => ErrorKind::Io,
                WorkspaceError::Store(e) => store_kind(e),
                WorkspaceError::Sync(_) => ErrorKind::Sync,
            },
            Error::Config(_) => ErrorKind::Io,
            Error::Doctor(_) => ErrorKind::Doctor,
        }
    }

    pub fn transience(&self) -> Transience {
        match self {
            Error::Sync(e) | Error::Workspace(WorkspaceError::Sync(e)) => e.transience(),
            Error::Store(StoreError::Io { .. }) => Transience::Unknown,
            _ => Transience::Permanent,
        }
    }

    /// Process exit status: 2 for doctor findings, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Doctor(_) => 2,
            _ => 1,
        }
    }
}

fn op_kind(err: &OpError) -> ErrorKind {
    match err {
        OpError::NotFound { .. } => ErrorKind::NotFound,
        OpError::PermissionDenied(_) => ErrorKind::PermissionDenied,
        OpError::InvalidArgument { .. }
        | OpError::NoCurrentActor
        | OpError::NoCurrentProject
        | OpError::Core(_) => ErrorKind::InvalidArgument,
        OpError::Conflict(_) => ErrorKind::Conflict,
        OpError::Gate(_) => ErrorKind::Gate,
        OpError::Store(e) => store_kind(e),
        OpError::Encode(_) => ErrorKind::Io,
    }
}

fn store_kind(err: &StoreError) -> ErrorKind {
    match err {
        StoreError::NotInitialized(_) => ErrorKind::NotFound,
        StoreError::AttachmentTooLarge { .. } | StoreError::PathOutsideWorkspace(_) => {
            ErrorKind::InvalidArgument
        }
        _ => ErrorKind::Io,
    }
}
