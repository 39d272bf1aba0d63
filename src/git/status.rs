//! Repository status probe.

use std::path::Path;

use git2::{BranchType, ErrorCode, Repository, RepositoryState, Status, StatusOptions};
use serde::Serialize;

use super::SyncError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InProgress {
    Merge,
    Rebase,
    #[default]
    #[serde(rename = "")]
    None,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStatus {
    pub is_repo: bool,
    pub branch: Option<String>,
    pub upstream: Option<String>,
    /// Anything changed or untracked outside ignored paths.
    pub dirty: bool,
    pub dirty_tracked: bool,
    pub unmerged: bool,
    pub in_progress: bool,
    pub in_progress_kind: InProgress,
    pub ahead: usize,
    pub behind: usize,
}

impl GitStatus {
    /// Mid-merge or mid-rebase: no new events may be written.
    pub fn blocks_writes(&self) -> Option<String> {
        if self.unmerged {
            Some("the repository has unmerged paths".into())
        } else if self.in_progress {
            let kind = match self.in_progress_kind {
                InProgress::Rebase => "rebase",
                _ => "merge",
            };
            Some(format!("a {kind} is in progress"))
        } else {
            None
        }
    }
}

pub(crate) fn open(root: &Path) -> Result<Option<Repository>, SyncError> {
    match Repository::discover(root) {
        Ok(repo) => Ok(Some(repo)),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
        Err(err) => Err(SyncError::OpenRepo(root.to_path_buf(), err)),
    }
}

/// Probe the repository containing `root`. Outside a repository every field
/// is at its default.
pub fn probe(root: &Path) -> Result<GitStatus, SyncError> {
    let Some(repo) = open(root)? else {
        return Ok(GitStatus::default());
    };
    let mut status = GitStatus {
        is_repo: true,
        ..GitStatus::default()
    };

    status.in_progress_kind = match repo.state() {
        RepositoryState::Merge => InProgress::Merge,
        RepositoryState::Rebase
        | RepositoryState::RebaseInteractive
        | RepositoryState::RebaseMerge
        | RepositoryState::ApplyMailboxOrRebase => InProgress::Rebase,
        _ => InProgress::None,
    };
    status.in_progress = status.in_progress_kind != InProgress::None;

    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(false)
        .exclude_submodules(true);
    let tracked_change = Status::INDEX_NEW
        | Status::INDEX_MODIFIED
        | Status::INDEX_DELETED
        | Status::INDEX_RENAMED
        | Status::INDEX_TYPECHANGE
        | Status::WT_MODIFIED
        | Status::WT_DELETED
        | Status::WT_RENAMED
        | Status::WT_TYPECHANGE;
    for entry in repo.statuses(Some(&mut opts))?.iter() {
        let flags = entry.status();
        if flags.is_ignored() {
            continue;
        }
        status.dirty = true;
        if flags.is_conflicted() {
            status.unmerged = true;
        }
        if flags.intersects(tracked_change) {
            status.dirty_tracked = true;
        }
    }

    status.branch = current_branch(&repo)?;
    if let Some(branch) = &status.branch
        && let Ok(local) = repo.find_branch(branch, BranchType::Local)
        && let Ok(upstream) = local.upstream()
    {
        status.upstream = upstream.name()?.map(str::to_string);
        if let (Some(ours), Some(theirs)) = (local.get().target(), upstream.get().target()) {
            let (ahead, behind) = repo.graph_ahead_behind(ours, theirs)?;
            status.ahead = ahead;
            status.behind = behind;
        }
    }
    Ok(status)
}

/// Branch HEAD points at, including an unborn one.
fn current_branch(repo: &Repository) -> Result<Option<String>, SyncError> {
    match repo.head() {
        Ok(head) if head.is_branch() => Ok(head.shorthand().map(str::to_string)),
        Ok(_) => Ok(None),
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            let head = repo.find_reference("HEAD")?;
            Ok(head
                .symbolic_target()
                .and_then(|t| t.strip_prefix("refs/heads/"))
                .map(str::to_string))
        }
        Err(err) => Err(err.into()),
    }
}
