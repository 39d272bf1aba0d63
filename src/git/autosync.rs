//! Best-effort commit and push after a mutating command.

use std::path::Path;
use std::time::Duration;

use super::sync::{GitSync, PushOptions, PushReport};
use super::SyncError;

/// Budget for each git process auto-sync spawns.
pub const AUTOSYNC_TIMEOUT: Duration = Duration::from_secs(20);

/// Commit canonical paths and, when a remote exists, push them.
///
/// Outside a repository this does nothing and returns `None`.
pub fn autosync(
    root: &Path,
    actor_name: Option<&str>,
    timeout: Duration,
) -> Result<Option<PushReport>, SyncError> {
    let sync = GitSync::new(root).with_timeout(Some(timeout));
    let status = sync.status()?;
    if !status.is_repo {
        return Ok(None);
    }
    if let Some(reason) = status.blocks_writes() {
        return Err(SyncError::Blocked(reason));
    }
    let message = match actor_name {
        Some(actor) => format!("clarity: auto-sync by {actor}"),
        None => "clarity: auto-sync".to_string(),
    };
    if status.upstream.is_none() && sync.remotes()?.is_empty() {
        let committed = sync.commit_canonical(&message)?;
        return Ok(Some(PushReport {
            committed,
            steps: if committed { vec!["commit".into()] } else { Vec::new() },
            ..PushReport::default()
        }));
    }
    let report = sync.push(&PushOptions {
        message: Some(message),
        actor_name: actor_name.map(str::to_string),
        commit: true,
        pull_first: true,
    })?;
    tracing::info!(steps = ?report.steps, "auto-sync finished");
    Ok(Some(report))
}

/// The one stderr line printed when auto-sync fails.
pub fn warning(err: &SyncError) -> String {
    if err.transience().is_retryable() {
        format!("warning: auto-sync failed: {err} (the next sync will retry)")
    } else {
        format!("warning: auto-sync failed: {err}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outside_a_repo_nothing_happens() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(autosync(tmp.path(), None, AUTOSYNC_TIMEOUT).unwrap(), None);
    }

    #[test]
    fn warnings_mention_retries_only_when_they_help() {
        let timeout = SyncError::Timeout {
            args: "push".into(),
            secs: 20,
        };
        assert!(warning(&timeout).starts_with("warning: "));
        assert!(warning(&timeout).ends_with("(the next sync will retry)"));
        assert!(!warning(&SyncError::DirtyTracked).contains("retry"));
    }
}
