//! Sync operations over the workspace's git repository.
//!
//! The log is append-only JSONL, so concurrent histories are reconciled by
//! the `union` merge driver: a rebase keeps every line from both sides.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use git2::{ErrorCode, Repository};
use serde::Serialize;

use super::runner::{GitOutput, GitRunner};
use super::status::{self, GitStatus, InProgress};
use super::SyncError;
use crate::store::{self, CANONICAL_PATHS, Layout, StoreError};

/// Pull-and-push rounds after the first rejected push.
pub const MAX_PUSH_RETRIES: usize = 1;

pub const DEFAULT_REMOTE: &str = "origin";

/// `.gitattributes` line making git union-merge the event log.
const UNION_MERGE_LINE: &str = "events/*.jsonl merge=union";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

#[derive(Clone, Debug, Default)]
pub struct SetupOptions {
    pub remote: Option<String>,
    pub url: Option<String>,
    pub initial_commit: bool,
    pub push: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupReport {
    pub initialized: bool,
    pub gitignore_updated: bool,
    pub committed: bool,
    pub remote_added: bool,
    pub pushed: bool,
}

#[derive(Clone, Debug, Default)]
pub struct PushOptions {
    pub message: Option<String>,
    /// Used in the derived commit message.
    pub actor_name: Option<String>,
    pub commit: bool,
    /// Pull first when the last-known upstream is ahead of us.
    pub pull_first: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub committed: bool,
    pub pulled: bool,
    pub pushed: bool,
    pub retried: bool,
    /// What happened, in order: `commit`, `pull`, `push`, `push:rejected`.
    pub steps: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReport {
    pub pulled: bool,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl PullReport {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Dirty,
    Ahead,
    Behind,
    Conflict,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub state: SyncState,
    pub steps: Vec<String>,
    pub status: GitStatus,
}

#[derive(Clone, Debug)]
pub struct GitSync {
    layout: Layout,
    runner: GitRunner,
}

impl GitSync {
    pub fn new(root: &Path) -> Self {
        Self {
            layout: Layout::new(root),
            runner: GitRunner::new(root),
        }
    }

    /// Bound every git process this handle spawns.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.runner = self.runner.with_timeout(timeout);
        self
    }

    pub fn status(&self) -> Result<GitStatus, SyncError> {
        status::probe(self.layout.root())
    }

    /// Refuse to write while a merge or rebase is unfinished.
    pub fn ensure_writable(&self) -> Result<(), SyncError> {
        match self.status()?.blocks_writes() {
            Some(reason) => Err(SyncError::Blocked(reason)),
            None => Ok(()),
        }
    }

    pub fn remotes(&self) -> Result<Vec<Remote>, SyncError> {
        let repo = self.repo()?;
        let names = repo.remotes()?;
        let mut out = Vec::new();
        for name in names.iter().flatten() {
            let remote = repo.find_remote(name)?;
            out.push(Remote {
                name: name.to_string(),
                url: remote.url().unwrap_or_default().to_string(),
            });
        }
        Ok(out)
    }

    pub fn setup(&self, opts: &SetupOptions) -> Result<SetupReport, SyncError> {
        let mut report = SetupReport::default();
        let repo = match status::open(self.layout.root())? {
            Some(repo) => repo,
            None => {
                tracing::info!(root = %self.layout.root().display(), "initializing git repository");
                report.initialized = true;
                Repository::init(self.layout.root())?
            }
        };
        report.gitignore_updated = store::ensure_gitignore(&self.layout)?;
        ensure_gitattributes(&self.layout)?;
        if opts.initial_commit {
            report.committed = self.commit_canonical("clarity: initialize workspace")?;
        }

        let name = opts.remote.as_deref().unwrap_or(DEFAULT_REMOTE);
        if let Some(url) = &opts.url {
            match repo.find_remote(name) {
                Ok(existing) => {
                    let current = existing.url().unwrap_or_default();
                    if current != url {
                        return Err(SyncError::RemoteExists {
                            name: name.to_string(),
                            url: current.to_string(),
                        });
                    }
                }
                Err(err) if err.code() == ErrorCode::NotFound => {
                    repo.remote(name, url)?;
                    report.remote_added = true;
                }
                Err(err) => return Err(err.into()),
            }
        }
        if opts.push {
            let branch = self
                .status()?
                .branch
                .ok_or_else(|| SyncError::NoUpstream("HEAD".into()))?;
            self.runner.run(&["push", "-u", name, &branch])?;
            report.pushed = true;
        }
        Ok(report)
    }

    /// `pull --rebase` from the upstream. The caller reindexes afterwards.
    pub fn pull(&self) -> Result<PullReport, SyncError> {
        let status = self.status()?;
        if !status.is_repo {
            return Err(SyncError::NotARepo(self.layout.root().to_path_buf()));
        }
        if let Some(reason) = status.blocks_writes() {
            return Err(SyncError::Blocked(reason));
        }
        if status.dirty_tracked {
            return Err(SyncError::DirtyTracked);
        }
        let before = self.head()?;
        self.pull_rebase(&status, false)?;
        let after = self.head()?;
        Ok(PullReport {
            pulled: true,
            before,
            after,
        })
    }

    /// Commit canonical paths, push, and on a non-fast-forward rejection
    /// rebase onto the upstream and push again.
    pub fn push(&self, opts: &PushOptions) -> Result<PushReport, SyncError> {
        let status = self.status()?;
        if !status.is_repo {
            return Err(SyncError::NotARepo(self.layout.root().to_path_buf()));
        }
        if let Some(reason) = status.blocks_writes() {
            return Err(SyncError::Blocked(reason));
        }
        let mut report = PushReport::default();
        if opts.commit {
            let message = opts.message.clone().unwrap_or_else(|| match &opts.actor_name {
                Some(actor) => format!("clarity: sync by {actor}"),
                None => "clarity: sync".to_string(),
            });
            report.committed = self.commit_canonical(&message)?;
            if report.committed {
                report.steps.push("commit".into());
            }
        }
        if opts.pull_first && status.behind > 0 {
            self.pull_rebase(&status, true)?;
            report.pulled = true;
            report.steps.push("pull".into());
        }

        let mut retries = 0;
        loop {
            let status = self.status()?;
            match self.push_once(&status) {
                Ok(()) => {
                    report.pushed = true;
                    report.steps.push("push".into());
                    return Ok(report);
                }
                Err(SyncError::NonFastForward) if retries < MAX_PUSH_RETRIES => {
                    retries += 1;
                    report.retried = true;
                    report.steps.push("push:rejected".into());
                    tracing::info!(retries, "push rejected; rebasing onto upstream");
                    self.pull_rebase(&status, true)?;
                    report.pulled = true;
                    report.steps.push("pull".into());
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn resolve(&self) -> Result<Resolution, SyncError> {
        let status = self.status()?;
        if !status.is_repo {
            return Err(SyncError::NotARepo(self.layout.root().to_path_buf()));
        }
        let (state, steps): (SyncState, Vec<&str>) = if status.unmerged || status.in_progress {
            let finish = match status.in_progress_kind {
                InProgress::Rebase => "git rebase --continue (or git rebase --abort to back out)",
                _ => "git commit (or git merge --abort to back out)",
            };
            (
                SyncState::Conflict,
                vec![
                    "edit each conflicted file; in events/*.jsonl keep every line from both sides",
                    "git add the resolved files",
                    finish,
                    "clarity reindex",
                ],
            )
        } else if status.dirty {
            (SyncState::Dirty, vec!["clarity sync push"])
        } else if status.behind > 0 {
            (SyncState::Behind, vec!["clarity sync pull"])
        } else if status.ahead > 0 {
            (SyncState::Ahead, vec!["clarity sync push --no-commit"])
        } else {
            (SyncState::Idle, Vec::new())
        };
        Ok(Resolution {
            state,
            steps: steps.into_iter().map(str::to_string).collect(),
            status,
        })
    }

    /// Stage and commit canonical paths. `false` when nothing changed.
    pub fn commit_canonical(&self, message: &str) -> Result<bool, SyncError> {
        ensure_gitattributes(&self.layout)?;
        let paths: Vec<&str> = CANONICAL_PATHS
            .iter()
            .copied()
            .filter(|p| self.layout.root().join(p).exists())
            .collect();
        if paths.is_empty() {
            return Ok(false);
        }
        let mut add = vec!["add", "-A", "--"];
        add.extend(&paths);
        self.runner.run(&add)?;

        let mut diff = vec!["diff", "--cached", "--quiet", "--"];
        diff.extend(&paths);
        let staged = self.runner.output(&diff)?;
        match staged.code {
            Some(0) => return Ok(false),
            Some(1) => {}
            _ => return Err(command_failed(&diff, staged)),
        }

        let identity = self.fallback_identity()?;
        let mut commit: Vec<&str> = identity.iter().map(String::as_str).collect();
        commit.extend(["commit", "-m", message, "--"]);
        commit.extend(&paths);
        self.runner.run(&commit)?;
        tracing::info!(message, "committed workspace changes");
        Ok(true)
    }

    fn push_once(&self, status: &GitStatus) -> Result<(), SyncError> {
        let branch = status
            .branch
            .clone()
            .ok_or_else(|| SyncError::NoUpstream("HEAD".into()))?;
        let out = if status.upstream.is_some() {
            self.runner.output(&["push"])?
        } else {
            let remote = self
                .default_remote()?
                .ok_or_else(|| SyncError::NoUpstream(branch.clone()))?;
            self.runner.output(&["push", "-u", &remote, &branch])?
        };
        if out.success() {
            Ok(())
        } else if is_non_fast_forward(&out.stderr) {
            Err(SyncError::NonFastForward)
        } else {
            Err(command_failed(&["push"], out))
        }
    }

    fn pull_rebase(&self, status: &GitStatus, autostash: bool) -> Result<(), SyncError> {
        let remote;
        let mut args = vec!["pull", "--rebase"];
        if autostash {
            args.push("--autostash");
        }
        if status.upstream.is_none() {
            let branch = status
                .branch
                .as_deref()
                .ok_or_else(|| SyncError::NoUpstream("HEAD".into()))?;
            remote = self
                .default_remote()?
                .ok_or_else(|| SyncError::NoUpstream(branch.to_string()))?;
            args.extend([remote.as_str(), branch]);
        }
        self.runner.run(&args)?;
        Ok(())
    }

    /// `origin` when configured, else the only remote.
    fn default_remote(&self) -> Result<Option<String>, SyncError> {
        let remotes = self.remotes()?;
        if remotes.iter().any(|r| r.name == DEFAULT_REMOTE) {
            return Ok(Some(DEFAULT_REMOTE.to_string()));
        }
        Ok(match remotes.as_slice() {
            [only] => Some(only.name.clone()),
            _ => None,
        })
    }

    /// `-c user.*` flags for repositories with no committer configured.
    fn fallback_identity(&self) -> Result<Vec<String>, SyncError> {
        let config = self.repo()?.config()?;
        let mut flags = Vec::new();
        if config.get_string("user.name").is_err() {
            flags.extend(["-c".to_string(), "user.name=clarity".to_string()]);
        }
        if config.get_string("user.email").is_err() {
            flags.extend(["-c".to_string(), "user.email=clarity@localhost".to_string()]);
        }
        Ok(flags)
    }

    fn head(&self) -> Result<Option<String>, SyncError> {
        let repo = self.repo()?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(err) if err.code() == ErrorCode::UnbornBranch => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(head.target().map(|oid| oid.to_string()))
    }

    fn repo(&self) -> Result<Repository, SyncError> {
        status::open(self.layout.root())?
            .ok_or_else(|| SyncError::NotARepo(self.layout.root().to_path_buf()))
    }
}

/// Add the union-merge rule for the event log unless present.
pub fn ensure_gitattributes(layout: &Layout) -> Result<bool, StoreError> {
    let path = layout.gitattributes();
    let existing = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => return Err(store::io_err(&path, source)),
    };
    if existing.lines().any(|line| line.trim() == UNION_MERGE_LINE) {
        return Ok(false);
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| store::io_err(&path, source))?;
    let sep = if existing.is_empty() || existing.ends_with('\n') { "" } else { "\n" };
    writeln!(file, "{sep}{UNION_MERGE_LINE}").map_err(|source| store::io_err(&path, source))?;
    Ok(true)
}

fn is_non_fast_forward(stderr: &str) -> bool {
    ["non-fast-forward", "fetch first", "[rejected]", "failed to push some refs"]
        .iter()
        .any(|needle| stderr.contains(needle))
}

fn command_failed(args: &[&str], out: GitOutput) -> SyncError {
    SyncError::Command {
        args: args.join(" "),
        code: out.code,
        stderr: out.stderr.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages_are_recognised() {
        assert!(is_non_fast_forward(
            " ! [rejected]        main -> main (fetch first)\nerror: failed to push some refs"
        ));
        assert!(!is_non_fast_forward("fatal: could not read from remote repository"));
    }

    #[test]
    fn gitattributes_line_is_added_once() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        fs::write(layout.gitattributes(), "*.png binary").unwrap();
        assert!(ensure_gitattributes(&layout).unwrap());
        assert!(!ensure_gitattributes(&layout).unwrap());
        let text = fs::read_to_string(layout.gitattributes()).unwrap();
        assert_eq!(text, "*.png binary\nevents/*.jsonl merge=union\n");
    }

    #[test]
    fn setup_initializes_and_commits() {
        let tmp = tempfile::tempdir().unwrap();
        store::Store::init(tmp.path(), time::OffsetDateTime::UNIX_EPOCH).unwrap();
        let sync = GitSync::new(tmp.path());
        let report = sync
            .setup(&SetupOptions {
                initial_commit: true,
                ..Default::default()
            })
            .unwrap();
        assert!(report.initialized);
        assert!(report.committed);
        assert!(!report.remote_added);

        let status = sync.status().unwrap();
        assert!(status.is_repo);
        assert!(!status.dirty);
        assert_eq!(sync.resolve().unwrap().state, SyncState::Idle);
        assert!(sync.remotes().unwrap().is_empty());
    }
}
