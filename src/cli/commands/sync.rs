use clap::{Args, Subcommand};
use serde_json::json;

use super::super::{Ctx, envelope};
use crate::Result;
use crate::git::{GitSync, PushOptions, SetupOptions, SyncState};
use crate::store::reindex::reindex;

#[derive(Subcommand, Debug)]
pub enum SyncCmd {
    /// Branch, upstream, ahead/behind and conflict state.
    Status,
    Remotes,
    /// Make the workspace a git repository, optionally with a remote.
    Setup(SetupArgs),
    /// Rebase onto the upstream and rebuild the snapshot.
    Pull,
    /// Commit canonical files and push, retrying once after a rebase.
    Push(PushArgs),
    /// What to do next, given the repository state.
    Resolve,
}

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Remote name (default origin).
    #[arg(long)]
    pub remote: Option<String>,
    #[arg(long)]
    pub url: Option<String>,
    /// Commit the workspace files.
    #[arg(long)]
    pub commit: bool,
    /// Push and set the upstream.
    #[arg(long, requires = "url")]
    pub push: bool,
}

#[derive(Args, Debug)]
pub struct PushArgs {
    #[arg(long, short = 'm')]
    pub message: Option<String>,
    /// Push what is already committed.
    #[arg(long)]
    pub no_commit: bool,
    /// Pull first when the upstream is known to be ahead.
    #[arg(long)]
    pub pull: bool,
}

pub(crate) fn handle(ctx: &Ctx, cmd: SyncCmd) -> Result<()> {
    let root = ctx.root()?;
    let sync = GitSync::new(root);
    match cmd {
        SyncCmd::Status => {
            let status = sync.status()?;
            let mut env = envelope(&status)?;
            if !status.is_repo {
                env = env.hint("clarity sync setup --commit");
            } else if let Some(reason) = status.blocks_writes() {
                env = env.hint(format!("{reason}; see clarity sync resolve"));
            }
            ctx.print(&env)
        }
        SyncCmd::Remotes => {
            let remotes = sync.remotes()?;
            ctx.print(&envelope(&remotes)?.with_meta("count", remotes.len())?)
        }
        SyncCmd::Setup(args) => {
            let report = sync.setup(&SetupOptions {
                remote: args.remote,
                url: args.url,
                initial_commit: args.commit,
                push: args.push,
            })?;
            ctx.print(&envelope(report)?)
        }
        SyncCmd::Pull => {
            let store = ctx.store()?;
            let report = sync.pull()?;
            let (_, reindexed) = reindex(&store)?;
            tracing::info!(changed = report.changed(), "pull finished");
            ctx.print(&envelope(json!({ "pull": report, "reindex": reindexed }))?)
        }
        SyncCmd::Push(args) => {
            let store = ctx.store()?;
            let actor = ctx
                .engine()
                .ok()
                .and_then(|engine| engine.current_actor().ok().map(|a| a.name.clone()));
            let report = sync.push(&PushOptions {
                message: args.message,
                actor_name: actor,
                commit: !args.no_commit,
                pull_first: args.pull,
            })?;
            let reindexed = if report.pulled {
                Some(reindex(&store)?.1)
            } else {
                None
            };
            ctx.print(&envelope(json!({ "push": report, "reindex": reindexed }))?)
        }
        SyncCmd::Resolve => {
            let resolution = sync.resolve()?;
            let mut env = envelope(&resolution)?;
            if resolution.state == SyncState::Conflict {
                env = env.hint("event files merge by union; keeping both sides is always safe");
            }
            ctx.print(&env)
        }
    }
}
