use clap::Args;
use serde_json::json;
use time::OffsetDateTime;

use super::super::{Ctx, envelope};
use crate::git::{GitSync, SetupOptions};
use crate::store::doctor::diagnose;
use crate::store::{DoctorOptions, Store};
use crate::workspace::DEFAULT_WORKSPACE;
use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Also initialize git and commit the layout.
    #[arg(long)]
    pub git: bool,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Exit with status 2 when any issue is found.
    #[arg(long)]
    pub fail: bool,
}

pub(crate) fn init(ctx: &Ctx, args: InitArgs) -> Result<()> {
    let now = OffsetDateTime::now_utc();
    let (root, name) = match ctx.explicit_dir() {
        Some(dir) => {
            Store::init(dir, now)?;
            (dir.to_path_buf(), None)
        }
        None => {
            let name = ctx
                .resolved()?
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_WORKSPACE.to_string());
            let entry = ctx.workspaces()?.init(&name, now)?;
            (entry.dir, Some(entry.name))
        }
    };
    let git = if args.git {
        Some(GitSync::new(&root).setup(&SetupOptions {
            initial_commit: true,
            ..SetupOptions::default()
        })?)
    } else {
        None
    };
    let mut env = envelope(json!({ "root": root, "workspace": name, "git": git }))?;
    if Store::open(&root).load()?.actors.is_empty() {
        env = env.hint("create an identity: clarity identity create <name>");
    }
    ctx.print(&env)
}

pub(crate) fn status(ctx: &Ctx) -> Result<()> {
    let resolved = ctx.resolved()?;
    let git = GitSync::new(&resolved.root).status()?;
    ctx.read(|engine| {
        let state = engine.state();
        let actor = engine.current_actor().ok();
        let open_items = state
            .items
            .values()
            .filter(|i| !i.archived && !state.is_done(i))
            .count();
        let mut env = envelope(json!({
            "root": resolved.root,
            "workspace": resolved.name,
            "actor": actor,
            "project": engine.current_project().ok(),
            "counts": {
                "actors": state.actors.len(),
                "projects": state.projects.values().filter(|p| !p.archived).count(),
                "outlines": state.outlines.values().filter(|o| !o.archived).count(),
                "items": state.items.len(),
                "openItems": open_items,
            },
            "git": git,
        }))?;
        if actor.is_none() {
            env = env.hint("no current actor: clarity identity create <name>");
        }
        if let Some(reason) = git.blocks_writes() {
            env = env.hint(format!("writes are blocked ({reason}): clarity sync resolve"));
        } else if git.behind > 0 {
            env = env.hint("upstream has new events: clarity sync pull");
        } else if git.ahead > 0 || git.dirty_tracked {
            env = env.hint("local events are not pushed: clarity sync push");
        }
        Ok(env)
    })
}

pub(crate) fn doctor(ctx: &Ctx, args: DoctorArgs) -> Result<()> {
    let store = ctx.store()?;
    let scan = store.log().scan()?;
    let allowance = ctx.config().doctor.time_regression_allowance_secs;
    let report = diagnose(
        &scan,
        &DoctorOptions {
            time_regression_allowance: time::Duration::seconds(
                i64::try_from(allowance).unwrap_or(i64::MAX),
            ),
        },
    );
    let issues = report.issues.len();
    let mut env = envelope(&report)?.with_meta("issueCount", issues)?;
    if report.has_errors {
        env = env.hint("clarity reindex rebuilds the snapshot from the events that still apply");
    }
    ctx.print(&env)?;
    if args.fail && issues > 0 {
        return Err(Error::Doctor(issues));
    }
    Ok(())
}

pub(crate) fn reindex(ctx: &Ctx) -> Result<()> {
    let store = ctx.store()?;
    let (_, report) = crate::store::reindex::reindex(&store)?;
    ctx.print(&envelope(&report)?)
}
