use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde_json::json;
use time::OffsetDateTime;

use super::super::{Ctx, envelope};
use crate::Result;
use crate::workspace::{self, ExportBundle, WorkspaceError};

#[derive(Subcommand, Debug)]
pub enum WorkspaceCmd {
    /// Create a local workspace under the config directory.
    Init { name: String },
    /// Make a workspace current.
    Use { name: String },
    /// Show the workspace commands resolve to.
    Current,
    /// Rename a workspace (a local one's directory moves too).
    Rename { from: String, to: String },
    /// Register an existing directory, usually a git clone.
    Add { name: String, dir: PathBuf },
    /// Drop a workspace from the registry; files stay.
    Forget { name: String },
    #[command(alias = "ls")]
    List,
    /// Write the workspace's events and metadata as one JSON bundle.
    Export(ExportArgs),
    /// Load a bundle into a new workspace.
    Import(ImportArgs),
    /// Convert a legacy SQLite database into a new workspace.
    Migrate(MigrateArgs),
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Write here instead of printing the bundle.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    pub file: PathBuf,
    /// Name of the workspace to create (ignored with --dir).
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Legacy SQLite database.
    pub db: PathBuf,
    /// Name of the workspace to create (ignored with --dir).
    #[arg(long)]
    pub name: Option<String>,
    /// Initialize git and commit the migrated workspace.
    #[arg(long)]
    pub git: bool,
}

pub(crate) fn handle(ctx: &Ctx, cmd: WorkspaceCmd) -> Result<()> {
    let now = OffsetDateTime::now_utc();
    match cmd {
        WorkspaceCmd::Init { name } => {
            let entry = ctx.workspaces()?.init(&name, now)?;
            ctx.print(&envelope(entry)?)
        }
        WorkspaceCmd::Use { name } => {
            let entry = ctx.workspaces()?.use_workspace(&name)?;
            ctx.print(&envelope(entry)?)
        }
        WorkspaceCmd::Current => {
            let resolved = ctx.resolved()?;
            let initialized = crate::store::Layout::new(&resolved.root).is_initialized();
            let mut env = envelope(json!({
                "name": resolved.name,
                "dir": resolved.root,
                "initialized": initialized,
            }))?;
            if !initialized {
                env = env.hint("clarity init creates it");
            }
            ctx.print(&env)
        }
        WorkspaceCmd::Rename { from, to } => {
            let entry = ctx.workspaces()?.rename(&from, &to)?;
            ctx.print(&envelope(entry)?)
        }
        WorkspaceCmd::Add { name, dir } => {
            let entry = ctx.workspaces()?.add(&name, &dir, now)?;
            ctx.print(&envelope(entry)?)
        }
        WorkspaceCmd::Forget { name } => {
            let entry = ctx.workspaces()?.forget(&name)?;
            let hint = format!("files left in {}", entry.dir.display());
            ctx.print(&envelope(entry)?.hint(hint))
        }
        WorkspaceCmd::List => {
            let views = ctx.workspaces()?.list();
            ctx.print(&envelope(&views)?.with_meta("count", views.len())?)
        }
        WorkspaceCmd::Export(args) => {
            let bundle = workspace::export(&ctx.store()?)?;
            match args.out {
                Some(path) => {
                    bundle.write(&path)?;
                    ctx.print(&envelope(json!({
                        "path": path,
                        "eventCount": bundle.events.len(),
                    }))?)
                }
                None => ctx.print(&envelope(&bundle)?),
            }
        }
        WorkspaceCmd::Import(args) => {
            let bundle = ExportBundle::read(&args.file)?;
            let root = target_root(ctx, args.name.as_deref(), now)?;
            let (_, report) = workspace::import(&bundle, &root, now)?;
            ctx.print(&envelope(json!({ "root": root, "import": report }))?)
        }
        WorkspaceCmd::Migrate(args) => {
            let root = target_root(ctx, args.name.as_deref(), now)?;
            let report = workspace::migrate(&args.db, &root, now, args.git)?;
            let mut env = envelope(json!({ "root": root, "migration": report }))?;
            if report.skipped > 0 {
                env = env.hint("some legacy rows were skipped; run with -v to see which");
            }
            ctx.print(&env)
        }
    }
}

/// `--dir` when given, else a new local workspace named `name`.
fn target_root(ctx: &Ctx, name: Option<&str>, now: OffsetDateTime) -> Result<PathBuf> {
    if let Some(dir) = ctx.explicit_dir() {
        return Ok(dir.to_path_buf());
    }
    let name = name.ok_or_else(|| WorkspaceError::InvalidName {
        name: String::new(),
        reason: "pass --name or --dir",
    })?;
    Ok(ctx.workspaces()?.create_local(name, now)?.dir)
}
