//! CLI surface for clarity.
//!
//! - One envelope on stdout per command; logs and errors on stderr
//! - Thin handlers over [`Engine`](crate::ops::Engine)
//! - Forgiving flag spelling (`--on_hold`, `--On-Hold`)

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;

use crate::config::{self, Config, OutputFormat};
use crate::git::{self, GitSync};
use crate::ops::{Clock, Engine, EngineOptions};
use crate::output::Envelope;
use crate::store::Store;
use crate::store::reindex::reindex;
use crate::telemetry::{self, TelemetryConfig};
use crate::workspace::{ResolvedWorkspace, WorkspaceError, Workspaces};
use crate::{Result, paths};

mod commands;
mod parse;

// =============================================================================
// Entry + global options
// =============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "clarity",
    version,
    about = "Local-first work tracker for humans and agents",
    infer_subcommands = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Workspace directory (bypasses the registry).
    #[arg(long, global = true, env = "CLARITY_DIR", value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Registered workspace name.
    #[arg(long, global = true, env = "CLARITY_WORKSPACE", value_name = "NAME")]
    pub workspace: Option<String>,

    /// Act as this actor (id or exact name) instead of the current one.
    #[arg(long, global = true, env = "CLARITY_ACTOR", value_name = "ACTOR")]
    pub actor: Option<String>,

    /// Indent the output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Output format: json or edn.
    #[arg(long, global = true, env = "CLARITY_FORMAT", value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// More logging on stderr (repeat for more).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the workspace layout.
    Init(commands::admin::InitArgs),

    /// Workspace, identity and git overview.
    Status,

    /// Check the event log for problems.
    Doctor(commands::admin::DoctorArgs),

    /// Rebuild the snapshot from the event log.
    Reindex,

    /// Named workspaces.
    #[command(alias = "ws")]
    Workspace {
        #[command(subcommand)]
        cmd: commands::workspace::WorkspaceCmd,
    },

    /// Humans and agents.
    #[command(alias = "identities")]
    Identity {
        #[command(subcommand)]
        cmd: commands::identity::IdentityCmd,
    },

    /// Agent shortcuts.
    Agent {
        #[command(subcommand)]
        cmd: commands::identity::AgentCmd,
    },

    #[command(alias = "project")]
    Projects {
        #[command(subcommand)]
        cmd: commands::projects::ProjectsCmd,
    },

    #[command(alias = "outline")]
    Outlines {
        #[command(subcommand)]
        cmd: commands::outlines::OutlinesCmd,
    },

    #[command(alias = "item")]
    Items {
        #[command(subcommand)]
        cmd: commands::items::ItemsCmd,
    },

    /// Dependencies between items.
    #[command(alias = "dep")]
    Deps {
        #[command(subcommand)]
        cmd: commands::deps::DepsCmd,
    },

    #[command(alias = "comment")]
    Comments {
        #[command(subcommand)]
        cmd: commands::notes::CommentsCmd,
    },

    /// Private notes visible to the author's human.
    Worklog {
        #[command(subcommand)]
        cmd: commands::notes::WorklogCmd,
    },

    #[command(alias = "attachment")]
    Attachments {
        #[command(subcommand)]
        cmd: commands::attachments::AttachmentsCmd,
    },

    /// Read the event log.
    Events {
        #[command(subcommand)]
        cmd: commands::events::EventsCmd,
    },

    /// Git synchronization.
    Sync {
        #[command(subcommand)]
        cmd: commands::sync::SyncCmd,
    },
}

pub fn parse_from<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let raw: Vec<OsString> = args.into_iter().map(|t| t.into()).collect();
    Cli::parse_from(parse::normalize_args(raw))
}

/// Run the CLI (used by bin).
pub fn run(cli: Cli) -> Result<()> {
    let mut ctx = Ctx::new(&cli)?;
    let _telemetry = telemetry::init(TelemetryConfig::new(
        cli.verbose,
        ctx.config.logging.clone(),
    ));
    for warning in std::mem::take(&mut ctx.config_warnings) {
        tracing::warn!("{warning}");
    }
    tracing::debug!(root = ?ctx.resolved.as_ref().map(|r| &r.root), "workspace resolved");

    match cli.command {
        Commands::Init(args) => commands::admin::init(&ctx, args),
        Commands::Status => commands::admin::status(&ctx),
        Commands::Doctor(args) => commands::admin::doctor(&ctx, args),
        Commands::Reindex => commands::admin::reindex(&ctx),
        Commands::Workspace { cmd } => commands::workspace::handle(&ctx, cmd),
        Commands::Identity { cmd } => commands::identity::handle(&ctx, cmd),
        Commands::Agent { cmd } => commands::identity::handle_agent(&ctx, cmd),
        Commands::Projects { cmd } => commands::projects::handle(&ctx, cmd),
        Commands::Outlines { cmd } => commands::outlines::handle(&ctx, cmd),
        Commands::Items { cmd } => commands::items::handle(&ctx, cmd),
        Commands::Deps { cmd } => commands::deps::handle(&ctx, cmd),
        Commands::Comments { cmd } => commands::notes::handle_comments(&ctx, cmd),
        Commands::Worklog { cmd } => commands::notes::handle_worklog(&ctx, cmd),
        Commands::Attachments { cmd } => commands::attachments::handle(&ctx, cmd),
        Commands::Events { cmd } => commands::events::handle(&ctx, cmd),
        Commands::Sync { cmd } => commands::sync::handle(&ctx, cmd),
    }
}

// =============================================================================
// Context
// =============================================================================

pub(crate) struct Ctx {
    config_dir: PathBuf,
    dir: Option<PathBuf>,
    workspace: Option<String>,
    actor: Option<String>,
    /// Resolution fails only for an unknown `--workspace`; reported on use.
    resolved: std::result::Result<ResolvedWorkspace, String>,
    config: Config,
    /// Problems found while loading `config`, held until telemetry is up.
    config_warnings: Vec<String>,
    format: OutputFormat,
    pretty: bool,
}

impl Ctx {
    fn new(cli: &Cli) -> Result<Self> {
        let config_dir = paths::config_dir();
        let dir = cli.dir.as_deref().map(absolute);
        let registry = Workspaces::open(&config_dir)?;
        let resolved = registry
            .resolve(dir.as_deref(), cli.workspace.as_deref())
            .map_err(|e| e.to_string());
        let loaded = config::load_or_init(
            &config_dir,
            resolved.as_ref().ok().map(|r| r.root.as_path()),
        );
        let config = loaded.config;
        Ok(Self {
            format: cli.format.unwrap_or(config.output.format),
            pretty: cli.pretty || config.output.pretty,
            config_dir,
            dir,
            workspace: cli.workspace.clone(),
            actor: cli.actor.clone(),
            resolved,
            config,
            config_warnings: loaded.warnings,
        })
    }

    pub(crate) fn workspaces(&self) -> Result<Workspaces> {
        Ok(Workspaces::open(&self.config_dir)?)
    }

    pub(crate) fn resolved(&self) -> Result<&ResolvedWorkspace> {
        self.resolved.as_ref().map_err(|_| {
            WorkspaceError::NotFound(self.workspace.clone().unwrap_or_default()).into()
        })
    }

    pub(crate) fn root(&self) -> Result<&Path> {
        Ok(self.resolved()?.root.as_path())
    }

    pub(crate) fn explicit_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn store(&self) -> Result<Store> {
        Ok(Store::open_existing(self.root()?)?)
    }

    pub(crate) fn engine(&self) -> Result<Engine> {
        let options = EngineOptions {
            actor: self.actor.clone(),
            grace_seconds: self.config.assign_grace_seconds,
            attachment_max_bytes: self.config.attachments.max_bytes,
        };
        Ok(Engine::open(self.store()?, options, Clock::system())?)
    }

    pub(crate) fn print(&self, envelope: &Envelope) -> Result<()> {
        envelope.print(self.format, self.pretty)?;
        Ok(())
    }

    /// Run a read-only command and print its envelope.
    pub(crate) fn read(&self, f: impl FnOnce(&Engine) -> Result<Envelope>) -> Result<()> {
        let engine = self.engine()?;
        let envelope = f(&engine)?;
        self.print(&envelope)
    }

    /// Run a mutating command: refuse while git is mid-merge, save the
    /// snapshot, print, then auto-sync when anything was appended.
    pub(crate) fn write(&self, f: impl FnOnce(&mut Engine) -> Result<Envelope>) -> Result<()> {
        let root = self.root()?;
        GitSync::new(root).ensure_writable()?;
        let mut engine = self.engine()?;
        let envelope = f(&mut engine)?;
        engine.save()?;
        self.print(&envelope)?;
        if !engine.emitted().is_empty() {
            let actor = engine.current_actor().ok().map(|a| a.name.clone());
            self.autosync(engine.store(), actor.as_deref());
        }
        Ok(())
    }

    /// Best effort: failures become a warning and never change the exit code.
    fn autosync(&self, store: &Store, actor_name: Option<&str>) {
        if !self.config.sync.auto {
            return;
        }
        let timeout = Duration::from_secs(self.config.sync.timeout_secs);
        match git::autosync(store.root(), actor_name, timeout) {
            Ok(Some(report)) if report.pulled => {
                if let Err(err) = reindex(store) {
                    eprintln!("warning: reindex after auto-sync failed: {err}");
                }
            }
            Ok(_) => {}
            Err(err) => eprintln!("{}", git::warning(&err)),
        }
    }
}

/// `Envelope::new` lifted into the crate error.
pub(crate) fn envelope(data: impl Serialize) -> Result<Envelope> {
    Ok(Envelope::new(data)?)
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
