use clap::{ArgAction, Args, Subcommand, builder::BoolishValueParser};

use super::super::{Ctx, envelope};
use crate::Result;
use crate::ops::StatusPatch;

#[derive(Subcommand, Debug)]
pub enum OutlinesCmd {
    Create {
        /// Default: the current project.
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        archived: bool,
    },
    Show { outline: String },
    Archive {
        outline: String,
        #[arg(long)]
        undo: bool,
    },
    /// Status definitions of an outline.
    Status {
        #[command(subcommand)]
        cmd: StatusCmd,
    },
}

#[derive(Subcommand, Debug)]
pub enum StatusCmd {
    #[command(alias = "ls")]
    List { outline: String },
    Add(StatusAddArgs),
    Update(StatusUpdateArgs),
    /// Refused while items still use the status.
    Remove { outline: String, status: String },
    /// Name every status once, in the new order.
    Reorder {
        outline: String,
        #[arg(required = true, num_args = 1..)]
        statuses: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct StatusAddArgs {
    pub outline: String,
    pub label: String,
    /// Items in this status count as done.
    #[arg(long)]
    pub end: bool,
    /// Entering this status needs a note.
    #[arg(long)]
    pub require_note: bool,
    /// Zero-based slot; default last.
    #[arg(long)]
    pub position: Option<usize>,
}

#[derive(Args, Debug)]
pub struct StatusUpdateArgs {
    pub outline: String,
    /// Status id or label.
    pub status: String,
    #[arg(long)]
    pub label: Option<String>,
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub end: Option<bool>,
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub require_note: Option<bool>,
}

pub(crate) fn handle(ctx: &Ctx, cmd: OutlinesCmd) -> Result<()> {
    match cmd {
        OutlinesCmd::Create { project, name } => ctx.write(|engine| {
            envelope(engine.create_outline(project.as_deref(), name.as_deref())?)
        }),
        OutlinesCmd::List { project, archived } => ctx.read(|engine| {
            let outlines = engine.outlines(project.as_deref(), archived)?;
            Ok(envelope(&outlines)?.with_meta("count", outlines.len())?)
        }),
        OutlinesCmd::Show { outline } => ctx.read(|engine| {
            let outline = engine.outline(&outline)?;
            let items = engine
                .state()
                .items
                .values()
                .filter(|i| i.outline_id == outline.id && !i.archived)
                .count();
            Ok(envelope(outline)?.with_meta("itemCount", items)?)
        }),
        OutlinesCmd::Archive { outline, undo } => {
            ctx.write(|engine| envelope(engine.archive_outline(&outline, !undo)?))
        }
        OutlinesCmd::Status { cmd } => handle_status(ctx, cmd),
    }
}

fn handle_status(ctx: &Ctx, cmd: StatusCmd) -> Result<()> {
    match cmd {
        StatusCmd::List { outline } => ctx.read(|engine| {
            let outline = engine.outline(&outline)?;
            Ok(envelope(&outline.status_defs)?.with_meta("outlineId", &outline.id)?)
        }),
        StatusCmd::Add(args) => ctx.write(|engine| {
            let outline = engine.add_status(
                &args.outline,
                &args.label,
                args.end,
                args.require_note,
                args.position,
            )?;
            envelope(outline)
        }),
        StatusCmd::Update(args) => ctx.write(|engine| {
            let patch = StatusPatch {
                label: args.label.clone(),
                is_end_state: args.end,
                require_note: args.require_note,
            };
            envelope(engine.update_status(&args.outline, &args.status, patch)?)
        }),
        StatusCmd::Remove { outline, status } => {
            ctx.write(|engine| envelope(engine.remove_status(&outline, &status)?))
        }
        StatusCmd::Reorder { outline, statuses } => {
            ctx.write(|engine| envelope(engine.reorder_statuses(&outline, &statuses)?))
        }
    }
}
