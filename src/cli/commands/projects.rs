use clap::Subcommand;

use super::super::{Ctx, envelope};
use crate::Result;

#[derive(Subcommand, Debug)]
pub enum ProjectsCmd {
    /// Create a project (with its default outline) and make it current.
    Create { name: String },
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        archived: bool,
    },
    /// Make a project current in this copy of the workspace.
    Use { project: String },
    Current,
    Rename { project: String, name: String },
    Archive {
        project: String,
        /// Restore instead.
        #[arg(long)]
        undo: bool,
    },
}

pub(crate) fn handle(ctx: &Ctx, cmd: ProjectsCmd) -> Result<()> {
    match cmd {
        ProjectsCmd::Create { name } => ctx.write(|engine| envelope(engine.create_project(&name)?)),
        ProjectsCmd::List { archived } => ctx.read(|engine| {
            let projects = engine.projects(archived);
            let current = engine.current_project().ok().map(|p| p.id.clone());
            Ok(envelope(&projects)?.with_meta("currentProjectId", current)?)
        }),
        ProjectsCmd::Use { project } => ctx.write(|engine| envelope(engine.use_project(&project)?)),
        ProjectsCmd::Current => ctx.read(|engine| envelope(engine.current_project()?)),
        ProjectsCmd::Rename { project, name } => {
            ctx.write(|engine| envelope(engine.rename_project(&project, &name)?))
        }
        ProjectsCmd::Archive { project, undo } => {
            ctx.write(|engine| envelope(engine.archive_project(&project, !undo)?))
        }
    }
}
