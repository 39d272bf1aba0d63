use clap::Subcommand;

use super::super::{Ctx, envelope};
use crate::Result;

#[derive(Subcommand, Debug)]
pub enum CommentsCmd {
    Add {
        item: String,
        body: String,
        /// Comment id on the same item.
        #[arg(long)]
        reply_to: Option<String>,
    },
    #[command(alias = "ls")]
    List { item: String },
}

#[derive(Subcommand, Debug)]
pub enum WorklogCmd {
    Add { item: String, body: String },
    /// Entries written by actors of your human.
    #[command(alias = "ls")]
    List { item: String },
}

pub(crate) fn handle_comments(ctx: &Ctx, cmd: CommentsCmd) -> Result<()> {
    match cmd {
        CommentsCmd::Add {
            item,
            body,
            reply_to,
        } => ctx.write(|engine| envelope(engine.add_comment(&item, &body, reply_to.as_deref())?)),
        CommentsCmd::List { item } => ctx.read(|engine| {
            let comments = engine.list_comments(&item)?;
            Ok(envelope(&comments)?.with_meta("count", comments.len())?)
        }),
    }
}

pub(crate) fn handle_worklog(ctx: &Ctx, cmd: WorklogCmd) -> Result<()> {
    match cmd {
        WorklogCmd::Add { item, body } => ctx.write(|engine| envelope(engine.add_worklog(&item, &body)?)),
        WorklogCmd::List { item } => ctx.read(|engine| {
            let entries = engine.list_worklog(&item)?;
            Ok(envelope(&entries)?.with_meta("count", entries.len())?)
        }),
    }
}
