use clap::Subcommand;

use super::super::{Ctx, envelope};
use crate::Result;
use crate::ops::EventQuery;

#[derive(Subcommand, Debug)]
pub enum EventsCmd {
    /// Matching events, oldest first.
    #[command(alias = "ls")]
    List {
        /// Events about this item, including deps and comments on it.
        #[arg(long)]
        item: Option<String>,
        #[arg(long)]
        entity: Option<String>,
        /// Exact type, or a family such as `item.`.
        #[arg(long = "type")]
        event_type: Option<String>,
        #[arg(long)]
        actor: Option<String>,
        /// Keep only the newest N.
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
}

pub(crate) fn handle(ctx: &Ctx, cmd: EventsCmd) -> Result<()> {
    match cmd {
        EventsCmd::List {
            item,
            entity,
            event_type,
            actor,
            limit,
        } => {
            let query = EventQuery {
                item,
                entity,
                event_type,
                actor,
                limit,
            };
            ctx.read(|engine| {
                let events = engine.list_events(&query)?;
                Ok(envelope(&events)?.with_meta("count", events.len())?)
            })
        }
    }
}
