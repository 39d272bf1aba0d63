use clap::Subcommand;

use super::super::{Ctx, envelope};
use crate::Result;
use crate::core::DepType;
use crate::ops::DepRef;

#[derive(Subcommand, Debug)]
pub enum DepsCmd {
    /// FROM depends on TO.
    Add {
        from: String,
        to: String,
        /// blocks or related.
        #[arg(long = "type", default_value = "blocks")]
        dep_type: DepType,
    },
    /// Remove by dependency id, or by FROM TO [--type].
    #[command(alias = "rm")]
    Remove {
        id_or_from: String,
        to: Option<String>,
        /// Only with TO; default blocks.
        #[arg(long = "type", requires = "to")]
        dep_type: Option<DepType>,
    },
    /// Incoming and outgoing edges of an item.
    #[command(alias = "ls")]
    List { item: String },
    /// What an item transitively waits on.
    Tree { item: String },
    /// Cycles among blocking edges.
    Cycles,
}

pub(crate) fn handle(ctx: &Ctx, cmd: DepsCmd) -> Result<()> {
    match cmd {
        DepsCmd::Add { from, to, dep_type } => {
            ctx.write(|engine| envelope(engine.add_dep(&from, &to, dep_type)?))
        }
        DepsCmd::Remove {
            id_or_from,
            to,
            dep_type,
        } => {
            let target = match to {
                Some(to) => DepRef::Edge {
                    from: id_or_from,
                    to,
                    dep_type: dep_type.unwrap_or(DepType::Blocks),
                },
                None => DepRef::Id(id_or_from),
            };
            ctx.write(|engine| envelope(engine.remove_dep(&target)?))
        }
        DepsCmd::List { item } => ctx.read(|engine| envelope(engine.list_deps(&item)?)),
        DepsCmd::Tree { item } => ctx.read(|engine| envelope(engine.dep_tree(&item)?)),
        DepsCmd::Cycles => ctx.read(|engine| {
            let cycles = engine.dep_cycles();
            let mut env = envelope(&cycles)?.with_meta("count", cycles.len())?;
            if !cycles.is_empty() {
                env = env.hint("cyclic items never become ready; remove one edge per cycle");
            }
            Ok(env)
        }),
    }
}
