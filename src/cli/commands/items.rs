use clap::{ArgAction, Args, Subcommand, builder::BoolishValueParser};

use super::super::parse::date_time;
use super::super::{Ctx, envelope};
use crate::Result;
use crate::core::{DateTime, Priority};
use crate::ops::{ItemQuery, NewItem, Placement, ReadyQuery};

#[derive(Subcommand, Debug)]
pub enum ItemsCmd {
    #[command(alias = "new")]
    Create(CreateArgs),
    /// Items of the current project in tree order.
    #[command(alias = "ls")]
    List(ListArgs),
    /// One item with its deps, comments, worklog and attachments.
    Show { item: String },
    /// Events that touched an item.
    Events {
        item: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    SetTitle { item: String, title: String },
    SetDescription { item: String, description: String },
    /// Change the status (by id or label).
    SetStatus(SetStatusArgs),
    SetPriority { item: String, priority: Priority },
    SetOnHold {
        item: String,
        #[arg(default_value = "true", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
        on_hold: bool,
    },
    SetDue(SetDateArgs),
    SetSchedule(SetDateArgs),
    /// Assign to an actor; ownership follows.
    SetAssign {
        item: String,
        #[arg(required_unless_present = "clear")]
        actor: Option<String>,
        #[arg(long, conflicts_with = "actor")]
        clear: bool,
    },
    Tags {
        #[command(subcommand)]
        cmd: TagsCmd,
    },
    Archive {
        item: String,
        #[arg(long)]
        undo: bool,
    },
    /// Reorder among siblings.
    Move {
        item: String,
        #[command(flatten)]
        placement: PlacementArgs,
    },
    /// Re-parent within the outline.
    SetParent {
        item: String,
        #[arg(required_unless_present = "root")]
        parent: Option<String>,
        /// Make it a top-level item.
        #[arg(long, conflicts_with = "parent")]
        root: bool,
        #[command(flatten)]
        placement: PlacementArgs,
    },
    /// Move an item and its subtree to another outline.
    MoveOutline {
        item: String,
        outline: String,
        #[arg(long)]
        status: Option<String>,
    },
    /// Assign an item to yourself.
    Claim {
        item: String,
        #[arg(long)]
        take_assigned: bool,
    },
    /// Items that can be worked on now.
    Ready(ReadyArgs),
}

#[derive(Subcommand, Debug)]
pub enum TagsCmd {
    Add {
        item: String,
        #[arg(required = true, num_args = 1..)]
        tags: Vec<String>,
    },
    Remove {
        item: String,
        #[arg(required = true, num_args = 1..)]
        tags: Vec<String>,
    },
    /// Replace all tags; none clears them.
    Set { item: String, tags: Vec<String> },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub title: String,
    #[arg(long, short = 'd', default_value = "")]
    pub description: String,
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub outline: Option<String>,
    #[arg(long)]
    pub parent: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long, short = 'p')]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub on_hold: bool,
    #[arg(long, value_parser = date_time)]
    pub due: Option<DateTime>,
    #[arg(long, value_parser = date_time)]
    pub schedule: Option<DateTime>,
    #[arg(long = "tag", short = 't', value_name = "TAG")]
    pub tags: Vec<String>,
    #[arg(long)]
    pub assign: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub project: Option<String>,
    /// Ignore the current project.
    #[arg(long, conflicts_with = "project")]
    pub all: bool,
    #[arg(long)]
    pub outline: Option<String>,
    /// Direct children of this item only.
    #[arg(long)]
    pub parent: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub assigned: Option<String>,
    #[arg(long)]
    pub tag: Option<String>,
    #[arg(long)]
    pub archived: bool,
}

#[derive(Args, Debug)]
pub struct SetStatusArgs {
    pub item: String,
    #[arg(required_unless_present = "clear")]
    pub status: Option<String>,
    /// Recorded as a comment; some statuses require one.
    #[arg(long)]
    pub note: Option<String>,
    #[arg(long, conflicts_with = "status")]
    pub clear: bool,
}

#[derive(Args, Debug)]
pub struct SetDateArgs {
    pub item: String,
    #[arg(value_parser = date_time, required_unless_present = "clear")]
    pub value: Option<DateTime>,
    #[arg(long, conflicts_with = "value")]
    pub clear: bool,
}

#[derive(Args, Debug)]
#[group(multiple = false)]
pub struct PlacementArgs {
    #[arg(long)]
    pub first: bool,
    #[arg(long)]
    pub last: bool,
    #[arg(long, value_name = "SIBLING")]
    pub before: Option<String>,
    #[arg(long, value_name = "SIBLING")]
    pub after: Option<String>,
}

impl PlacementArgs {
    /// Defaults to last.
    fn placement(&self) -> Placement {
        match (&self.before, &self.after) {
            (Some(anchor), _) => Placement::Before(anchor.clone()),
            (_, Some(anchor)) => Placement::After(anchor.clone()),
            _ if self.first => Placement::First,
            _ => Placement::Last,
        }
    }
}

#[derive(Args, Debug)]
pub struct ReadyArgs {
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub outline: Option<String>,
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, value_parser = BoolishValueParser::new(), default_value = "false")]
    pub include_on_hold: bool,
    /// Also items assigned to other actors.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, value_parser = BoolishValueParser::new(), default_value = "false")]
    pub include_assigned: bool,
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

pub(crate) fn handle(ctx: &Ctx, cmd: ItemsCmd) -> Result<()> {
    match cmd {
        ItemsCmd::Create(args) => ctx.write(|engine| {
            let item = engine.create_item(NewItem {
                title: args.title,
                description: args.description,
                project: args.project,
                outline: args.outline,
                parent: args.parent,
                status: args.status,
                priority: args.priority,
                on_hold: args.on_hold,
                due: args.due,
                schedule: args.schedule,
                tags: args.tags,
                assign: args.assign,
            })?;
            envelope(item)
        }),
        ItemsCmd::List(args) => ctx.read(|engine| {
            let items = engine.list_items(&ItemQuery {
                project: args.project,
                all_projects: args.all,
                outline: args.outline,
                parent: args.parent,
                status: args.status,
                assigned: args.assigned,
                tag: args.tag,
                include_archived: args.archived,
            })?;
            Ok(envelope(&items)?.with_meta("count", items.len())?)
        }),
        ItemsCmd::Show { item } => ctx.read(|engine| envelope(engine.show_item(&item)?)),
        ItemsCmd::Events { item, limit } => ctx.read(|engine| {
            let events = engine.item_events(&item, limit)?;
            Ok(envelope(&events)?.with_meta("count", events.len())?)
        }),
        ItemsCmd::SetTitle { item, title } => {
            ctx.write(|engine| envelope(engine.set_title(&item, &title)?))
        }
        ItemsCmd::SetDescription { item, description } => {
            ctx.write(|engine| envelope(engine.set_description(&item, &description)?))
        }
        ItemsCmd::SetStatus(args) => ctx.write(|engine| {
            let status = if args.clear { None } else { args.status.as_deref() };
            envelope(engine.set_status(&args.item, status, args.note.as_deref())?)
        }),
        ItemsCmd::SetPriority { item, priority } => {
            ctx.write(|engine| envelope(engine.set_priority(&item, priority)?))
        }
        ItemsCmd::SetOnHold { item, on_hold } => {
            ctx.write(|engine| envelope(engine.set_on_hold(&item, on_hold)?))
        }
        ItemsCmd::SetDue(args) => {
            ctx.write(|engine| envelope(engine.set_due(&args.item, date_arg(args.value, args.clear))?))
        }
        ItemsCmd::SetSchedule(args) => ctx.write(|engine| {
            envelope(engine.set_schedule(&args.item, date_arg(args.value, args.clear))?)
        }),
        ItemsCmd::SetAssign { item, actor, clear } => ctx.write(|engine| {
            let actor = if clear { None } else { actor.as_deref() };
            envelope(engine.set_assign(&item, actor)?)
        }),
        ItemsCmd::Tags { cmd } => match cmd {
            TagsCmd::Add { item, tags } => ctx.write(|engine| envelope(engine.add_tags(&item, &tags)?)),
            TagsCmd::Remove { item, tags } => {
                ctx.write(|engine| envelope(engine.remove_tags(&item, &tags)?))
            }
            TagsCmd::Set { item, tags } => ctx.write(|engine| envelope(engine.set_tags(&item, &tags)?)),
        },
        ItemsCmd::Archive { item, undo } => {
            ctx.write(|engine| envelope(engine.archive_item(&item, !undo)?))
        }
        ItemsCmd::Move { item, placement } => ctx.write(|engine| {
            let outcome = engine.move_item(&item, &placement.placement())?;
            with_rebalance_hint(outcome.rebalance_count, envelope(&outcome)?)
        }),
        ItemsCmd::SetParent {
            item,
            parent,
            root,
            placement,
        } => ctx.write(|engine| {
            let parent = if root { None } else { parent.as_deref() };
            let outcome = engine.set_parent(&item, parent, &placement.placement())?;
            with_rebalance_hint(outcome.rebalance_count, envelope(&outcome)?)
        }),
        ItemsCmd::MoveOutline {
            item,
            outline,
            status,
        } => ctx.write(|engine| {
            envelope(engine.move_outline(&item, &outline, status.as_deref())?)
        }),
        ItemsCmd::Claim {
            item,
            take_assigned,
        } => ctx.write(|engine| envelope(engine.claim(&item, take_assigned)?)),
        ItemsCmd::Ready(args) => ctx.read(|engine| {
            let items = engine.ready(&ReadyQuery {
                project: args.project,
                outline: args.outline,
                include_on_hold: args.include_on_hold,
                include_assigned: args.include_assigned,
                limit: args.limit,
            })?;
            let mut env = envelope(&items)?.with_meta("count", items.len())?;
            if let Some(first) = items.first() {
                env = env.hint(format!("clarity items claim {}", first.id));
            }
            Ok(env)
        }),
    }
}

fn date_arg(value: Option<DateTime>, clear: bool) -> Option<DateTime> {
    if clear { None } else { value }
}

fn with_rebalance_hint(rebalanced: usize, env: crate::output::Envelope) -> Result<crate::output::Envelope> {
    Ok(if rebalanced > 0 {
        env.hint(format!("{rebalanced} sibling rank(s) were rewritten to make room"))
    } else {
        env
    })
}
