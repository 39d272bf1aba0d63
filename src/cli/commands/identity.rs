use clap::{Args, Subcommand};

use super::super::{Ctx, envelope};
use crate::Result;
use crate::core::ActorKind;
use crate::ops::AgentRequest;

#[derive(Subcommand, Debug)]
pub enum IdentityCmd {
    /// Register a human or an agent.
    Create(CreateArgs),
    /// Make an actor current.
    Use { actor: String },
    #[command(alias = "ls")]
    List,
    /// The acting identity.
    Whoami,
    /// Agent identities.
    Agent {
        #[command(subcommand)]
        cmd: IdentityAgentCmd,
    },
}

#[derive(Subcommand, Debug)]
pub enum IdentityAgentCmd {
    /// Find or mint the agent for a session.
    Ensure(EnsureArgs),
}

#[derive(Subcommand, Debug)]
pub enum AgentCmd {
    /// Ensure the session agent, make it current and claim an item.
    Start(StartArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub name: String,
    /// human or agent.
    #[arg(long, default_value = "human")]
    pub kind: ActorKind,
    /// Owning human of an agent.
    #[arg(long)]
    pub user: Option<String>,
    /// Make the new actor current.
    #[arg(long = "use")]
    pub make_current: bool,
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Session token; a trailing date is hashed into a stable suffix.
    #[arg(long, env = "CLARITY_AGENT_SESSION")]
    pub session: Option<String>,
    /// Display name of a newly minted agent.
    #[arg(long, env = "CLARITY_AGENT_NAME")]
    pub name: Option<String>,
    /// Owning human (default: the current actor's).
    #[arg(long, env = "CLARITY_AGENT_USER")]
    pub user: Option<String>,
}

impl SessionArgs {
    fn request(self, make_current: bool) -> AgentRequest {
        AgentRequest {
            session: self.session,
            name: self.name,
            user: self.user,
            make_current,
        }
    }
}

#[derive(Args, Debug)]
pub struct EnsureArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// Make the agent current.
    #[arg(long = "use")]
    pub make_current: bool,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    pub item: String,
    #[command(flatten)]
    pub session: SessionArgs,
    /// Take the item over from another assignee.
    #[arg(long)]
    pub take_assigned: bool,
}

pub(crate) fn handle(ctx: &Ctx, cmd: IdentityCmd) -> Result<()> {
    match cmd {
        IdentityCmd::Create(args) => ctx.write(|engine| {
            let actor = engine.create_identity(
                args.kind,
                &args.name,
                args.user.as_deref(),
                args.make_current,
            )?;
            envelope(actor)
        }),
        IdentityCmd::Use { actor } => ctx.write(|engine| envelope(engine.use_identity(&actor)?)),
        IdentityCmd::List => ctx.read(|engine| {
            let actors = engine.actors();
            let current = engine.current_actor().ok().map(|a| a.id.clone());
            Ok(envelope(&actors)?.with_meta("currentActorId", current)?)
        }),
        IdentityCmd::Whoami => ctx.read(|engine| envelope(engine.whoami()?)),
        IdentityCmd::Agent {
            cmd: IdentityAgentCmd::Ensure(args),
        } => {
            let req = args.session.request(args.make_current);
            ctx.write(|engine| {
                let ensured = engine.ensure_agent(&req)?;
                let hint = format!(
                    "reuse this agent with CLARITY_AGENT_SESSION={}",
                    ensured.session
                );
                Ok(envelope(ensured)?.hint(hint))
            })
        }
    }
}

pub(crate) fn handle_agent(ctx: &Ctx, cmd: AgentCmd) -> Result<()> {
    match cmd {
        AgentCmd::Start(args) => {
            let req = args.session.request(true);
            ctx.write(|engine| envelope(engine.agent_start(&args.item, &req, args.take_assigned)?))
        }
    }
}
