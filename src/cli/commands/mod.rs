//! One module per command family; each exposes its clap subcommand enum
//! and a handler that runs it against a [`Ctx`](super::Ctx).

pub(super) mod admin;
pub(super) mod attachments;
pub(super) mod deps;
pub(super) mod events;
pub(super) mod identity;
pub(super) mod items;
pub(super) mod notes;
pub(super) mod outlines;
pub(super) mod projects;
pub(super) mod sync;
pub(super) mod workspace;
