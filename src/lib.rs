#![forbid(unsafe_code)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod git;
pub mod ops;
pub mod output;
pub mod paths;
pub mod store;
pub mod telemetry;
pub mod workspace;

pub use error::{Error, ErrorKind, Transience};
pub type Result<T> = std::result::Result<T, Error>;

pub use crate::core::{
    Actor, ActorId, ActorKind, Attachment, Comment, DateTime, DepType, Dependency, Event,
    EventType, Item, ItemId, Outline, OutlineId, Priority, Project, ProjectId, State, StatusId,
};
pub use crate::ops::{Clock, Engine, EngineOptions};
pub use crate::store::Store;
