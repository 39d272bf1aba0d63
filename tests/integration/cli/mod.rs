mod scenarios;
mod surface;
mod sync;
mod workspaces;
