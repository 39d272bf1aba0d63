#[path = "integration/fixtures/mod.rs"]
mod fixtures;

#[path = "integration/cli/mod.rs"]
mod cli;
