mod cli;
mod inputs;

pub(crate) use cli::{init_logging, Cli};
pub(crate) use inputs::{resolve_archives, InputMode};
