//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; single route table dispatches to the pipeline and store.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::StreamRenderer;
pub use route::RunContext;
