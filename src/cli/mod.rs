//! CLI module - argument parsing and interactive prompts

pub mod args;
mod prompts;

pub use args::Cli;
pub use prompts::*;
