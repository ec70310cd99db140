//! Checkpoint CLI - argument model, dispatch sequence and rendering

pub mod args;
pub mod cli_sequence;
pub mod util;

pub use args::{Action, Args};
pub use cli_sequence::{CliSequence, CliState};
