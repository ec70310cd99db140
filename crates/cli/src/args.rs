//! Invocation arguments

use clap::{Parser, ValueEnum};
use journal::checkpoint::parse_version_tag;
use std::fmt;
use std::path::PathBuf;

/// Checkpoint - encrypted, versioned restore points for a project directory
#[derive(Parser, Debug, Clone)]
#[command(name = "checkpoint")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Action to perform
    #[arg(short = 'a', long, value_enum)]
    pub action: Action,

    /// Checkpoint name
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Project root
    #[arg(short = 'p', long, default_value = ".")]
    pub path: PathBuf,

    /// Directory names to ignore at every level (space separated values accepted)
    #[arg(short = 'i', long = "ignore-dirs", num_args = 1..)]
    pub ignore_dirs: Option<Vec<String>>,

    /// Restore this version (e.g. 2 or v2) instead of the latest
    #[arg(long = "version-tag", value_parser = parse_version)]
    pub version_tag: Option<u32>,

    /// Fail on extensions with no registered reader instead of capturing raw bytes
    #[arg(long)]
    pub strict_readers: bool,

    /// Print read models as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Ignore directories with space separated values split apart
    pub fn ignore_dirs(&self) -> Option<Vec<String>> {
        self.ignore_dirs.as_ref().map(|values| {
            values
                .iter()
                .flat_map(|value| value.split_whitespace())
                .map(str::to_string)
                .collect()
        })
    }
}

/// Lifecycle actions and read models
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create the checkpoint store
    Init,
    /// Capture the project as a new checkpoint version
    Create,
    /// Write a checkpoint back into the project
    Restore,
    /// Remove a checkpoint and all its versions
    Delete,
    /// Print the engine version
    Version,
    /// List checkpoints
    List,
    /// Print the current checkpoint
    Current,
    /// Print the captured tree of a checkpoint
    Tree,
    /// Print the configured ignore list
    IgnoreDirs,
    /// Check that the path is usable as a project root
    Validate,
    /// Print and clear the project log
    Logs,
}

impl Action {
    /// Whether the action operates on a named checkpoint
    pub fn requires_name(self) -> bool {
        matches!(
            self,
            Action::Create | Action::Restore | Action::Delete | Action::Tree
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{:?}", self),
        }
    }
}

fn parse_version(value: &str) -> Result<u32, String> {
    parse_version_tag(value)
        .or_else(|| value.parse().ok().filter(|v| *v > 0))
        .ok_or_else(|| format!("'{}' is not a version (expected N or vN, N >= 1)", value))
}
