//! Argument parsing and dispatch as a sequence
//!
//! parse args → determine action → perform action

use crate::args::{Action, Args};
use crate::util;
use checkpoint_core::{Error, ExecutionPolicy, ProjectConfig, Result, Sequence};
use clap::Parser;
use journal::{query, CheckpointSequence};
use std::fs;
use std::path::PathBuf;

/// Name of the dispatch sequence in logs
pub const CLI_SEQUENCE_NAME: &str = "CLISequence";

/// State of one invocation
#[derive(Debug, Clone, Default)]
pub struct CliState {
    /// Raw arguments, program name first
    pub args: Vec<String>,
    pub parsed: Option<Args>,
    pub action: Option<Action>,
    /// Canonical project root
    pub root: Option<PathBuf>,
    /// Lines for stdout
    pub output: Vec<String>,
}

impl CliState {
    pub fn new<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Dispatcher from invocation arguments to checkpoint operations
#[derive(Debug)]
pub struct CliSequence {
    sequence: Sequence<CliState>,
}

impl CliSequence {
    pub fn new() -> Result<Self> {
        let mut cli = Self {
            sequence: Sequence::new(CLI_SEQUENCE_NAME),
        };
        cli.generate_sequence()?;
        Ok(cli)
    }

    /// Register the canonical stages, replacing whatever was registered
    pub fn generate_sequence(&mut self) -> Result<()> {
        self.sequence.flush_sequence();
        self.sequence
            .add_sequence_function("seq_parse_args", seq_parse_args, 0)?;
        self.sequence
            .add_sequence_function("seq_determine_action", seq_determine_action, 1)?;
        self.sequence
            .add_sequence_function("seq_perform_action", seq_perform_action, 2)?;
        Ok(())
    }

    pub fn sequence(&self) -> &Sequence<CliState> {
        &self.sequence
    }

    /// Run one invocation and return its output lines
    pub fn run<I, T>(&mut self, args: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.generate_sequence()?;
        let state = self.sequence.execute_sequence(
            ExecutionPolicy::IncreasingOrder,
            true,
            CliState::new(args),
        )?;
        Ok(state.output)
    }
}

pub fn seq_parse_args(mut state: CliState) -> Result<CliState> {
    let parsed = Args::try_parse_from(&state.args).map_err(|e| {
        tracing::warn!(kind = ?e.kind(), "Invalid arguments");
        Error::InvalidArgument(e.to_string())
    })?;
    state.parsed = Some(parsed);
    Ok(state)
}

pub fn seq_determine_action(mut state: CliState) -> Result<CliState> {
    let args = parsed(&state)?;
    let action = args.action;

    if action.requires_name() && args.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        tracing::warn!(action = %action, "Missing checkpoint name");
        return Err(Error::InvalidArgument(format!(
            "action '{}' requires a checkpoint name (-n)",
            action
        )));
    }

    if !matches!(action, Action::Validate | Action::Version) {
        let root = fs::canonicalize(&args.path).map_err(|e| Error::from_io(e, &args.path))?;
        if !query::validate_path(&root) {
            tracing::warn!(path = %root.display(), "Not a usable project root");
            return Err(Error::PathNotFound(root));
        }
        state.root = Some(root);
    }

    tracing::debug!(action = %action, "Determined action");
    state.action = Some(action);
    Ok(state)
}

pub fn seq_perform_action(mut state: CliState) -> Result<CliState> {
    let args = parsed(&state)?.clone();
    let action = state
        .action
        .ok_or_else(|| Error::InvalidArgument("no action determined".into()))?;
    let name = args.name.clone().unwrap_or_default();

    let output = match action {
        Action::Version => {
            let checkpoints = CheckpointSequence::new(ProjectConfig::new(&args.path));
            vec![format!("checkpoint {}", checkpoints.seq_version())]
        }
        Action::Validate => {
            if !query::validate_path(&args.path) {
                return Err(Error::PathNotFound(args.path.clone()));
            }
            vec![format!("{} is a valid project root", args.path.display())]
        }
        Action::Init => {
            let root = root(&state)?;
            let mut config =
                ProjectConfig::new(&root).with_permissive_readers(!args.strict_readers);
            if let Some(dirs) = args.ignore_dirs() {
                config = config.with_ignore_dirs(dirs);
            }
            CheckpointSequence::new(config).seq_init_checkpoint()?;
            vec![format!("Initialized checkpoint store in {}", root.display())]
        }
        Action::Create => {
            let root = root(&state)?;
            // overrides are persisted with the published version
            let mut config = ProjectConfig::load(&root)?;
            if let Some(dirs) = args.ignore_dirs() {
                config.ignore_dirs = dirs;
            }
            if args.strict_readers {
                config.permissive_readers = false;
            }

            let metadata = CheckpointSequence::new(config).seq_create_checkpoint(&name)?;
            vec![util::describe_version("Created", &metadata)]
        }
        Action::Restore => {
            let root = root(&state)?;
            let metadata = CheckpointSequence::open(&root)?
                .seq_restore_checkpoint(&name, args.version_tag)?;
            vec![util::describe_version("Restored", &metadata)]
        }
        Action::Delete => {
            let root = root(&state)?;
            CheckpointSequence::open(&root)?.seq_delete_checkpoint(&name)?;
            vec![format!("Deleted checkpoint {}", name)]
        }
        Action::List => {
            let root = root(&state)?;
            let checkpoints = query::get_all_checkpoints(&root)?;
            let current = query::get_current_checkpoint(&root)?;
            render(util::render_list(&checkpoints, current.as_deref(), args.json))?
        }
        Action::Current => {
            let root = root(&state)?;
            let current = query::get_current_checkpoint(&root)?;
            render(util::render_current(current.as_deref(), args.json))?
        }
        Action::Tree => {
            let root = root(&state)?;
            let tree = query::generate_tree(&name, &root)?;
            render(util::render_tree(&tree, args.json))?
        }
        Action::IgnoreDirs => {
            let root = root(&state)?;
            render(util::render_ignore_dirs(&query::get_ignore_dirs(&root)?, args.json))?
        }
        Action::Logs => query::read_logs(&root(&state)?)?,
    };

    state.output = output;
    Ok(state)
}

fn parsed(state: &CliState) -> Result<&Args> {
    state
        .parsed
        .as_ref()
        .ok_or_else(|| Error::InvalidArgument("arguments were not parsed".into()))
}

fn root(state: &CliState) -> Result<PathBuf> {
    state
        .root
        .clone()
        .ok_or_else(|| Error::InvalidArgument("no project root resolved".into()))
}

fn render(lines: anyhow::Result<Vec<String>>) -> Result<Vec<String>> {
    lines.map_err(|e| Error::InvalidArgument(format!("{:#}", e)))
}
