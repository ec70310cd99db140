//! Checkpoint lifecycle: init, create, restore, delete
//!
//! A project moves from uninitialized to initialized through `init`;
//! `create`, `restore` and `delete` then operate on the initialized store.
//! Each operation rebuilds the inner sequence with its own stages and runs
//! them lowest order first, threading one [`PipelineState`] through.

use crate::checkpoint::{
    latest_version, list_versions, validate_name, version_tag, CheckpointMetadata,
    CheckpointTarget, FILES_DIR_NAME,
};
use crate::io_sequence::IoSequence;
use crate::state::{PipelineState, RestoreRequest};
use checkpoint_core::crypt::{self, content_hash};
use checkpoint_core::io::{atomic_write, resolve_within, resolve_write_target};
use checkpoint_core::{
    Access, Error, ExecutionPolicy, Io, IoMode, ProjectConfig, Result, Sequence,
};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use ulid::Ulid;

/// Name of the lifecycle sequence in logs
pub const CHECKPOINT_SEQUENCE_NAME: &str = "CheckpointSequence";

/// Lifecycle operations over one project
#[derive(Debug)]
pub struct CheckpointSequence {
    config: ProjectConfig,
    sequence: Sequence<PipelineState>,
}

impl CheckpointSequence {
    /// Operate on the project described by `config`
    pub fn new(config: ProjectConfig) -> Self {
        Self {
            config,
            sequence: Sequence::new(CHECKPOINT_SEQUENCE_NAME),
        }
    }

    /// Load the configuration of an initialized project
    pub fn open(root: &Path) -> Result<Self> {
        Ok(Self::new(ProjectConfig::load(root)?))
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Registered stages of the last operation
    pub fn sequence(&self) -> &Sequence<PipelineState> {
        &self.sequence
    }

    /// Create the store, key and configuration
    pub fn seq_init_checkpoint(&mut self) -> Result<()> {
        self.sequence.flush_sequence();
        self.sequence
            .add_sequence_function("seq_require_uninitialized", seq_require_uninitialized, 0)?;
        self.sequence
            .add_sequence_function("seq_create_store", seq_create_store, 1)?;
        self.sequence
            .add_sequence_function("seq_generate_key", seq_generate_key, 2)?;
        self.sequence
            .add_sequence_function("seq_write_config", seq_write_config, 3)?;
        self.finish_with("init");

        self.run(PipelineState::new(self.config.clone()))?;
        tracing::info!(root = %self.config.root.display(), "Initialized project");
        Ok(())
    }

    /// Capture the project tree as the next version of `name`
    ///
    /// The version is assembled in the staging area and only published by
    /// rename once complete; a failed create leaves nothing behind.
    pub fn seq_create_checkpoint(&mut self, name: &str) -> Result<CheckpointMetadata> {
        let staging = self.config.tmp_dir().join(Ulid::new().to_string());

        self.sequence.flush_sequence();
        self.sequence
            .add_sequence_function("seq_require_initialized", seq_require_initialized, 0)?;
        let checkpoint = name.to_string();
        self.sequence.add_sequence_function(
            "seq_validate_name",
            move |state| seq_validate_name(state, &checkpoint),
            1,
        )?;
        let (checkpoint, staging_dir) = (name.to_string(), staging.clone());
        self.sequence.add_sequence_function(
            "seq_stage_version",
            move |state| seq_stage_version(state, &checkpoint, &staging_dir),
            2,
        )?;
        self.sequence
            .add_sub_sequence(IoSequence::new()?.into_sequence(), 3)?;
        self.sequence
            .add_sequence_function("seq_write_payloads", seq_write_payloads, 4)?;
        self.sequence
            .add_sequence_function("seq_write_metadata", seq_write_metadata, 5)?;
        self.sequence
            .add_sequence_function("seq_publish_checkpoint", seq_publish_checkpoint, 6)?;
        self.finish_with("create");

        let state = match self.run(PipelineState::new(self.config.clone())) {
            Ok(state) => state,
            Err(e) => {
                if staging.exists() {
                    match fs::remove_dir_all(&staging) {
                        Ok(()) => tracing::warn!(staging = %staging.display(), "Discarded partial checkpoint"),
                        Err(cleanup) => tracing::error!(
                            staging = %staging.display(),
                            error = %cleanup,
                            "Failed to discard partial checkpoint"
                        ),
                    }
                }
                return Err(e);
            }
        };

        state.metadata.ok_or_else(|| {
            Error::CorruptData(format!("checkpoint '{}' was published without metadata", name))
        })
    }

    /// Write a checkpoint version back into the project tree
    ///
    /// Every payload is decrypted and verified before any file is touched.
    /// Files absent from the checkpoint are left alone.
    pub fn seq_restore_checkpoint(
        &mut self,
        name: &str,
        version: Option<u32>,
    ) -> Result<CheckpointMetadata> {
        self.sequence.flush_sequence();
        self.sequence
            .add_sequence_function("seq_require_initialized", seq_require_initialized, 0)?;
        self.sequence
            .add_sequence_function("seq_locate_checkpoint", seq_locate_checkpoint, 1)?;
        self.sequence
            .add_sequence_function("seq_decrypt_files", seq_decrypt_files, 2)?;
        self.sequence
            .add_sequence_function("seq_write_files", seq_write_files, 3)?;
        self.sequence
            .add_sequence_function("seq_set_current", seq_set_current, 4)?;
        self.finish_with("restore");

        let mut state = PipelineState::new(self.config.clone());
        state.restore = Some(RestoreRequest {
            name: name.to_string(),
            version,
        });
        let state = self.run(state)?;

        state.metadata.ok_or_else(|| Error::CheckpointNotFound(name.to_string()))
    }

    /// Remove every version of `name`
    pub fn seq_delete_checkpoint(&mut self, name: &str) -> Result<()> {
        self.sequence.flush_sequence();
        self.sequence
            .add_sequence_function("seq_require_initialized", seq_require_initialized, 0)?;
        let checkpoint = name.to_string();
        self.sequence.add_sequence_function(
            "seq_remove_checkpoint",
            move |state| seq_remove_checkpoint(state, &checkpoint),
            1,
        )?;
        self.sequence
            .add_sequence_function("seq_write_config", seq_write_config, 2)?;
        self.finish_with("delete");

        self.run(PipelineState::new(self.config.clone()))?;
        Ok(())
    }

    /// Engine version
    pub fn seq_version(&self) -> &'static str {
        let version = env!("CARGO_PKG_VERSION");
        tracing::info!(version, "checkpoint engine");
        version
    }

    fn finish_with(&mut self, action: &'static str) {
        self.sequence.on_sequence_end(move |state: &PipelineState| {
            tracing::debug!(
                action,
                checkpoints = state.config.checkpoints.len(),
                current = ?state.config.current_checkpoint,
                "Checkpoint operation finished"
            );
        });
    }

    fn run(&mut self, state: PipelineState) -> Result<PipelineState> {
        let state = self
            .sequence
            .execute_sequence(ExecutionPolicy::IncreasingOrder, true, state)?;
        self.config = state.config.clone();
        Ok(state)
    }
}

pub fn seq_require_uninitialized(state: PipelineState) -> Result<PipelineState> {
    if ProjectConfig::is_initialized(&state.config.root) {
        tracing::warn!(root = %state.config.root.display(), "Project is already initialized");
        return Err(Error::AlreadyInitialized(state.config.root.clone()));
    }
    Ok(state)
}

pub fn seq_require_initialized(state: PipelineState) -> Result<PipelineState> {
    if !ProjectConfig::is_initialized(&state.config.root) {
        tracing::warn!(root = %state.config.root.display(), "Project is not initialized");
        return Err(Error::NotInitialized(state.config.root.clone()));
    }
    Ok(state)
}

pub fn seq_create_store(state: PipelineState) -> Result<PipelineState> {
    state.config.validate()?;
    let io = Io::new(&state.config.root, IoMode::All)?;
    io.make_dir(state.config.tmp_dir())?;
    Ok(state)
}

/// Generate the project key, keeping one left over from an earlier store
pub fn seq_generate_key(state: PipelineState) -> Result<PipelineState> {
    let store = state.config.store_dir();
    match crypt::generate_key(&state.config.key_name, &store, false) {
        Ok(_) => {}
        Err(Error::KeyExists(path)) => {
            tracing::info!(path = %path.display(), "Reusing existing key");
        }
        Err(e) => return Err(e),
    }
    Ok(state)
}

pub fn seq_write_config(state: PipelineState) -> Result<PipelineState> {
    state.config.save()?;
    Ok(state)
}

fn seq_validate_name(state: PipelineState, name: &str) -> Result<PipelineState> {
    if let Err(e) = validate_name(name, &state.config) {
        tracing::warn!(checkpoint = %name, error = %e, "Rejected checkpoint name");
        return Err(e);
    }
    Ok(state)
}

fn seq_stage_version(mut state: PipelineState, name: &str, staging: &Path) -> Result<PipelineState> {
    let version = latest_version(&state.config.checkpoint_dir(name))?.map_or(1, |v| v + 1);

    let io = Io::new(&state.config.store_dir(), IoMode::All)?;
    io.make_dir(staging.join(FILES_DIR_NAME))?;

    tracing::debug!(
        checkpoint = %name,
        version = %version_tag(version),
        staging = %staging.display(),
        "Staging checkpoint"
    );
    state.target = Some(CheckpointTarget {
        id: Ulid::new(),
        name: name.to_string(),
        version,
        staging: staging.to_path_buf(),
    });
    Ok(state)
}

pub fn seq_write_payloads(state: PipelineState) -> Result<PipelineState> {
    let target = require_target(&state)?;
    let io = Io::new(target.staging.join(FILES_DIR_NAME), IoMode::All)?;

    for (rel_path, blob) in &state.encrypted {
        let payload = resolve_within(io.path(), rel_path)?;
        if let Some(parent) = payload.parent() {
            io.make_dir(parent)?;
        }
        io.write(&payload, Access::Create, blob)?;
    }
    Ok(state)
}

pub fn seq_write_metadata(mut state: PipelineState) -> Result<PipelineState> {
    let target = require_target(&state)?.clone();
    let crypt = state.config.crypt()?;

    let metadata = CheckpointMetadata {
        id: target.id,
        name: target.name.clone(),
        version: target.version,
        created_at: Utc::now(),
        root: state.config.root.clone(),
        ignore_dirs: state.config.ignore_dirs.clone(),
        key_fingerprint: crypt.fingerprint(),
        directories: state.directories.clone(),
        files: state.entries.iter().map(|entry| entry.record()).collect(),
    };
    metadata.write(&target.staging)?;

    state.metadata = Some(metadata);
    Ok(state)
}

pub fn seq_publish_checkpoint(mut state: PipelineState) -> Result<PipelineState> {
    let target = require_target(&state)?.clone();
    let checkpoint_dir = state.config.checkpoint_dir(&target.name);
    let published = target.published_dir(&state.config);

    fs::create_dir_all(&checkpoint_dir).map_err(|e| Error::from_io(e, &checkpoint_dir))?;
    if published.exists() {
        return Err(Error::NameConflict {
            name: target.name.clone(),
            reason: format!("{} already exists", version_tag(target.version)),
        });
    }
    fs::rename(&target.staging, &published).map_err(|e| Error::from_io(e, &published))?;

    if !state.config.checkpoints.contains(&target.name) {
        state.config.checkpoints.push(target.name.clone());
    }
    state.config.save()?;

    tracing::info!(
        checkpoint = %target.name,
        version = %version_tag(target.version),
        files = state.entries.len(),
        "Created checkpoint"
    );
    Ok(state)
}

pub fn seq_locate_checkpoint(mut state: PipelineState) -> Result<PipelineState> {
    let request = state
        .restore
        .clone()
        .ok_or_else(|| Error::InvalidArgument("no checkpoint selected for restore".into()))?;
    validate_name(&request.name, &state.config)?;

    let versions = list_versions(&state.config.checkpoint_dir(&request.name))?;
    let version = match request.version {
        Some(v) if versions.contains(&v) => v,
        Some(v) => {
            tracing::warn!(checkpoint = %request.name, version = %version_tag(v), "Unknown version");
            return Err(Error::CheckpointNotFound(format!(
                "{} {}",
                request.name,
                version_tag(v)
            )));
        }
        None => match versions.last() {
            Some(v) => *v,
            None => {
                tracing::warn!(checkpoint = %request.name, "Unknown checkpoint");
                return Err(Error::CheckpointNotFound(request.name));
            }
        },
    };

    let version_dir = version_dir(&state.config, &request.name, version);
    state.metadata = Some(CheckpointMetadata::read(&version_dir)?);
    Ok(state)
}

pub fn seq_decrypt_files(mut state: PipelineState) -> Result<PipelineState> {
    let metadata = require_metadata(&state)?.clone();
    let crypt = state.config.crypt()?;
    if metadata.key_fingerprint != crypt.fingerprint() {
        tracing::warn!(
            checkpoint = %metadata.name,
            expected = %metadata.key_fingerprint,
            found = %crypt.fingerprint(),
            "Checkpoint was sealed with a different key"
        );
        return Err(Error::InvalidKey);
    }

    let files_dir = version_dir(&state.config, &metadata.name, metadata.version).join(FILES_DIR_NAME);
    let io = Io::new(&files_dir, IoMode::Strict)?;

    let mut decrypted = std::collections::BTreeMap::new();
    for record in &metadata.files {
        // every target must be writable in place before anything is written
        resolve_write_target(&state.config.root, &record.path)?;

        let payload = resolve_within(io.path(), &record.path)?;
        let content = crypt.decrypt(&io.read(&payload)?)?;
        if content_hash(&content) != record.content_hash {
            tracing::warn!(path = %record.path, "Restored content does not match its recorded hash");
            return Err(Error::CorruptData(format!("hash mismatch for {}", record.path)));
        }
        decrypted.insert(record.path.clone(), content);
    }

    state.decrypted = decrypted;
    Ok(state)
}

pub fn seq_write_files(mut state: PipelineState) -> Result<PipelineState> {
    let root = state.config.root.clone();
    let mut restored = Vec::with_capacity(state.decrypted.len());

    for (rel_path, content) in &state.decrypted {
        let target = resolve_write_target(&root, rel_path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::from_io(e, parent))?;
        }
        atomic_write(&target, content)?;
        restored.push(rel_path.clone());
    }

    state.restored = restored;
    Ok(state)
}

pub fn seq_set_current(mut state: PipelineState) -> Result<PipelineState> {
    let metadata = require_metadata(&state)?.clone();
    if !state.config.checkpoints.contains(&metadata.name) {
        state.config.checkpoints.push(metadata.name.clone());
    }
    state.config.current_checkpoint = Some(metadata.name.clone());
    state.config.save()?;

    tracing::info!(
        checkpoint = %metadata.name,
        version = %metadata.version_tag(),
        files = state.restored.len(),
        "Restored checkpoint"
    );
    Ok(state)
}

fn seq_remove_checkpoint(mut state: PipelineState, name: &str) -> Result<PipelineState> {
    let checkpoint_dir = state.config.checkpoint_dir(name);
    let known = state.config.checkpoints.iter().any(|c| c == name);
    if !known && !checkpoint_dir.is_dir() {
        tracing::warn!(checkpoint = %name, "Unknown checkpoint");
        return Err(Error::CheckpointNotFound(name.to_string()));
    }
    validate_name(name, &state.config)?;

    if checkpoint_dir.is_dir() {
        Io::new(state.config.store_dir(), IoMode::All)?.delete_dir(&checkpoint_dir)?;
    }
    state.config.checkpoints.retain(|c| c != name);
    if state.config.current_checkpoint.as_deref() == Some(name) {
        tracing::info!(checkpoint = %name, "Cleared current checkpoint");
        state.config.current_checkpoint = None;
    }

    tracing::info!(checkpoint = %name, "Deleted checkpoint");
    Ok(state)
}

fn version_dir(config: &ProjectConfig, name: &str, version: u32) -> PathBuf {
    config.checkpoint_dir(name).join(version_tag(version))
}

fn require_target(state: &PipelineState) -> Result<&CheckpointTarget> {
    state
        .target
        .as_ref()
        .ok_or_else(|| Error::InvalidArgument("no checkpoint version staged".into()))
}

fn require_metadata(state: &PipelineState) -> Result<&CheckpointMetadata> {
    state
        .metadata
        .as_ref()
        .ok_or_else(|| Error::InvalidArgument("no checkpoint version located".into()))
}
