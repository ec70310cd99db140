//! Data-gathering pipeline of a checkpoint
//!
//! walk directories → group files → map readers → read files → encrypt files

use crate::checkpoint::{DirectoryGroup, ROOT_DIR_KEY};
use crate::state::{FileEntry, PipelineState};
use checkpoint_core::crypt::content_hash;
use checkpoint_core::io::{get_file_extension, normalize_path};
use checkpoint_core::readers::get_reader_by_extension;
use checkpoint_core::{Error, ExecutionPolicy, Io, IoMode, ReaderKind, Result, Sequence};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Name the pipeline is registered under when nested
pub const IO_SEQUENCE_NAME: &str = "IOSequence";

/// The capture pipeline as a reusable sequence
#[derive(Debug)]
pub struct IoSequence {
    sequence: Sequence<PipelineState>,
}

impl IoSequence {
    pub fn new() -> Result<Self> {
        let mut io_sequence = Self {
            sequence: Sequence::new(IO_SEQUENCE_NAME),
        };
        io_sequence.generate_sequence()?;
        Ok(io_sequence)
    }

    /// Register the canonical stages, replacing whatever was registered
    pub fn generate_sequence(&mut self) -> Result<()> {
        self.sequence.flush_sequence();
        self.sequence
            .add_sequence_function("seq_walk_directories", seq_walk_directories, 0)?;
        self.sequence
            .add_sequence_function("seq_group_files", seq_group_files, 1)?;
        self.sequence
            .add_sequence_function("seq_map_readers", seq_map_readers, 2)?;
        self.sequence
            .add_sequence_function("seq_read_files", seq_read_files, 3)?;
        self.sequence
            .add_sequence_function("seq_encrypt_files", seq_encrypt_files, 4)?;
        Ok(())
    }

    pub fn sequence(&self) -> &Sequence<PipelineState> {
        &self.sequence
    }

    pub fn into_sequence(self) -> Sequence<PipelineState> {
        self.sequence
    }

    /// Run the whole pipeline on its own
    pub fn execute(&mut self, state: PipelineState) -> Result<PipelineState> {
        self.sequence
            .execute_sequence(ExecutionPolicy::IncreasingOrder, true, state)
    }
}

/// List every file under the project root
///
/// Ignored directories and the store are pruned at every level. Entries
/// below the root that cannot be read are skipped with a warning.
pub fn seq_walk_directories(mut state: PipelineState) -> Result<PipelineState> {
    let root = state.config.root.clone();
    let io = Io::new(&root, IoMode::Strict)?.with_ignore_dirs(state.config.walk_ignore_dirs());
    fs::read_dir(&root).map_err(|e| Error::from_io(e, &root))?;

    let mut files = Vec::new();
    for entry in io.walk_directory() {
        match entry {
            Ok(path) => files.push(relative_to(&root, &path)?),
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable entry"),
        }
    }
    files.sort();

    tracing::info!(root = %root.display(), files = files.len(), "Walked project");
    state.files = files;
    Ok(state)
}

/// Group files by parent directory and by extension
pub fn seq_group_files(mut state: PipelineState) -> Result<PipelineState> {
    let mut directories: BTreeMap<String, DirectoryGroup> = BTreeMap::new();
    let mut extensions: BTreeMap<String, Vec<String>> = BTreeMap::new();
    directories.insert(ROOT_DIR_KEY.to_string(), DirectoryGroup::default());

    for file in &state.files {
        let (dir, name) = split_parent(file);
        push_unique(&mut directories.entry(dir.to_string()).or_default().files, name);

        let mut child = dir;
        while child != ROOT_DIR_KEY {
            let (parent, folder) = split_parent(child);
            push_unique(&mut directories.entry(parent.to_string()).or_default().folders, folder);
            child = parent;
        }

        extensions
            .entry(get_file_extension(Path::new(file)))
            .or_default()
            .push(file.clone());
    }

    tracing::debug!(
        directories = directories.len(),
        extensions = extensions.len(),
        "Grouped files"
    );
    state.directories = directories;
    state.extensions = extensions;
    Ok(state)
}

/// Pick one reader per extension
pub fn seq_map_readers(mut state: PipelineState) -> Result<PipelineState> {
    let permissive = state.config.permissive_readers;
    let mut readers = BTreeMap::new();

    for extension in state.extensions.keys() {
        let kind = match get_reader_by_extension(extension) {
            Ok(kind) => kind,
            Err(Error::UnsupportedExtension(ext)) if permissive => {
                tracing::warn!(extension = %ext, "No reader registered, capturing raw bytes");
                ReaderKind::Byte
            }
            Err(e) => {
                tracing::warn!(extension = %extension, error = %e, "No reader for extension");
                return Err(e);
            }
        };
        readers.insert(extension.clone(), kind);
    }

    state.readers = readers;
    Ok(state)
}

/// Read every file through its mapped reader
pub fn seq_read_files(mut state: PipelineState) -> Result<PipelineState> {
    let root = state.config.root.clone();
    let mut entries = Vec::with_capacity(state.files.len());

    for rel_path in &state.files {
        let extension = get_file_extension(Path::new(rel_path));
        let mapped = *state
            .readers
            .get(&extension)
            .ok_or_else(|| Error::UnsupportedExtension(extension.clone()))?;
        let path = root.join(rel_path);

        let (reader, content) = match mapped.reader().read(&path) {
            Ok(content) => (mapped, content),
            Err(Error::CorruptData(reason)) if mapped == ReaderKind::Text => {
                tracing::warn!(
                    path = %rel_path,
                    reason = %reason,
                    "Text decode failed, capturing raw bytes"
                );
                (ReaderKind::Byte, ReaderKind::Byte.reader().read(&path)?)
            }
            Err(e) => return Err(e),
        };

        entries.push(FileEntry {
            rel_path: rel_path.clone(),
            extension,
            reader,
            content_hash: content_hash(content.as_bytes()),
            content,
        });
    }

    tracing::info!(files = entries.len(), "Read files");
    state.entries = entries;
    Ok(state)
}

/// Seal every read file with the project key
pub fn seq_encrypt_files(mut state: PipelineState) -> Result<PipelineState> {
    let crypt = state.config.crypt()?;
    let mut encrypted = BTreeMap::new();

    for entry in &state.entries {
        encrypted.insert(entry.rel_path.clone(), crypt.encrypt(entry.content.as_bytes())?);
    }

    tracing::info!(
        files = encrypted.len(),
        key = %crypt.fingerprint(),
        "Encrypted files"
    );
    state.encrypted = encrypted;
    Ok(state)
}

fn relative_to(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::PathOutsideRoot(path.to_path_buf()))?;
    normalize_path(relative)
}

fn split_parent(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or((ROOT_DIR_KEY, path))
}

fn push_unique(items: &mut Vec<String>, item: &str) {
    if !items.iter().any(|existing| existing == item) {
        items.push(item.to_string());
    }
}
