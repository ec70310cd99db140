//! Accumulator threaded through the checkpoint sequences

use crate::checkpoint::{CheckpointMetadata, CheckpointTarget, DirectoryGroup, FileRecord};
use checkpoint_core::{FileContent, ProjectConfig, ReaderKind};
use std::collections::BTreeMap;

/// One captured file with its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the project root, `/` separated
    pub rel_path: String,
    pub extension: String,
    pub reader: ReaderKind,
    pub content: FileContent,
    pub content_hash: String,
}

impl FileEntry {
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn record(&self) -> FileRecord {
        FileRecord {
            path: self.rel_path.clone(),
            extension: self.extension.clone(),
            reader: self.reader,
            size: self.size(),
            content_hash: self.content_hash.clone(),
        }
    }
}

/// Checkpoint version selected for restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub name: String,
    /// Latest version when unset
    pub version: Option<u32>,
}

/// State owned by one in-flight execution
///
/// Each stage takes the state by value, fills in its part and hands it on.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub config: ProjectConfig,
    pub target: Option<CheckpointTarget>,
    pub restore: Option<RestoreRequest>,

    /// Captured files, relative and sorted
    pub files: Vec<String>,
    /// Directory → direct children
    pub directories: BTreeMap<String, DirectoryGroup>,
    /// Extension → files carrying it
    pub extensions: BTreeMap<String, Vec<String>>,
    /// Extension → reader
    pub readers: BTreeMap<String, ReaderKind>,
    pub entries: Vec<FileEntry>,
    /// Relative path → sealed payload
    pub encrypted: BTreeMap<String, Vec<u8>>,

    /// Metadata of the version being restored
    pub metadata: Option<CheckpointMetadata>,
    /// Relative path → plaintext to write back
    pub decrypted: BTreeMap<String, Vec<u8>>,
    /// Files written back by restore
    pub restored: Vec<String>,
}

impl PipelineState {
    pub fn new(config: ProjectConfig) -> Self {
        Self {
            config,
            target: None,
            restore: None,
            files: Vec::new(),
            directories: BTreeMap::new(),
            extensions: BTreeMap::new(),
            readers: BTreeMap::new(),
            entries: Vec::new(),
            encrypted: BTreeMap::new(),
            metadata: None,
            decrypted: BTreeMap::new(),
            restored: Vec::new(),
        }
    }
}
