//! Checkpoint records and on-disk layout
//!
//! Every version of a checkpoint lives in its own directory:
//!
//! ```text
//! .checkpoint/<name>/v<N>/
//!   .metadata          JSON CheckpointMetadata
//!   files/<rel path>   encrypted payload of each captured file
//! ```

use checkpoint_core::config::{ProjectConfig, CONFIG_FILE_NAME, STORE_DIR_NAME, TMP_DIR_NAME};
use checkpoint_core::logger::LOG_FILE_NAME;
use checkpoint_core::{Error, ReaderKind, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use ulid::Ulid;

/// Metadata file inside a version directory
pub const METADATA_FILE_NAME: &str = ".metadata";

/// Payload directory inside a version directory
pub const FILES_DIR_NAME: &str = "files";

/// Key under which files at the project root are grouped
pub const ROOT_DIR_KEY: &str = ".";

/// Files and sub-folders directly inside one captured directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryGroup {
    pub files: Vec<String>,
    pub folders: Vec<String>,
}

/// One captured file as recorded in metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the project root, `/` separated
    pub path: String,
    pub extension: String,
    pub reader: ReaderKind,
    pub size: u64,
    /// Hex BLAKE3 digest of the captured bytes
    pub content_hash: String,
}

/// Metadata record of one checkpoint version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub id: Ulid,
    pub name: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub root: PathBuf,
    pub ignore_dirs: Vec<String>,
    /// Fingerprint of the key the payloads were sealed with
    pub key_fingerprint: String,
    pub directories: BTreeMap<String, DirectoryGroup>,
    pub files: Vec<FileRecord>,
}

impl CheckpointMetadata {
    pub fn version_tag(&self) -> String {
        version_tag(self.version)
    }

    pub fn write(&self, version_dir: &Path) -> Result<()> {
        let path = version_dir.join(METADATA_FILE_NAME);
        let raw = serde_json::to_vec_pretty(self)?;
        fs::write(&path, raw).map_err(|e| Error::from_io(e, &path))
    }

    pub fn read(version_dir: &Path) -> Result<Self> {
        let path = version_dir.join(METADATA_FILE_NAME);
        let raw = fs::read(&path).map_err(|e| Error::from_io(e, &path))?;
        serde_json::from_slice(&raw)
            .map_err(|e| Error::CorruptData(format!("{}: {}", path.display(), e)))
    }
}

/// Version of a checkpoint being written by `create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointTarget {
    pub id: Ulid,
    pub name: String,
    pub version: u32,
    /// Directory the version is assembled in before publishing
    pub staging: PathBuf,
}

impl CheckpointTarget {
    /// Final location of the version
    pub fn published_dir(&self, config: &ProjectConfig) -> PathBuf {
        config.checkpoint_dir(&self.name).join(version_tag(self.version))
    }
}

/// `v<N>` directory name of a version
pub fn version_tag(version: u32) -> String {
    format!("v{}", version)
}

/// Inverse of [`version_tag`]
pub fn parse_version_tag(tag: &str) -> Option<u32> {
    tag.strip_prefix('v')?.parse().ok().filter(|v| *v > 0)
}

/// Published versions of the checkpoint stored at `checkpoint_dir`, ascending
pub fn list_versions(checkpoint_dir: &Path) -> Result<Vec<u32>> {
    let entries = match fs::read_dir(checkpoint_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::from_io(e, checkpoint_dir)),
    };

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(version) = entry.file_name().to_str().and_then(parse_version_tag) {
            if entry.path().join(METADATA_FILE_NAME).is_file() {
                versions.push(version);
            }
        }
    }
    versions.sort_unstable();
    Ok(versions)
}

/// Highest published version, if any
pub fn latest_version(checkpoint_dir: &Path) -> Result<Option<u32>> {
    Ok(list_versions(checkpoint_dir)?.last().copied())
}

/// Reject names that would collide with the store layout
pub fn validate_name(name: &str, config: &ProjectConfig) -> Result<()> {
    let conflict = |reason: &str| Error::NameConflict {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(conflict("name is empty"));
    }
    if name.contains(['/', '\\']) || name.contains('\0') {
        return Err(conflict("name contains a path separator"));
    }
    if name.starts_with('.') {
        return Err(conflict("name starts with a dot"));
    }

    let key_file = config
        .key_path()?
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_default();
    let reserved = [TMP_DIR_NAME, CONFIG_FILE_NAME, LOG_FILE_NAME, STORE_DIR_NAME];
    if reserved.contains(&name) || name == key_file {
        return Err(conflict("name is reserved by the checkpoint store"));
    }
    Ok(())
}
