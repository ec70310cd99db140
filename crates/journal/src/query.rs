//! Read models for external callers
//!
//! None of these mutate a checkpoint. A directory without a store reads as
//! an empty project.

use crate::checkpoint::{latest_version, validate_name, version_tag, CheckpointMetadata, ROOT_DIR_KEY};
use checkpoint_core::config::STORE_DIR_NAME;
use checkpoint_core::logger::LOG_FILE_NAME;
use checkpoint_core::{Error, ProjectConfig, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::Path;

/// One directory of a checkpoint's captured tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub files: Vec<String>,
    pub folders: Vec<String>,
}

fn load_if_initialized(path: &Path) -> Result<Option<ProjectConfig>> {
    match ProjectConfig::load(path) {
        Ok(config) => Ok(Some(config)),
        Err(Error::NotInitialized(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Checkpoint names in creation order
pub fn get_all_checkpoints(path: &Path) -> Result<Vec<String>> {
    Ok(load_if_initialized(path)?
        .map(|config| config.checkpoints)
        .unwrap_or_default())
}

/// Checkpoint last restored, if any
pub fn get_current_checkpoint(path: &Path) -> Result<Option<String>> {
    Ok(load_if_initialized(path)?.and_then(|config| config.current_checkpoint))
}

/// Configured ignore list
pub fn get_ignore_dirs(path: &Path) -> Result<Vec<String>> {
    Ok(load_if_initialized(path)?
        .map(|config| config.ignore_dirs)
        .unwrap_or_default())
}

/// Whether `path` exists and can be listed as a project root
pub fn validate_path(path: &Path) -> bool {
    path.is_dir() && fs::read_dir(path).is_ok()
}

/// Captured directory structure of the latest version of `name`
///
/// Keys are directory paths relative to the root, with the root itself
/// under `"."`.
pub fn generate_tree(name: &str, path: &Path) -> Result<BTreeMap<String, TreeNode>> {
    let config = ProjectConfig::load(path)?;
    validate_name(name, &config)?;
    let checkpoint_dir = config.checkpoint_dir(name);
    let version = latest_version(&checkpoint_dir)?
        .ok_or_else(|| Error::CheckpointNotFound(name.to_string()))?;
    let metadata = CheckpointMetadata::read(&checkpoint_dir.join(version_tag(version)))?;

    let root_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(ROOT_DIR_KEY)
        .to_string();

    Ok(metadata
        .directories
        .into_iter()
        .map(|(dir, group)| {
            let name = if dir == ROOT_DIR_KEY {
                root_name.clone()
            } else {
                dir.rsplit('/').next().unwrap_or(&dir).to_string()
            };
            let node = TreeNode {
                name,
                files: group.files,
                folders: group.folders,
            };
            (dir, node)
        })
        .collect())
}

/// Drain the project log stream
///
/// Returns the non-empty lines logged since the last drain and truncates
/// the log file.
pub fn read_logs(path: &Path) -> Result<Vec<String>> {
    let log_path = path.join(STORE_DIR_NAME).join(LOG_FILE_NAME);
    let raw = match fs::read_to_string(&log_path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::from_io(e, &log_path)),
    };

    OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(&log_path)
        .map_err(|e| Error::from_io(e, &log_path))?;

    Ok(raw
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
