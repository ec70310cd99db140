//! Project configuration
//!
//! Persisted as `<root>/.checkpoint/config.toml`. A configuration value is
//! created by `init` and passed explicitly to every sequence that needs it.

use crate::crypt;
use crate::error::{Error, Result};
use crate::io::atomic_write;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Hidden directory holding configuration, key, logs and checkpoints
pub const STORE_DIR_NAME: &str = ".checkpoint";

/// Configuration file inside the store
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Staging area for checkpoints being written
pub const TMP_DIR_NAME: &str = "tmp";

/// Key used unless configured otherwise
pub const DEFAULT_KEY_NAME: &str = "crypt";

/// Directories skipped unless configured otherwise
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".idea",
    ".vscode",
    ".venv",
    "node_modules",
    "__pycache__",
];

/// Upper bound for sealed layers per payload
pub const MAX_CRYPT_ITERATIONS: u32 = 16;

fn default_ignore_dirs() -> Vec<String> {
    DEFAULT_IGNORE_DIRS.iter().map(|d| d.to_string()).collect()
}

fn default_key_name() -> String {
    DEFAULT_KEY_NAME.to_string()
}

fn default_true() -> bool {
    true
}

fn default_iterations() -> u32 {
    1
}

/// Configuration and lifecycle state of one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project root
    pub root: PathBuf,

    /// Directory names excluded from capture at every level
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    /// Checkpoint last restored into the working tree
    #[serde(default)]
    pub current_checkpoint: Option<String>,

    /// Checkpoint names in creation order
    #[serde(default)]
    pub checkpoints: Vec<String>,

    /// Name of the key file in the store
    #[serde(default = "default_key_name")]
    pub key_name: String,

    /// Read unknown extensions as raw bytes instead of failing
    #[serde(default = "default_true")]
    pub permissive_readers: bool,

    /// Sealed layers per payload
    #[serde(default = "default_iterations")]
    pub crypt_iterations: u32,
}

impl ProjectConfig {
    /// Fresh configuration for `root` with the default settings
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore_dirs: default_ignore_dirs(),
            current_checkpoint: None,
            checkpoints: Vec::new(),
            key_name: default_key_name(),
            permissive_readers: true,
            crypt_iterations: 1,
        }
    }

    pub fn with_ignore_dirs(mut self, ignore_dirs: Vec<String>) -> Self {
        self.ignore_dirs = ignore_dirs;
        self
    }

    pub fn with_permissive_readers(mut self, permissive: bool) -> Self {
        self.permissive_readers = permissive;
        self
    }

    pub fn with_crypt_iterations(mut self, iterations: u32) -> Self {
        self.crypt_iterations = iterations;
        self
    }

    /// Whether `root` holds a project configuration
    pub fn is_initialized(root: &Path) -> bool {
        root.join(STORE_DIR_NAME).join(CONFIG_FILE_NAME).is_file()
    }

    /// Load the configuration of the project at `root`
    ///
    /// The stored root is replaced by `root` so a moved project keeps working.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(STORE_DIR_NAME).join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Err(Error::NotInitialized(root.to_path_buf()));
        }

        let raw = fs::read_to_string(&path).map_err(|e| Error::from_io(e, &path))?;
        let mut config: ProjectConfig = toml::from_str(&raw)?;
        if config.root != root {
            tracing::debug!(
                stored = %config.root.display(),
                actual = %root.display(),
                "Project root moved since last save"
            );
            config.root = root.to_path_buf();
        }
        config.validate()?;
        Ok(config)
    }

    /// Persist the configuration atomically
    pub fn save(&self) -> Result<()> {
        self.validate()?;
        let raw = toml::to_string_pretty(self)?;
        atomic_write(&self.config_path(), raw.as_bytes())
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.crypt_iterations == 0 || self.crypt_iterations > MAX_CRYPT_ITERATIONS {
            return Err(Error::InvalidArgument(format!(
                "crypt_iterations must be between 1 and {}, got {}",
                MAX_CRYPT_ITERATIONS, self.crypt_iterations
            )));
        }
        if let Some(name) = self.ignore_dirs.iter().find(|d| d.is_empty() || d.contains('/')) {
            return Err(Error::InvalidArgument(format!(
                "ignore entries must be plain directory names, got '{}'",
                name
            )));
        }
        if let Some(current) = &self.current_checkpoint {
            if !self.checkpoints.contains(current) {
                return Err(Error::CorruptData(format!(
                    "current checkpoint '{}' is not a known checkpoint",
                    current
                )));
            }
        }
        Ok(())
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root.join(STORE_DIR_NAME)
    }

    pub fn config_path(&self) -> PathBuf {
        self.store_dir().join(CONFIG_FILE_NAME)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.store_dir().join(TMP_DIR_NAME)
    }

    pub fn key_path(&self) -> Result<PathBuf> {
        crypt::key_path(&self.key_name, &self.store_dir())
    }

    /// Directory holding every version of checkpoint `name`
    pub fn checkpoint_dir(&self, name: &str) -> PathBuf {
        self.store_dir().join(name)
    }

    /// Ignore list used for walking: configured entries plus the store itself
    pub fn walk_ignore_dirs(&self) -> Vec<String> {
        let mut dirs = self.ignore_dirs.clone();
        if !dirs.iter().any(|d| d == STORE_DIR_NAME) {
            dirs.push(STORE_DIR_NAME.to_string());
        }
        dirs
    }

    /// Load the project key
    pub fn crypt(&self) -> Result<crypt::Crypt> {
        Ok(crypt::Crypt::from_key_file(&self.key_path()?)?.with_iterations(self.crypt_iterations))
    }
}
