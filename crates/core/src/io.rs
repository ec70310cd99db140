//! Filesystem primitives scoped to a target directory
//!
//! Every read and write goes through an [`IoMode`] that decides which
//! [`Access`] kinds are allowed:
//!
//! | mode | flag | allowed access            |
//! |------|------|---------------------------|
//! | All      | `a` | read, write, create, append |
//! | Moderate | `m` | read, write, append (size limited) |
//! | Strict   | `s` | read, append              |

use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// Write ceiling for [`IoMode::Moderate`] when parsed from `"m"`
pub const DEFAULT_SIZE_LIMIT: u64 = 64 * 1024 * 1024;

/// Permission level of an [`Io`] instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    All,
    Moderate { size_limit: u64 },
    Strict,
}

impl IoMode {
    /// Check whether `access` is permitted under this mode
    pub fn allows(self, access: Access) -> bool {
        match self {
            IoMode::All => true,
            IoMode::Moderate { .. } => access != Access::Create,
            IoMode::Strict => matches!(access, Access::Read | Access::Append),
        }
    }

    pub fn flag(self) -> char {
        match self {
            IoMode::All => 'a',
            IoMode::Moderate { .. } => 'm',
            IoMode::Strict => 's',
        }
    }
}

impl FromStr for IoMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "a" => Ok(IoMode::All),
            "m" => Ok(IoMode::Moderate {
                size_limit: DEFAULT_SIZE_LIMIT,
            }),
            "s" => Ok(IoMode::Strict),
            other => Err(Error::InvalidMode(format!(
                "'{}' is not a valid IO operation mode",
                other
            ))),
        }
    }
}

/// Kind of file access requested for a single operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `r`
    Read,
    /// `w`: create or truncate
    Write,
    /// `x`: create, failing if the file exists
    Create,
    /// `a`
    Append,
}

impl FromStr for Access {
    type Err = Error;

    /// Accepts the base flag optionally followed by `b` and/or `+`
    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let base = chars.next();
        if !chars.all(|c| c == 'b' || c == '+') {
            return Err(Error::InvalidMode(format!("unknown access flag '{}'", s)));
        }
        match base {
            Some('r') => Ok(Access::Read),
            Some('w') => Ok(Access::Write),
            Some('x') => Ok(Access::Create),
            Some('a') => Ok(Access::Append),
            _ => Err(Error::InvalidMode(format!("unknown access flag '{}'", s))),
        }
    }
}

/// Input/output operations rooted at a directory
#[derive(Debug, Clone)]
pub struct Io {
    path: PathBuf,
    mode: IoMode,
    ignore_dirs: Vec<String>,
}

impl Io {
    /// Open `path` for IO operations under `mode`
    pub fn new(path: impl Into<PathBuf>, mode: IoMode) -> Result<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(Error::PathNotFound(path));
        }
        Ok(Self {
            path,
            mode,
            ignore_dirs: Vec::new(),
        })
    }

    /// Directory names skipped at every level of [`Io::walk_directory`]
    pub fn with_ignore_dirs(mut self, ignore_dirs: Vec<String>) -> Self {
        self.ignore_dirs = ignore_dirs;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> IoMode {
        self.mode
    }

    pub fn ignore_dirs(&self) -> &[String] {
        &self.ignore_dirs
    }

    /// Retarget this instance at another directory
    pub fn set_path(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if !path.is_dir() {
            return Err(Error::PathNotFound(path));
        }
        self.path = path;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: IoMode) {
        self.mode = mode;
    }

    /// Lazily list every regular file under the target directory
    ///
    /// Single pass; call again to re-walk. Ignored directories are pruned
    /// by exact name at every depth, so their contents are never visited.
    /// Symlinks to regular files are listed under their own path; symlinks
    /// to directories are not descended into. Entries that cannot be read,
    /// dangling links included, are yielded as errors for the caller to
    /// skip or propagate.
    pub fn walk_directory(&self) -> impl Iterator<Item = Result<PathBuf>> {
        let ignore_dirs = self.ignore_dirs.clone();

        WalkDir::new(&self.path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                entry
                    .file_name()
                    .to_str()
                    .map_or(true, |name| !ignore_dirs.iter().any(|d| d == name))
            })
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
                Ok(entry) if entry.path_is_symlink() => match fs::metadata(entry.path()) {
                    Ok(meta) if meta.is_file() => Some(Ok(entry.into_path())),
                    Ok(_) => {
                        tracing::warn!(path = %entry.path().display(), "Skipping symlinked directory");
                        None
                    }
                    Err(e) => Some(Err(Error::from_io(e, entry.into_path()))),
                },
                Ok(_) => None,
                Err(err) => Some(Err(walk_error(err))),
            })
    }

    /// Open a file with the requested access
    pub fn open(&self, file: impl AsRef<Path>, access: Access) -> Result<File> {
        self.check_access(access)?;
        let file = self.resolve(file.as_ref());

        let mut options = OpenOptions::new();
        match access {
            Access::Read => options.read(true),
            Access::Write => options.write(true).create(true).truncate(true),
            Access::Create => options.write(true).create_new(true),
            Access::Append => options.append(true).create(true),
        };

        options.open(&file).map_err(|e| Error::from_io(e, file))
    }

    /// Read a file's raw bytes
    pub fn read(&self, file: impl AsRef<Path>) -> Result<Vec<u8>> {
        let mut handle = self.open(file, Access::Read)?;
        let mut content = Vec::new();
        handle.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Read a file as UTF-8 text
    pub fn read_to_string(&self, file: impl AsRef<Path>) -> Result<String> {
        let path = self.resolve(file.as_ref());
        let bytes = self.read(&path)?;
        String::from_utf8(bytes).map_err(|_| {
            Error::CorruptData(format!("{} is not valid UTF-8", path.display()))
        })
    }

    /// Write `content` into a file
    pub fn write(&self, file: impl AsRef<Path>, access: Access, content: &[u8]) -> Result<()> {
        if access == Access::Read {
            return Err(Error::InvalidMode("cannot write with read access".into()));
        }
        if let IoMode::Moderate { size_limit } = self.mode {
            if content.len() as u64 > size_limit {
                return Err(Error::InvalidMode(format!(
                    "write of {} bytes exceeds the {} byte limit of mode 'm'",
                    content.len(),
                    size_limit
                )));
            }
        }

        let mut handle = self.open(file, access)?;
        handle.write_all(content)?;
        handle.flush()?;
        Ok(())
    }

    /// Create a directory (and its parents) relative to the target directory
    pub fn make_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        self.check_access(Access::Write)?;
        let dir = self.resolve(dir.as_ref());
        fs::create_dir_all(&dir).map_err(|e| Error::from_io(e, &dir))?;
        Ok(dir)
    }

    /// Recursively delete a directory
    pub fn delete_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        self.check_access(Access::Write)?;
        let dir = self.resolve(dir.as_ref());
        fs::remove_dir_all(&dir).map_err(|e| Error::from_io(e, dir))
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.path.join(file)
        }
    }

    fn check_access(&self, access: Access) -> Result<()> {
        if self.mode.allows(access) {
            Ok(())
        } else {
            Err(Error::InvalidMode(format!(
                "{:?} access not allowed with IO mode '{}'",
                access,
                self.mode.flag()
            )))
        }
    }
}

fn walk_error(err: walkdir::Error) -> Error {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    match err.into_io_error() {
        Some(io) => Error::from_io(io, path),
        None => Error::CorruptData(format!("filesystem loop at {}", path.display())),
    }
}

/// Atomic write helper
///
/// Writes data to a temporary sibling of `target`, fsyncs it, then renames
/// it over the target.
pub fn atomic_write(target: &Path, data: &[u8]) -> Result<()> {
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidArgument(format!("invalid target {}", target.display())))?;
    let tmp = target.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    let written = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp, target)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(Error::from_io(e, target));
    }
    Ok(())
}

/// Lowercase extension of `path` without the dot, or `""` if it has none
pub fn get_file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Normalize a path for storage
///
/// - Rejects absolute paths and `..` components
/// - Drops `.` components
/// - Joins the remaining components with `/`
pub fn normalize_path(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| Error::CorruptData(format!("non UTF-8 path {:?}", path)))?;
                parts.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathOutsideRoot(path.to_path_buf()));
            }
        }
    }
    Ok(parts.join("/"))
}

/// Resolve a stored relative path against `root`, refusing anything that escapes it
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf> {
    let normalized = normalize_path(Path::new(relative))?;
    if normalized.is_empty() {
        return Err(Error::PathOutsideRoot(PathBuf::from(relative)));
    }
    Ok(root.join(normalized))
}

/// Resolve a write target under `root`, refusing to pass through symlinks
///
/// Every existing parent directory between `root` and the target must be a
/// real directory; a symlinked one could redirect the write outside `root`.
/// The target itself may be a symlink since [`atomic_write`] replaces it.
pub fn resolve_write_target(root: &Path, relative: &str) -> Result<PathBuf> {
    let target = resolve_within(root, relative)?;
    let normalized = normalize_path(Path::new(relative))?;
    let mut parents: Vec<&str> = normalized.split('/').collect();
    parents.pop();

    let mut current = root.to_path_buf();
    for part in parents {
        current.push(part);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                tracing::warn!(path = %current.display(), "Refusing to write through a symlinked directory");
                return Err(Error::PathOutsideRoot(target));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
            Err(e) => return Err(Error::from_io(e, current)),
        }
    }
    Ok(target)
}
