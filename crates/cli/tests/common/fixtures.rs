//! Throwaway projects for end-to-end tests

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A project directory that is removed on drop
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    /// Empty project
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new().context("Failed to create temp dir")?,
        })
    }

    /// Small project with text, binary, nested and ignored content
    pub fn sample() -> Result<Self> {
        let project = Self::new()?;
        project.write("a.txt", "hello")?;
        project.write("README.md", "# sample\n")?;
        project.write("src/main.rs", "fn main() {\n    println!(\"hi\");\n}\n")?;
        project.write("src/util/mod.rs", "pub fn add(a: i32, b: i32) -> i32 { a + b }\n")?;
        project.write_bytes("assets/logo.png", &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a])?;
        project.write(".git/HEAD", "ref: refs/heads/main\n")?;
        project.write("node_modules/pkg/index.js", "module.exports = 1;\n")?;
        Ok(project)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Project path as a CLI argument
    pub fn arg(&self) -> String {
        self.dir.path().display().to_string()
    }

    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) -> Result<()> {
        self.write_bytes(rel, content.as_bytes())
    }

    pub fn write_bytes(&self, rel: &str, content: &[u8]) -> Result<()> {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", rel))
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        fs::read_to_string(self.join(rel)).with_context(|| format!("Failed to read {}", rel))
    }

    pub fn read_bytes(&self, rel: &str) -> Result<Vec<u8>> {
        fs::read(self.join(rel)).with_context(|| format!("Failed to read {}", rel))
    }
}
