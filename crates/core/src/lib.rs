//! Checkpoint Core - engine primitives for the checkpoint system
//!
//! This crate provides the foundational layer:
//! - Error taxonomy
//! - Filesystem access under permission modes
//! - Per-extension readers
//! - AES-256-GCM file encryption
//! - Project configuration
//! - Log stream setup
//! - The ordered `Sequence` pipeline engine

pub mod config;
pub mod crypt;
pub mod error;
pub mod io;
pub mod logger;
pub mod readers;
pub mod sequence;

// Re-export main types for convenience
pub use config::ProjectConfig;
pub use crypt::Crypt;
pub use error::{Error, Result};
pub use io::{Access, Io, IoMode};
pub use readers::{FileContent, Reader, ReaderKind};
pub use sequence::{ExecutionPolicy, Sequence, StageInfo, StageKind};
