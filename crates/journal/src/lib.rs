//! Checkpoint journal and lifecycle
//!
//! This crate provides:
//! - Checkpoint metadata records and the version directory layout
//! - The pipeline state shared by every checkpoint sequence
//! - IOSequence: walk, group, map readers, read, encrypt
//! - CheckpointSequence: init, create, restore, delete
//! - Read models for external callers

pub mod checkpoint;
pub mod checkpoint_sequence;
pub mod io_sequence;
pub mod query;
pub mod state;

// Re-exports
pub use checkpoint::{CheckpointMetadata, CheckpointTarget, DirectoryGroup, FileRecord};
pub use checkpoint_sequence::CheckpointSequence;
pub use io_sequence::IoSequence;
pub use query::TreeNode;
pub use state::{FileEntry, PipelineState, RestoreRequest};
