//! Workflow integration tests
//!
//! Complete workflows that exercise multiple actions and validate
//! end-to-end behavior.

pub mod checkpoint_lifecycle;
pub mod edge_cases;
pub mod restore;
