//! In-memory adapter implementations for testing.
//!
//! These adapters provide simple, thread-safe implementations suitable for
//! unit testing without a database or a git working tree.

mod directory;
mod store;
mod version_control;

pub use directory::InMemoryRepositoryDirectory;
pub use store::InMemoryWorkflowStore;
pub use version_control::{InMemoryVersionControl, RecordedMerge};
