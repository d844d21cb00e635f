//! Application services for the workflow engine.

mod dependency_graph;
mod facade;
mod merge_executor;
mod state_machine;

pub use dependency_graph::{DependencyGraph, DependencyGraphError, DependencyGraphResult};
pub use facade::{IssueDraft, MergeRequestDraft, WorkflowError, WorkflowFacade, WorkflowResult};
pub use merge_executor::{
    MergeError, MergeExecutor, MergeResult, WorkingTreeGuard, WorkingTreeLocks,
};
pub use state_machine::{StateMachine, TransitionError, TransitionResult};
