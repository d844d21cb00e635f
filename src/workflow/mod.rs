//! Issue and merge request workflow engine.
//!
//! Tracks issues and merge requests attached to version-controlled
//! repositories and moves them through their lifecycle under concurrent
//! access. State changes are guarded conditional updates; merging couples a
//! version-control merge with the guarded `Merged` transition under a
//! per-repository working-tree lock. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
