//! Trellis: issue and merge request workflow engine.
//!
//! This crate tracks issues and merge requests attached to
//! version-controlled repositories, maintains the dependency graph between
//! issues, and merges merge requests by coupling a version-control merge to
//! a guarded state transition.
//!
//! # Architecture
//!
//! Trellis follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, git, memory)
//!
//! # Modules
//!
//! - [`workflow`]: Entity model, stores, state machine, dependency graph,
//!   merge executor and facade
//! - [`config`]: TOML configuration for hosting binaries

pub mod config;
pub mod workflow;
