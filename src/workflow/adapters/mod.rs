//! Adapter implementations for the workflow ports.
//!
//! - [`memory`]: thread-safe in-memory store, version control and
//!   repository directory for tests and local tooling
//! - [`postgres`]: `PostgreSQL` persistence using Diesel ORM
//! - [`git`]: version control through the `git` command line

pub mod git;
pub mod memory;
pub mod postgres;
