//! Unit tests for the workflow module.
//!
//! Tests are organised by component, from domain values and store adapters
//! up to the facade's error taxonomy.
