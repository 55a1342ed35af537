//! Common test utilities and helpers
//!
//! This module contains shared testing infrastructure used across all integration tests.
//! It includes in-memory adapters, plugin fixtures, and common test setup patterns.

pub mod adapters;
pub mod plugins;

pub use adapters::*;
pub use plugins::*;

// vim: ts=4
