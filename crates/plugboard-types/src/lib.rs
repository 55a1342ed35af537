//! Shared types and adapter traits for the Plugboard engine.
//!
//! This crate contains the foundational types that are shared between the
//! engine crate and all adapter implementations. Extracting these into a
//! separate crate allows adapter crates to compile in parallel with the
//! engine's feature modules.

pub mod case_adapter;
pub mod error;
pub mod identity_adapter;
pub mod prelude;
pub mod time_adapter;
pub mod types;

// vim: ts=4
