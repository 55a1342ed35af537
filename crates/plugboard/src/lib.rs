//! Plugboard is an embeddable multi-tenant plugin host.
//!
//! # Features
//!
//! - Schema-validated plugin configuration
//!     - recognized keys, kinds, nullability, defaults
//!     - every offending key path reported, not just the first
//! - Conditional configuration overrides
//!     - permission-level predicates (`">=50"`), channel/role/user membership
//!     - deep merge, declaration order, last match wins
//! - Per-guild plugin composition
//!     - dependency-ordered activation, reverse-order teardown
//!     - typed state sharing between plugins through handles
//! - Guild configuration documents with validated live reload
//! - Moderation-domain adapter traits (case history, identity, time formatting)

// Re-export shared types and adapter traits from plugboard-types
pub use plugboard_types::case_adapter;
pub use plugboard_types::error;
pub use plugboard_types::identity_adapter;
pub use plugboard_types::time_adapter;
pub use plugboard_types::types;

// Re-export the lock! macro for callers that bookkeep with std mutexes
pub use plugboard_types::lock;

// Engine re-exports
pub use plugboard_core::hooks;
pub use plugboard_core::lifecycle;
pub use plugboard_core::merge;
pub use plugboard_core::overrides;
pub use plugboard_core::registry;
pub use plugboard_core::resolver;
pub use plugboard_core::schema;
pub use plugboard_core::state;

// Local modules
pub mod app;
pub mod prelude;

pub use crate::app::{Host, HostBuilder, HostState};

// vim: ts=4
