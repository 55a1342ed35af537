//! Core engine of the Plugboard plugin host.
//!
//! This crate contains the plugin registry, the layered config resolver, and
//! the per-guild lifecycle machinery, independent of any storage or chat
//! platform adapter. The `plugboard` crate wraps it in the embeddable host
//! API.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod hooks;
pub mod lifecycle;
pub mod merge;
pub mod overrides;
pub mod prelude;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod state;

// Re-export commonly used types
pub use hooks::{HostEnv, PluginCtx, PluginHandle, PluginHook};
pub use lifecycle::{
	activate, ActivationOpts, GuildConfigDoc, GuildOverlay, GuildRuntime, PluginState,
};
pub use overrides::{EvalContext, OverrideRule, OverrideSet};
pub use registry::{FrozenPluginRegistry, PluginDescriptor, PluginRegistry};
pub use schema::{ConfigKind, ConfigSchema};

// vim: ts=4
