//! Common imports used throughout the engine and adapter crates

pub use crate::error::{Error, PbResult};
pub use crate::types::{ChannelId, GuildId, RoleId, Timestamp, UserId};

pub use tracing::{debug, error, info, trace, warn};

// vim: ts=4
