pub use crate::app::{Host, HostBuilder};
pub use crate::error::{Error, PbResult};
pub use crate::types::{ChannelId, GuildId, RoleId, Timestamp, UserId};

pub use tracing::{debug, error, info, trace, warn};

// vim: ts=4
