pub use plugboard_types::error::{ConfigIssue, Error, PbResult};
pub use plugboard_types::types::{ChannelId, GuildId, RoleId, Timestamp, UserId};

pub use tracing::{debug, error, info, trace, warn};

// vim: ts=4
