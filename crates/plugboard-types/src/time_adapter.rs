//! Adapter that renders timestamps in a guild's configured timezone.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::fmt::Debug;

use crate::prelude::*;

/// Named display style for formatted timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeStyle {
	/// "2024-03-01"
	Date,
	/// "2024-03-01 13:37"
	DateTime,
	/// "Mar 1, 2024 1:37 PM", the style used in summaries
	Pretty,
}

/// Timezone and formatting contract.
///
/// Implementations hold per-guild timezone configuration; the engine
/// passes UTC timestamps and receives display strings back.
#[async_trait]
pub trait TimeFormatAdapter: Debug + Send + Sync {
	/// Converts a timestamp into the guild's local timezone
	async fn to_guild_time(&self, guild_id: GuildId, ts: Timestamp)
		-> PbResult<DateTime<FixedOffset>>;

	/// Formats a timestamp for display in the guild's timezone
	async fn format(&self, guild_id: GuildId, ts: Timestamp, style: TimeStyle) -> PbResult<String>;
}

// vim: ts=4
