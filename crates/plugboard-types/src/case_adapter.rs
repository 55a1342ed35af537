//! Adapter that stores and queries moderation case records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::Debug;

use crate::{
	prelude::*,
	types::{serialize_timestamp_iso, Patch},
};

/// Kind of moderation action a case records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseKind {
	Ban,
	Unban,
	Note,
	Warn,
	Kick,
	Mute,
	Unmute,
	Deleted,
	Softban,
}

impl CaseKind {
	/// Stable numeric code used by storage adapters
	pub fn code(self) -> i64 {
		match self {
			CaseKind::Ban => 1,
			CaseKind::Unban => 2,
			CaseKind::Note => 3,
			CaseKind::Warn => 4,
			CaseKind::Kick => 5,
			CaseKind::Mute => 6,
			CaseKind::Unmute => 7,
			CaseKind::Deleted => 8,
			CaseKind::Softban => 9,
		}
	}

	pub fn from_code(code: i64) -> Option<Self> {
		match code {
			1 => Some(CaseKind::Ban),
			2 => Some(CaseKind::Unban),
			3 => Some(CaseKind::Note),
			4 => Some(CaseKind::Warn),
			5 => Some(CaseKind::Kick),
			6 => Some(CaseKind::Mute),
			7 => Some(CaseKind::Unmute),
			8 => Some(CaseKind::Deleted),
			9 => Some(CaseKind::Softban),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			CaseKind::Ban => "Ban",
			CaseKind::Unban => "Unban",
			CaseKind::Note => "Note",
			CaseKind::Warn => "Warn",
			CaseKind::Kick => "Kick",
			CaseKind::Mute => "Mute",
			CaseKind::Unmute => "Unmute",
			CaseKind::Deleted => "Deleted",
			CaseKind::Softban => "Softban",
		}
	}
}

impl std::fmt::Display for CaseKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// A moderation case record
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
	pub case_id: i64,
	pub guild_id: GuildId,
	/// Per-guild sequence number, shown to moderators ("Warn (#42)")
	pub case_number: i64,
	pub user_id: UserId,
	pub mod_id: Option<UserId>,
	pub kind: CaseKind,
	pub reason: Option<Box<str>>,
	/// Hidden cases are kept in storage but excluded from user-facing summaries
	pub is_hidden: bool,
	#[serde(serialize_with = "serialize_timestamp_iso")]
	pub created_at: Timestamp,
	/// "channel_id-message_id" pointer to the case's log post, if any
	pub log_message_id: Option<Box<str>>,
}

/// Data needed to create a new case
#[derive(Debug)]
pub struct CreateCaseData<'a> {
	pub guild_id: GuildId,
	pub user_id: UserId,
	pub mod_id: Option<UserId>,
	pub kind: CaseKind,
	pub reason: Option<&'a str>,
	pub is_hidden: bool,
}

/// Fields that can be updated on an existing case
#[derive(Debug, Default)]
pub struct CasePatch {
	pub log_message_id: Patch<Box<str>>,
	pub is_hidden: Patch<bool>,
}

/// Case store contract consumed by plugins during lifecycle hooks.
///
/// Implementations own the persisted format; the engine only relies on
/// per-guild case numbering and creation-time ordering.
#[async_trait]
pub trait CaseAdapter: Debug + Send + Sync {
	/// Creates a case, assigning the next per-guild case number
	async fn create_case(&self, data: &CreateCaseData<'_>) -> PbResult<Case>;

	/// Reads a single case by its per-guild number
	async fn read_case(&self, guild_id: GuildId, case_number: i64) -> PbResult<Case>;

	/// Lists every case for a user in one guild, oldest first.
	/// Hidden cases are included; presentation filters them.
	async fn list_cases_by_user(&self, guild_id: GuildId, user_id: UserId) -> PbResult<Vec<Case>>;

	/// Applies a patch to a case, returning the updated record
	async fn update_case(
		&self,
		guild_id: GuildId,
		case_number: i64,
		patch: &CasePatch,
	) -> PbResult<Case>;
}


// vim: ts=4
