//! In-memory adapter implementations for integration tests
//!
//! These keep everything in process memory behind a mutex, so tests get
//! real adapter behavior (per-guild case numbering, NotFound semantics,
//! patch application) without touching disk.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use std::collections::HashMap;

use plugboard::case_adapter::{Case, CaseAdapter, CasePatch, CreateCaseData};
use plugboard::error::{Error, PbResult};
use plugboard::identity_adapter::{IdentityAdapter, Member, User};
use plugboard::time_adapter::{TimeFormatAdapter, TimeStyle};
use plugboard::types::{GuildId, Patch, Timestamp, UserId};

/// Case store backed by a Vec; insertion order doubles as creation order
#[derive(Debug, Default)]
pub struct MemCaseAdapter {
	cases: Mutex<Vec<Case>>,
}

impl MemCaseAdapter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn case_count(&self) -> usize {
		self.cases.lock().len()
	}
}

#[async_trait]
impl CaseAdapter for MemCaseAdapter {
	async fn create_case(&self, data: &CreateCaseData<'_>) -> PbResult<Case> {
		let mut cases = self.cases.lock();
		let case_number =
			cases.iter().filter(|c| c.guild_id == data.guild_id).count() as i64 + 1;
		let case = Case {
			case_id: cases.len() as i64 + 1,
			guild_id: data.guild_id,
			case_number,
			user_id: data.user_id,
			mod_id: data.mod_id,
			kind: data.kind,
			reason: data.reason.map(Into::into),
			is_hidden: data.is_hidden,
			created_at: Timestamp::now(),
			log_message_id: None,
		};
		cases.push(case.clone());
		Ok(case)
	}

	async fn read_case(&self, guild_id: GuildId, case_number: i64) -> PbResult<Case> {
		self.cases
			.lock()
			.iter()
			.find(|c| c.guild_id == guild_id && c.case_number == case_number)
			.cloned()
			.ok_or(Error::NotFound)
	}

	async fn list_cases_by_user(&self, guild_id: GuildId, user_id: UserId) -> PbResult<Vec<Case>> {
		Ok(self
			.cases
			.lock()
			.iter()
			.filter(|c| c.guild_id == guild_id && c.user_id == user_id)
			.cloned()
			.collect())
	}

	async fn update_case(
		&self,
		guild_id: GuildId,
		case_number: i64,
		patch: &CasePatch,
	) -> PbResult<Case> {
		let mut cases = self.cases.lock();
		let case = cases
			.iter_mut()
			.find(|c| c.guild_id == guild_id && c.case_number == case_number)
			.ok_or(Error::NotFound)?;
		match &patch.log_message_id {
			Patch::Undefined => (),
			Patch::Null => case.log_message_id = None,
			Patch::Value(v) => case.log_message_id = Some(v.clone()),
		}
		match patch.is_hidden {
			Patch::Undefined => (),
			Patch::Null => case.is_hidden = false,
			Patch::Value(v) => case.is_hidden = v,
		}
		Ok(case.clone())
	}
}

/// User and member directory seeded up front by the test
#[derive(Debug, Default)]
pub struct MemIdentityAdapter {
	users: Mutex<HashMap<UserId, User>>,
	members: Mutex<HashMap<(GuildId, UserId), Member>>,
}

impl MemIdentityAdapter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_user(&self, user: User) {
		self.users.lock().insert(user.user_id, user);
	}

	pub fn add_member(&self, member: Member) {
		self.members.lock().insert((member.guild_id, member.user_id), member);
	}
}

#[async_trait]
impl IdentityAdapter for MemIdentityAdapter {
	async fn resolve_user(&self, user_id: UserId) -> PbResult<User> {
		self.users.lock().get(&user_id).cloned().ok_or(Error::NotFound)
	}

	async fn resolve_member(&self, guild_id: GuildId, user_id: UserId) -> PbResult<Member> {
		self.members.lock().get(&(guild_id, user_id)).cloned().ok_or(Error::NotFound)
	}
}

/// Formats every guild in one fixed UTC offset, keeping test output stable
#[derive(Debug)]
pub struct FixedTimeAdapter {
	offset: FixedOffset,
}

impl FixedTimeAdapter {
	pub fn utc() -> Self {
		Self { offset: FixedOffset::east_opt(0).unwrap() }
	}

	pub fn with_offset_hours(hours: i32) -> Self {
		Self { offset: FixedOffset::east_opt(hours * 3600).unwrap() }
	}
}

#[async_trait]
impl TimeFormatAdapter for FixedTimeAdapter {
	async fn to_guild_time(
		&self,
		_guild_id: GuildId,
		ts: Timestamp,
	) -> PbResult<DateTime<FixedOffset>> {
		Ok(ts.to_utc().with_timezone(&self.offset))
	}

	async fn format(&self, guild_id: GuildId, ts: Timestamp, style: TimeStyle) -> PbResult<String> {
		let local = self.to_guild_time(guild_id, ts).await?;
		let formatted = match style {
			TimeStyle::Date => local.format("%Y-%m-%d"),
			TimeStyle::DateTime => local.format("%Y-%m-%d %H:%M"),
			TimeStyle::Pretty => local.format("%b %-d, %Y %-I:%M %p"),
		};
		Ok(formatted.to_string())
	}
}

/// Common test setup helper
pub fn setup_test_logging() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::DEBUG)
		.try_init();
}

// vim: ts=4
