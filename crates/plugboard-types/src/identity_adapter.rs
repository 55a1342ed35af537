//! Adapter that resolves users and guild members from the chat platform.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::Debug;

use crate::prelude::*;

/// A platform user, independent of any guild
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
	pub user_id: UserId,
	pub username: Box<str>,
	pub is_bot: bool,
	pub created_at: Option<Timestamp>,
}

/// A user's membership in one guild
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
	pub user_id: UserId,
	pub guild_id: GuildId,
	pub nickname: Option<Box<str>>,
	pub roles: Box<[RoleId]>,
	pub joined_at: Option<Timestamp>,
}

/// User and member lookup contract.
///
/// Lookups for ids the platform does not know return [`Error::NotFound`];
/// callers decide whether that is fatal or rendered as an unknown user.
#[async_trait]
pub trait IdentityAdapter: Debug + Send + Sync {
	async fn resolve_user(&self, user_id: UserId) -> PbResult<User>;
	async fn resolve_member(&self, guild_id: GuildId, user_id: UserId) -> PbResult<Member>;
}


// vim: ts=4
