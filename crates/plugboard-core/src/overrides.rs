//! Conditional config overrides
//!
//! Overrides attach a config patch to a set of conditions. Conditions are
//! parsed once, when a rule is registered, so evaluation is a pure match
//! against pre-built variants and can never fail at resolve time.

use serde::Deserialize;
use serde_json::Value;

use crate::prelude::*;

/// Context an override rule is evaluated against.
///
/// Roles are kept sorted and deduplicated so equal contexts compare and
/// hash equal regardless of construction order; resolved configs are cached
/// by this key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EvalContext {
	pub level: Option<i64>,
	pub channel: Option<ChannelId>,
	pub roles: Box<[RoleId]>,
	pub user: Option<UserId>,
}

impl EvalContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_level(mut self, level: i64) -> Self {
		self.level = Some(level);
		self
	}

	pub fn with_channel(mut self, channel: ChannelId) -> Self {
		self.channel = Some(channel);
		self
	}

	pub fn with_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
		let mut roles: Vec<RoleId> = roles.into_iter().collect();
		roles.sort_unstable();
		roles.dedup();
		self.roles = roles.into();
		self
	}

	pub fn with_user(mut self, user: UserId) -> Self {
		self.user = Some(user);
		self
	}
}

/// Parsed level comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelMatch {
	AtLeast(i64),
	AtMost(i64),
	Exactly(i64),
	Not(i64),
	Above(i64),
	Below(i64),
}

impl LevelMatch {
	/// Parse a level predicate like `">=50"`.
	///
	/// A bare number is rejected: requiring an explicit operator keeps
	/// `"50"` from silently meaning either "exactly" or "at least".
	pub fn parse(spec: &str) -> PbResult<Self> {
		let trimmed = spec.trim();
		// Two-character operators first, ">" must not shadow ">="
		let (rest, build): (&str, fn(i64) -> LevelMatch) =
			if let Some(rest) = trimmed.strip_prefix(">=") {
				(rest, LevelMatch::AtLeast)
			} else if let Some(rest) = trimmed.strip_prefix("<=") {
				(rest, LevelMatch::AtMost)
			} else if let Some(rest) = trimmed.strip_prefix("==") {
				(rest, LevelMatch::Exactly)
			} else if let Some(rest) = trimmed.strip_prefix("!=") {
				(rest, LevelMatch::Not)
			} else if let Some(rest) = trimmed.strip_prefix('>') {
				(rest, LevelMatch::Above)
			} else if let Some(rest) = trimmed.strip_prefix('<') {
				(rest, LevelMatch::Below)
			} else {
				return Err(Error::MalformedPredicate {
					spec: spec.into(),
					reason: "missing comparison operator (expected >=, <=, ==, !=, > or <)".into(),
				});
			};

		let value: i64 = rest.trim().parse().map_err(|_| Error::MalformedPredicate {
			spec: spec.into(),
			reason: format!("'{}' is not an integer", rest.trim()).into(),
		})?;
		Ok(build(value))
	}

	pub fn matches(self, level: i64) -> bool {
		match self {
			LevelMatch::AtLeast(n) => level >= n,
			LevelMatch::AtMost(n) => level <= n,
			LevelMatch::Exactly(n) => level == n,
			LevelMatch::Not(n) => level != n,
			LevelMatch::Above(n) => level > n,
			LevelMatch::Below(n) => level < n,
		}
	}
}

/// One condition of an override rule.
///
/// Membership conditions hold a list and match when the context value is
/// any of the listed ids. A level condition matches against the context's
/// permission level; a context without a level never satisfies it.
#[derive(Debug, Clone)]
pub enum Condition {
	Level(LevelMatch),
	Channel(Box<[ChannelId]>),
	Role(Box<[RoleId]>),
	User(Box<[UserId]>),
}

impl Condition {
	pub fn matches(&self, ctx: &EvalContext) -> bool {
		match self {
			Condition::Level(m) => ctx.level.is_some_and(|level| m.matches(level)),
			Condition::Channel(channels) => {
				ctx.channel.is_some_and(|channel| channels.contains(&channel))
			}
			Condition::Role(roles) => roles.iter().any(|role| ctx.roles.contains(role)),
			Condition::User(users) => ctx.user.is_some_and(|user| users.contains(&user)),
		}
	}
}

/// A parsed override rule: conditions plus the config patch it applies
#[derive(Debug, Clone)]
pub struct OverrideRule {
	conditions: Box<[Condition]>,
	config: Value,
}

impl OverrideRule {
	/// Create a builder for constructing an OverrideRule
	pub fn builder() -> OverrideRuleBuilder {
		OverrideRuleBuilder::new()
	}

	pub fn conditions(&self) -> &[Condition] {
		&self.conditions
	}

	pub fn config(&self) -> &Value {
		&self.config
	}

	/// All conditions must hold. A rule with no conditions matches every
	/// context, which is how an unconditional base patch is expressed.
	pub fn matches(&self, ctx: &EvalContext) -> bool {
		self.conditions.iter().all(|c| c.matches(ctx))
	}
}

/// Builder for OverrideRule with fluent API
#[derive(Debug, Default)]
pub struct OverrideRuleBuilder {
	levels: Vec<Box<str>>,
	channels: Option<Vec<ChannelId>>,
	roles: Option<Vec<RoleId>>,
	users: Option<Vec<UserId>>,
	config: Option<Value>,
}

impl OverrideRuleBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a level predicate ("`>=50`"); repeated calls AND together
	pub fn level(mut self, spec: impl Into<Box<str>>) -> Self {
		self.levels.push(spec.into());
		self
	}

	/// Match when the context channel is any of the given channels
	pub fn channels(mut self, channels: impl IntoIterator<Item = ChannelId>) -> Self {
		self.channels.get_or_insert_with(Vec::new).extend(channels);
		self
	}

	/// Match when the context has any of the given roles
	pub fn roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
		self.roles.get_or_insert_with(Vec::new).extend(roles);
		self
	}

	/// Match when the context user is any of the given users
	pub fn users(mut self, users: impl IntoIterator<Item = UserId>) -> Self {
		self.users.get_or_insert_with(Vec::new).extend(users);
		self
	}

	/// Set the config patch applied when the rule matches
	pub fn config(mut self, config: Value) -> Self {
		self.config = Some(config);
		self
	}

	/// Build the rule, parsing every level predicate
	pub fn build(self) -> PbResult<OverrideRule> {
		let mut conditions = Vec::new();
		for spec in &self.levels {
			conditions.push(Condition::Level(LevelMatch::parse(spec)?));
		}
		if let Some(channels) = self.channels {
			conditions.push(Condition::Channel(channels.into()));
		}
		if let Some(roles) = self.roles {
			conditions.push(Condition::Role(roles.into()));
		}
		if let Some(users) = self.users {
			conditions.push(Condition::User(users.into()));
		}
		Ok(OverrideRule {
			conditions: conditions.into(),
			config: self.config.unwrap_or_else(|| Value::Object(serde_json::Map::new())),
		})
	}
}

/// Ordered list of override rules for one plugin
#[derive(Debug, Clone, Default)]
pub struct OverrideSet {
	rules: Vec<OverrideRule>,
}

impl OverrideSet {
	pub fn new(rules: Vec<OverrideRule>) -> Self {
		Self { rules }
	}

	pub fn rules(&self) -> &[OverrideRule] {
		&self.rules
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	/// Rules matching the context, in declaration order.
	///
	/// Declaration order is what makes "last match wins" deterministic:
	/// the caller folds the returned patches front to back.
	pub fn matching<'a>(
		&'a self,
		ctx: &'a EvalContext,
	) -> impl Iterator<Item = &'a OverrideRule> + 'a {
		self.rules.iter().filter(move |rule| rule.matches(ctx))
	}
}

/// One value or a list of values, as they appear in rule documents
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
	One(T),
	Many(Vec<T>),
}

impl<T> OneOrMany<T> {
	pub fn into_vec(self) -> Vec<T> {
		match self {
			OneOrMany::One(v) => vec![v],
			OneOrMany::Many(vs) => vs,
		}
	}
}

/// Raw override rule as written in config documents.
///
/// Unknown keys are rejected at parse time so a misspelled condition name
/// cannot turn a restricted rule into an unconditional one.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
	#[serde(default)]
	pub level: Option<OneOrMany<Box<str>>>,
	#[serde(default)]
	pub channel: Option<OneOrMany<ChannelId>>,
	#[serde(default)]
	pub role: Option<OneOrMany<RoleId>>,
	#[serde(default)]
	pub user: Option<OneOrMany<UserId>>,
	#[serde(default)]
	pub config: Value,
}

impl RuleSpec {
	/// Parse the raw form into an evaluated rule
	pub fn parse(self) -> PbResult<OverrideRule> {
		let mut builder = OverrideRule::builder();
		if let Some(levels) = self.level {
			for spec in levels.into_vec() {
				builder = builder.level(spec);
			}
		}
		if let Some(channels) = self.channel {
			builder = builder.channels(channels.into_vec());
		}
		if let Some(roles) = self.role {
			builder = builder.roles(roles.into_vec());
		}
		if let Some(users) = self.user {
			builder = builder.users(users.into_vec());
		}
		if !self.config.is_null() {
			builder = builder.config(self.config);
		}
		builder.build()
	}
}


// vim: ts=4
