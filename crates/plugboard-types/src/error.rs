//! Error types shared by the engine, the host, and adapter implementations.

use std::fmt;

use crate::types::GuildId;

pub type PbResult<T> = std::result::Result<T, Error>;

/// A single schema violation: where it happened and what kind was expected there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
	/// Dot-separated key path ("log_channel", "mod_actions.can_warn", "roles[2]")
	pub path: Box<str>,
	pub expected: Box<str>,
	pub actual: Box<str>,
}

impl ConfigIssue {
	pub fn new(
		path: impl Into<Box<str>>,
		expected: impl Into<Box<str>>,
		actual: impl Into<Box<str>>,
	) -> Self {
		Self { path: path.into(), expected: expected.into(), actual: actual.into() }
	}

	/// Issue for a key the schema does not declare
	pub fn unknown_key(path: impl Into<Box<str>>, actual: impl Into<Box<str>>) -> Self {
		Self::new(path, "no such key", actual)
	}
}

impl fmt::Display for ConfigIssue {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}: expected {}, got {}", self.path, self.expected, self.actual)
	}
}

#[derive(Debug)]
pub enum Error {
	NotFound,
	DbError,

	/// Schema mismatch; carries every offending key path, not just the first
	ConfigValidation(Vec<ConfigIssue>),
	/// Rejected when a rule is registered; predicates never fail at evaluation time
	MalformedPredicate { spec: Box<str>, reason: Box<str> },
	/// Names every plugin on the offending cycle, in edge order
	DependencyCycle(Vec<Box<str>>),
	/// A declared dependency that no registered plugin satisfies
	UnknownDependency { plugin: Box<str>, dependency: Box<str> },
	/// Handle request for a dependency the plugin never declared
	UndeclaredDependency { plugin: Box<str>, dependency: Box<str> },
	PluginNotRegistered(Box<str>),
	PluginAlreadyRegistered(Box<str>),

	GuildAlreadyActive(GuildId),
	GuildNotActive(GuildId),
	/// An init hook failed; scoped to one guild, other guilds are unaffected
	InitFailed { guild: GuildId, plugin: Box<str>, reason: Box<str> },
	/// A lifecycle hook exceeded the caller-supplied bound
	InitTimeout { guild: GuildId, plugin: Box<str>, timeout_ms: u64 },

	Internal(String),

	// externals
	Io(std::io::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::DbError => write!(f, "database error"),
			Error::ConfigValidation(issues) => {
				write!(f, "config validation failed:")?;
				for issue in issues {
					write!(f, " [{}]", issue)?;
				}
				Ok(())
			}
			Error::MalformedPredicate { spec, reason } => {
				write!(f, "malformed predicate '{}': {}", spec, reason)
			}
			Error::DependencyCycle(members) => {
				write!(f, "dependency cycle: {}", members.join(" -> "))
			}
			Error::UnknownDependency { plugin, dependency } => {
				write!(f, "plugin '{}' depends on unregistered plugin '{}'", plugin, dependency)
			}
			Error::UndeclaredDependency { plugin, dependency } => {
				write!(f, "plugin '{}' requested undeclared dependency '{}'", plugin, dependency)
			}
			Error::PluginNotRegistered(name) => write!(f, "plugin '{}' is not registered", name),
			Error::PluginAlreadyRegistered(name) => {
				write!(f, "plugin '{}' is already registered", name)
			}
			Error::GuildAlreadyActive(guild_id) => {
				write!(f, "guild {} is already active", guild_id)
			}
			Error::GuildNotActive(guild_id) => write!(f, "guild {} is not active", guild_id),
			Error::InitFailed { guild, plugin, reason } => {
				write!(f, "plugin '{}' failed to initialize for guild {}: {}", plugin, guild, reason)
			}
			Error::InitTimeout { guild, plugin, timeout_ms } => {
				write!(
					f,
					"plugin '{}' init for guild {} exceeded {}ms timeout",
					plugin, guild, timeout_ms
				)
			}
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(e) => write!(f, "io error: {}", e),
		}
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

/// Locks a `std::sync::Mutex`, mapping poisoning to `Error::Internal` instead
/// of panicking.
///
/// ```ignore
/// let mut activating = lock!(self.activating, "activating")?;
/// ```
#[macro_export]
macro_rules! lock {
	($mutex:expr) => {
		$mutex
			.lock()
			.map_err(|_| $crate::error::Error::Internal("mutex poisoned".to_string()))
	};
	($mutex:expr, $name:expr) => {
		$mutex
			.lock()
			.map_err(|_| $crate::error::Error::Internal(format!("mutex poisoned: {}", $name)))
	};
}


// vim: ts=4
