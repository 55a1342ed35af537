//! Lifecycle hook types and the context handed to them

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use plugboard_types::case_adapter::CaseAdapter;
use plugboard_types::identity_adapter::IdentityAdapter;
use plugboard_types::time_adapter::TimeFormatAdapter;

use crate::lifecycle::{resolve_cached, GuildOverlay};
use crate::overrides::EvalContext;
use crate::prelude::*;
use crate::registry::FrozenPluginRegistry;
use crate::resolver::ResolvedCache;
use crate::state::StateMap;

/// Result type for hook functions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Plugin hook function type.
/// Takes the plugin's context for one guild, returns a Future resolving to PbResult
pub type PluginHook = Arc<dyn Fn(PluginCtx) -> BoxFuture<'static, PbResult<()>> + Send + Sync>;

/// Which lifecycle phase a hook runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
	Init,
	Teardown,
}

impl HookKind {
	/// Get string representation of the hook kind
	pub fn as_str(&self) -> &'static str {
		match self {
			HookKind::Init => "init",
			HookKind::Teardown => "teardown",
		}
	}
}

/// Adapters shared with every plugin of a host
#[derive(Debug, Default, Clone)]
pub struct HostEnv {
	pub case_adapter: Option<Arc<dyn CaseAdapter>>,
	pub identity_adapter: Option<Arc<dyn IdentityAdapter>>,
	pub time_adapter: Option<Arc<dyn TimeFormatAdapter>>,
}

/// Per-plugin state shared between the plugin's hooks and its dependents
pub(crate) type SharedState = Arc<parking_lot::Mutex<StateMap>>;

/// States of every plugin that reached Ready, keyed by plugin name
pub(crate) type ReadyMap = Arc<parking_lot::RwLock<HashMap<Box<str>, SharedState>>>;

/// Handle onto a plugin that finished initializing.
///
/// State values are cloned out rather than borrowed; plugins attach cheap
/// handles (an `Arc` around a store, an id) so cloning is the natural way
/// to hand them across plugin boundaries.
#[derive(Debug, Clone)]
pub struct PluginHandle {
	name: Box<str>,
	state: SharedState,
}

impl PluginHandle {
	pub(crate) fn new(name: Box<str>, state: SharedState) -> Self {
		Self { name, state }
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Typed access to the plugin's attached state
	pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
		self.state.lock().get::<T>().cloned()
	}

	/// Like [`get`](Self::get), but a missing entry is an engine error for
	/// dependents that contractually expect the state to be there
	pub fn expect<T: Clone + Send + Sync + 'static>(&self, what: &str) -> PbResult<T> {
		self.get::<T>().ok_or_else(|| {
			Error::Internal(format!("missing plugin state on '{}': {}", self.name, what))
		})
	}
}

/// Context handed to a plugin's lifecycle hooks.
///
/// Everything here is scoped to one (guild, plugin) pair: the state map is
/// the plugin's own, the dependency handles only cover declared
/// dependencies, and resolve() answers for this guild's config document.
#[derive(Debug, Clone)]
pub struct PluginCtx {
	guild_id: GuildId,
	plugin: Box<str>,
	registry: Arc<FrozenPluginRegistry>,
	ready: ReadyMap,
	overlay: Option<Arc<GuildOverlay>>,
	cache: ResolvedCache,
	env: Arc<HostEnv>,
	state: SharedState,
}

impl PluginCtx {
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn new(
		guild_id: GuildId,
		plugin: Box<str>,
		registry: Arc<FrozenPluginRegistry>,
		ready: ReadyMap,
		overlay: Option<Arc<GuildOverlay>>,
		cache: ResolvedCache,
		env: Arc<HostEnv>,
		state: SharedState,
	) -> Self {
		Self { guild_id, plugin, registry, ready, overlay, cache, env, state }
	}

	pub fn guild_id(&self) -> GuildId {
		self.guild_id
	}

	pub fn plugin(&self) -> &str {
		&self.plugin
	}

	/// Attach state for dependents to read once this plugin is ready
	pub fn attach<T: Send + Sync + 'static>(&self, val: T) {
		self.state.lock().insert(val);
	}

	/// Resolve this plugin's effective config for an eval context
	pub fn resolve(&self, ctx: &EvalContext) -> PbResult<Arc<Value>> {
		resolve_cached(&self.registry, self.overlay.as_deref(), &self.cache, &self.plugin, ctx)
	}

	/// Handle onto a declared dependency.
	///
	/// Asking for a plugin that was never declared is rejected even when
	/// that plugin happens to be loaded; undeclared access would make init
	/// ordering accidental instead of guaranteed.
	pub fn dependency(&self, name: &str) -> PbResult<PluginHandle> {
		let desc = self
			.registry
			.get(&self.plugin)
			.ok_or_else(|| Error::PluginNotRegistered(self.plugin.clone()))?;
		if !desc.dependencies().iter().any(|dep| &**dep == name) {
			return Err(Error::UndeclaredDependency {
				plugin: self.plugin.clone(),
				dependency: name.into(),
			});
		}
		let ready = self.ready.read();
		let state = ready
			.get(name)
			.cloned()
			.ok_or_else(|| Error::Internal(format!("dependency '{}' is not ready", name)))?;
		Ok(PluginHandle::new(name.into(), state))
	}

	pub fn case_adapter(&self) -> PbResult<Arc<dyn CaseAdapter>> {
		self.env
			.case_adapter
			.clone()
			.ok_or_else(|| Error::Internal("No case adapter configured".into()))
	}

	pub fn identity_adapter(&self) -> PbResult<Arc<dyn IdentityAdapter>> {
		self.env
			.identity_adapter
			.clone()
			.ok_or_else(|| Error::Internal("No identity adapter configured".into()))
	}

	pub fn time_adapter(&self) -> PbResult<Arc<dyn TimeFormatAdapter>> {
		self.env
			.time_adapter
			.clone()
			.ok_or_else(|| Error::Internal("No time format adapter configured".into()))
	}
}


// vim: ts=4
