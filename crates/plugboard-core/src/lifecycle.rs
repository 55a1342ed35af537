//! Per-guild plugin lifecycle
//!
//! Activation walks the frozen load order, runs each plugin's init hook,
//! and only publishes the runtime once every plugin is ready. A failure
//! rolls back the already-initialized plugins in reverse order, so a
//! half-activated guild is never observable. Guilds are independent: one
//! guild failing or reloading never touches another.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::hooks::{HookKind, HostEnv, PluginCtx, PluginHandle, ReadyMap, SharedState};
use crate::overrides::{EvalContext, OverrideSet, RuleSpec};
use crate::prelude::*;
use crate::registry::{collect_partial_issues, FrozenPluginRegistry};
use crate::resolver::{resolve_config, ConfigLayers, ResolvedCache, DEFAULT_CACHE_CAPACITY};
use crate::state::StateMap;

/// Lifecycle state of one plugin within one guild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
	Unloaded,
	Initializing,
	Ready,
	Unloading,
}

impl PluginState {
	pub fn as_str(&self) -> &'static str {
		match self {
			PluginState::Unloaded => "unloaded",
			PluginState::Initializing => "initializing",
			PluginState::Ready => "ready",
			PluginState::Unloading => "unloading",
		}
	}
}

fn default_true() -> bool {
	true
}

/// Raw guild config document.
///
/// Unknown top-level keys are tolerated; unknown keys inside a plugin
/// entry are not, so a misspelled "overrides" cannot silently drop rules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuildConfigDoc {
	/// Permission levels keyed by user or role id
	#[serde(default)]
	pub levels: HashMap<Box<str>, i64>,
	#[serde(default)]
	pub plugins: HashMap<Box<str>, PluginConfigDoc>,
}

/// Raw per-plugin entry of a guild config document
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConfigDoc {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default)]
	pub config: Value,
	#[serde(default)]
	pub overrides: Vec<RuleSpec>,
}

/// Validated per-plugin overlay
#[derive(Debug)]
pub struct PluginOverlay {
	enabled: bool,
	config: Option<Value>,
	rules: OverrideSet,
}

impl PluginOverlay {
	pub fn enabled(&self) -> bool {
		self.enabled
	}

	pub fn config(&self) -> Option<&Value> {
		self.config.as_ref()
	}

	pub fn rules(&self) -> &OverrideSet {
		&self.rules
	}
}

/// A guild's validated config overlay.
///
/// Parsing is the validation boundary: every plugin entry is checked
/// against the plugin's schema and every override predicate is parsed, so
/// resolution against an overlay can never fail.
#[derive(Debug, Default)]
pub struct GuildOverlay {
	levels: HashMap<Box<str>, i64>,
	plugins: HashMap<Box<str>, PluginOverlay>,
}

impl GuildOverlay {
	/// Parse and validate a raw document against the registry
	pub fn parse(doc: GuildConfigDoc, registry: &FrozenPluginRegistry) -> PbResult<Self> {
		let mut plugins = HashMap::with_capacity(doc.plugins.len());
		let mut issues = Vec::new();
		for (name, plugin_doc) in doc.plugins {
			let Some(desc) = registry.get(&name) else {
				return Err(Error::PluginNotRegistered(name));
			};
			let schema = desc.schema();

			let config = if plugin_doc.config.is_null() {
				None
			} else {
				let prefix = format!("plugins.{}.config", name);
				collect_partial_issues(schema, &plugin_doc.config, &prefix, &mut issues)?;
				Some(plugin_doc.config)
			};

			let mut rules = Vec::with_capacity(plugin_doc.overrides.len());
			for (idx, spec) in plugin_doc.overrides.into_iter().enumerate() {
				let rule = spec.parse()?;
				let prefix = format!("plugins.{}.overrides[{}].config", name, idx);
				collect_partial_issues(schema, rule.config(), &prefix, &mut issues)?;
				rules.push(rule);
			}

			plugins.insert(
				name,
				PluginOverlay {
					enabled: plugin_doc.enabled,
					config,
					rules: OverrideSet::new(rules),
				},
			);
		}
		if !issues.is_empty() {
			return Err(Error::ConfigValidation(issues));
		}
		Ok(Self { levels: doc.levels, plugins })
	}

	/// Parse a JSON value as a guild config document
	pub fn parse_value(value: Value, registry: &FrozenPluginRegistry) -> PbResult<Self> {
		let doc: GuildConfigDoc = serde_json::from_value(value).map_err(|err| {
			Error::ConfigValidation(vec![ConfigIssue::new(
				"<document>",
				"guild config document",
				err.to_string(),
			)])
		})?;
		Self::parse(doc, registry)
	}

	pub fn plugin(&self, name: &str) -> Option<&PluginOverlay> {
		self.plugins.get(name)
	}

	/// Plugins without an entry are enabled; disabling is explicit
	pub fn enabled(&self, name: &str) -> bool {
		self.plugins.get(name).is_none_or(|p| p.enabled)
	}

	pub fn levels(&self) -> &HashMap<Box<str>, i64> {
		&self.levels
	}

	/// Permission level of a member: the highest level granted to their
	/// user id or any of their roles
	pub fn level_for(&self, user: Option<UserId>, roles: &[RoleId]) -> Option<i64> {
		let mut level: Option<i64> = None;
		if let Some(user) = user {
			if let Some(&l) = self.levels.get(user.0.to_string().as_str()) {
				level = Some(l);
			}
		}
		for role in roles {
			if let Some(&l) = self.levels.get(role.0.to_string().as_str()) {
				level = Some(level.map_or(l, |cur| cur.max(l)));
			}
		}
		level
	}
}

/// Options controlling guild activation
#[derive(Debug, Clone, Default)]
pub struct ActivationOpts {
	/// Bound applied to each lifecycle hook; None lets hooks run unbounded
	pub hook_timeout: Option<Duration>,
	/// Capacity of the per-guild resolve cache; 0 selects the default
	pub cache_capacity: usize,
}

/// Resolve a plugin's config from its declared layers only, without a
/// guild overlay or cache. Used when answering for a guild that is not
/// active.
pub fn resolve_declared(
	registry: &FrozenPluginRegistry,
	plugin: &str,
	ctx: &EvalContext,
) -> PbResult<Value> {
	let desc = registry.get(plugin).ok_or_else(|| Error::PluginNotRegistered(plugin.into()))?;
	let defaults = desc.schema().defaults();
	let layers = ConfigLayers {
		defaults: &defaults,
		base: desc.base_config(),
		guild_base: None,
		declared: desc.overrides(),
		guild_rules: None,
	};
	Ok(resolve_config(&layers, ctx))
}

/// Overlay-aware resolution behind the per-guild cache
pub(crate) fn resolve_cached(
	registry: &FrozenPluginRegistry,
	overlay: Option<&GuildOverlay>,
	cache: &ResolvedCache,
	plugin: &str,
	ctx: &EvalContext,
) -> PbResult<Arc<Value>> {
	let desc = registry.get(plugin).ok_or_else(|| Error::PluginNotRegistered(plugin.into()))?;
	if let Some(hit) = cache.get(plugin, ctx) {
		debug!("Resolve cache hit: {}", plugin);
		return Ok(hit);
	}
	let defaults = desc.schema().defaults();
	let plugin_overlay = overlay.and_then(|o| o.plugin(plugin));
	let layers = ConfigLayers {
		defaults: &defaults,
		base: desc.base_config(),
		guild_base: plugin_overlay.and_then(PluginOverlay::config),
		declared: desc.overrides(),
		guild_rules: plugin_overlay.map(PluginOverlay::rules),
	};
	let resolved = Arc::new(resolve_config(&layers, ctx));
	cache.put(plugin, ctx, resolved.clone());
	Ok(resolved)
}

/// Runtime of one activated guild
#[derive(Debug)]
pub struct GuildRuntime {
	guild_id: GuildId,
	registry: Arc<FrozenPluginRegistry>,
	env: Arc<HostEnv>,
	overlay: parking_lot::RwLock<Option<Arc<GuildOverlay>>>,
	cache: ResolvedCache,
	states: parking_lot::RwLock<HashMap<Box<str>, PluginState>>,
	ready: ReadyMap,
	/// Successfully initialized plugins, in load order
	loaded: parking_lot::RwLock<Vec<Box<str>>>,
}

impl GuildRuntime {
	fn new(
		guild_id: GuildId,
		registry: Arc<FrozenPluginRegistry>,
		env: Arc<HostEnv>,
		overlay: Option<Arc<GuildOverlay>>,
		opts: &ActivationOpts,
	) -> Self {
		let capacity = if opts.cache_capacity == 0 {
			DEFAULT_CACHE_CAPACITY
		} else {
			opts.cache_capacity
		};
		Self {
			guild_id,
			registry,
			env,
			overlay: parking_lot::RwLock::new(overlay),
			cache: ResolvedCache::new(capacity),
			states: parking_lot::RwLock::new(HashMap::new()),
			ready: ReadyMap::default(),
			loaded: parking_lot::RwLock::new(Vec::new()),
		}
	}

	pub fn guild_id(&self) -> GuildId {
		self.guild_id
	}

	/// Resolve a plugin's effective config for this guild
	pub fn resolve(&self, plugin: &str, ctx: &EvalContext) -> PbResult<Arc<Value>> {
		let overlay = self.overlay.read().clone();
		resolve_cached(&self.registry, overlay.as_deref(), &self.cache, plugin, ctx)
	}

	/// Handle onto a loaded plugin.
	///
	/// An unregistered name and a registered-but-not-loaded plugin are
	/// distinct failures; only the latter depends on this guild's config.
	pub fn handle(&self, plugin: &str) -> PbResult<PluginHandle> {
		if !self.registry.contains(plugin) {
			return Err(Error::PluginNotRegistered(plugin.into()));
		}
		let state = self.ready.read().get(plugin).cloned().ok_or(Error::NotFound)?;
		Ok(PluginHandle::new(plugin.into(), state))
	}

	pub fn plugin_state(&self, plugin: &str) -> PluginState {
		self.states.read().get(plugin).copied().unwrap_or(PluginState::Unloaded)
	}

	/// Names of the plugins loaded for this guild, in load order
	pub fn loaded_plugins(&self) -> Vec<Box<str>> {
		self.loaded.read().clone()
	}

	pub fn overlay(&self) -> Option<Arc<GuildOverlay>> {
		self.overlay.read().clone()
	}

	/// Permission level of a member under this guild's level table
	pub fn member_level(&self, user: Option<UserId>, roles: &[RoleId]) -> Option<i64> {
		self.overlay.read().as_ref().and_then(|o| o.level_for(user, roles))
	}

	/// Swap in a new overlay and drop every cached resolved config.
	/// A stale cached config after a reload would be a correctness bug.
	pub fn swap_overlay(&self, overlay: Option<Arc<GuildOverlay>>) {
		*self.overlay.write() = overlay;
		self.cache.clear();
		info!("Guild {} config reloaded, resolve cache cleared", self.guild_id);
	}

	fn set_state(&self, plugin: &str, state: PluginState) {
		let old = {
			let mut states = self.states.write();
			states.insert(plugin.into(), state).unwrap_or(PluginState::Unloaded)
		};
		debug!(
			"Guild {} plugin {}: {} -> {}",
			self.guild_id,
			plugin,
			old.as_str(),
			state.as_str()
		);
	}

	/// Enabled plugins plus everything they transitively depend on.
	/// A dependency stays loaded even when the guild disables it directly.
	fn load_set(&self, overlay: Option<&GuildOverlay>) -> HashSet<Box<str>> {
		let mut set: HashSet<Box<str>> = HashSet::new();
		let mut stack: Vec<Box<str>> = Vec::new();
		for desc in self.registry.plugins() {
			if overlay.is_none_or(|o| o.enabled(desc.name())) {
				stack.push(desc.name().into());
			}
		}
		while let Some(name) = stack.pop() {
			if set.contains(&name) {
				continue;
			}
			if let Some(desc) = self.registry.get(&name) {
				for dep in desc.dependencies() {
					stack.push(dep.clone());
				}
			}
			set.insert(name);
		}
		set
	}

	async fn init_all(&self, timeout: Option<Duration>) -> PbResult<()> {
		let overlay = self.overlay.read().clone();
		let load_set = self.load_set(overlay.as_deref());

		for desc in self.registry.load_order() {
			let name = desc.name();
			if !load_set.contains(name) {
				debug!("Guild {} plugin {} disabled, skipping", self.guild_id, name);
				continue;
			}
			self.set_state(name, PluginState::Initializing);
			let state: SharedState = Arc::new(parking_lot::Mutex::new(StateMap::new()));
			let ctx = PluginCtx::new(
				self.guild_id,
				name.into(),
				self.registry.clone(),
				self.ready.clone(),
				overlay.clone(),
				self.cache.clone(),
				self.env.clone(),
				state.clone(),
			);
			match run_hook(desc.init(), ctx, timeout, HookKind::Init).await {
				HookOutcome::Ok => {
					self.ready.write().insert(name.into(), state);
					self.loaded.write().push(name.into());
					self.set_state(name, PluginState::Ready);
				}
				HookOutcome::Failed(err) => {
					self.set_state(name, PluginState::Unloaded);
					return Err(Error::InitFailed {
						guild: self.guild_id,
						plugin: name.into(),
						reason: err.to_string().into(),
					});
				}
				HookOutcome::TimedOut(bound) => {
					self.set_state(name, PluginState::Unloaded);
					return Err(Error::InitTimeout {
						guild: self.guild_id,
						plugin: name.into(),
						timeout_ms: bound.as_millis() as u64,
					});
				}
			}
		}
		Ok(())
	}

	/// Tear down every loaded plugin in reverse load order.
	///
	/// Teardown failures are logged and do not stop the walk; dependents
	/// were already torn down when their dependency's hook runs.
	pub async fn deactivate(&self, timeout: Option<Duration>) {
		let loaded: Vec<Box<str>> = self.loaded.read().clone();
		let overlay = self.overlay.read().clone();
		for name in loaded.iter().rev() {
			let state = self.ready.read().get(name).cloned();
			let Some(state) = state else { continue };
			self.set_state(name, PluginState::Unloading);
			if let Some(desc) = self.registry.get(name) {
				if desc.teardown().is_some() {
					let ctx = PluginCtx::new(
						self.guild_id,
						name.clone(),
						self.registry.clone(),
						self.ready.clone(),
						overlay.clone(),
						self.cache.clone(),
						self.env.clone(),
						state,
					);
					match run_hook(desc.teardown(), ctx, timeout, HookKind::Teardown).await {
						HookOutcome::Ok => {}
						HookOutcome::Failed(err) => warn!(
							"Teardown failed for guild {} plugin {}: {}",
							self.guild_id, name, err
						),
						HookOutcome::TimedOut(bound) => warn!(
							"Teardown timed out for guild {} plugin {} after {:?}",
							self.guild_id, name, bound
						),
					}
				}
			}
			self.ready.write().remove(name);
			self.set_state(name, PluginState::Unloaded);
		}
		self.loaded.write().clear();
		info!("Guild {} deactivated", self.guild_id);
	}
}

/// Activate a guild: run init hooks in load order and hand back the
/// runtime only if every plugin reached Ready.
///
/// On failure the already-ready subset is torn down in reverse order and
/// the error names the offending plugin; the caller never sees a partially
/// activated runtime.
pub async fn activate(
	guild_id: GuildId,
	registry: Arc<FrozenPluginRegistry>,
	env: Arc<HostEnv>,
	overlay: Option<Arc<GuildOverlay>>,
	opts: &ActivationOpts,
) -> PbResult<GuildRuntime> {
	let runtime = GuildRuntime::new(guild_id, registry, env, overlay, opts);
	match runtime.init_all(opts.hook_timeout).await {
		Ok(()) => {
			info!(
				"Guild {} activated with {} plugins",
				guild_id,
				runtime.loaded.read().len()
			);
			Ok(runtime)
		}
		Err(err) => {
			warn!("Activation failed for guild {}: {}", guild_id, err);
			runtime.deactivate(opts.hook_timeout).await;
			Err(err)
		}
	}
}

enum HookOutcome {
	Ok,
	Failed(Error),
	TimedOut(Duration),
}

async fn run_hook(
	hook: Option<&crate::hooks::PluginHook>,
	ctx: PluginCtx,
	timeout: Option<Duration>,
	kind: HookKind,
) -> HookOutcome {
	let Some(hook) = hook else { return HookOutcome::Ok };
	trace!("Running {} hook for {}/{}", kind.as_str(), ctx.guild_id(), ctx.plugin());
	let fut = hook(ctx);
	match timeout {
		Some(bound) => match tokio::time::timeout(bound, fut).await {
			Ok(Ok(())) => HookOutcome::Ok,
			Ok(Err(err)) => HookOutcome::Failed(err),
			Err(_) => HookOutcome::TimedOut(bound),
		},
		None => match fut.await {
			Ok(()) => HookOutcome::Ok,
			Err(err) => HookOutcome::Failed(err),
		},
	}
}


// vim: ts=4
