//! Host builder - assembles plugins, adapters, and options into a running host

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::case_adapter::CaseAdapter;
use crate::hooks::{HostEnv, PluginHandle};
use crate::identity_adapter::IdentityAdapter;
use crate::lifecycle::{self, ActivationOpts, GuildOverlay, GuildRuntime};
use crate::lock;
use crate::overrides::EvalContext;
use crate::prelude::*;
use crate::registry::{FrozenPluginRegistry, PluginDescriptor, PluginRegistry};
use crate::time_adapter::TimeFormatAdapter;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Type alias for async initialization callbacks
type InitCallback =
	Box<dyn FnOnce(Host) -> Pin<Box<dyn Future<Output = PbResult<()>> + Send>> + Send>;

#[derive(Debug)]
pub struct HostOpts {
	/// Bound applied to every lifecycle hook; None lets hooks run unbounded
	pub hook_timeout: Option<Duration>,
	/// Per-guild resolve cache capacity; 0 selects the engine default
	pub cache_capacity: usize,
}

pub struct HostBuilder {
	opts: HostOpts,
	env: HostEnv,
	registry: PluginRegistry,
	on_init: Vec<InitCallback>,
}

impl HostBuilder {
	pub fn new() -> Self {
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_target(false)
			.try_init();
		HostBuilder {
			opts: HostOpts { hook_timeout: None, cache_capacity: 0 },
			env: HostEnv::default(),
			registry: PluginRegistry::new(),
			on_init: Vec::new(),
		}
	}

	// Opts
	pub fn hook_timeout(&mut self, timeout: Duration) -> &mut Self {
		self.opts.hook_timeout = Some(timeout);
		self
	}
	pub fn cache_capacity(&mut self, capacity: usize) -> &mut Self {
		self.opts.cache_capacity = capacity;
		self
	}

	// Adapters
	pub fn case_adapter(&mut self, case_adapter: Arc<dyn CaseAdapter>) -> &mut Self {
		self.env.case_adapter = Some(case_adapter);
		self
	}
	pub fn identity_adapter(&mut self, identity_adapter: Arc<dyn IdentityAdapter>) -> &mut Self {
		self.env.identity_adapter = Some(identity_adapter);
		self
	}
	pub fn time_adapter(&mut self, time_adapter: Arc<dyn TimeFormatAdapter>) -> &mut Self {
		self.env.time_adapter = Some(time_adapter);
		self
	}

	/// Register a plugin. Duplicate names are rejected here; dependency
	/// names are checked when the registry freezes in [`build`](Self::build).
	pub fn plugin(&mut self, descriptor: PluginDescriptor) -> PbResult<&mut Self> {
		self.registry.register(descriptor)?;
		Ok(self)
	}

	/// Register an async initialization callback that runs after the host is
	/// assembled but before `build` returns. Use this to pre-activate guilds.
	pub fn on_init<F, Fut>(&mut self, f: F) -> &mut Self
	where
		F: FnOnce(Host) -> Fut + Send + 'static,
		Fut: Future<Output = PbResult<()>> + Send + 'static,
	{
		self.on_init.push(Box::new(move |host| Box::pin(f(host))));
		self
	}

	/// Freeze the plugin registry and assemble the host
	pub async fn build(self) -> PbResult<Host> {
		let n = self.registry.len();
		let registry = Arc::new(self.registry.freeze()?);
		let host: Host = Arc::new(HostState {
			registry,
			env: Arc::new(self.env),
			opts: self.opts,
			guilds: RwLock::new(HashMap::new()),
			activating: Mutex::new(HashSet::new()),
		});
		info!("Plugboard host v{} ready with {} plugins", VERSION, n);
		for callback in self.on_init {
			callback(host.clone()).await?;
		}
		Ok(host)
	}
}

impl Default for HostBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Shared host state; use through the [`Host`] alias.
///
/// The guild map holds only fully activated runtimes. A guild being
/// activated is tracked separately, so concurrent activation attempts for
/// the same guild are rejected instead of racing.
pub struct HostState {
	pub registry: Arc<FrozenPluginRegistry>,
	pub env: Arc<HostEnv>,
	pub opts: HostOpts,
	guilds: RwLock<HashMap<GuildId, Arc<GuildRuntime>>>,
	activating: Mutex<HashSet<GuildId>>,
}

pub type Host = Arc<HostState>;

impl HostState {
	/// Activate a guild with no guild configuration document
	pub async fn activate_guild(&self, guild_id: GuildId) -> PbResult<()> {
		self.activate_inner(guild_id, None).await
	}

	/// Activate a guild with a guild configuration document.
	///
	/// The document is validated before activation starts; a bad document
	/// never claims the guild slot.
	pub async fn activate_guild_with_config(
		&self,
		guild_id: GuildId,
		config: Value,
	) -> PbResult<()> {
		let overlay = GuildOverlay::parse_value(config, &self.registry)?;
		self.activate_inner(guild_id, Some(Arc::new(overlay))).await
	}

	async fn activate_inner(
		&self,
		guild_id: GuildId,
		overlay: Option<Arc<GuildOverlay>>,
	) -> PbResult<()> {
		{
			let mut activating = lock!(self.activating, "activating")?;
			if activating.contains(&guild_id) || self.guild(guild_id).is_some() {
				return Err(Error::GuildAlreadyActive(guild_id));
			}
			activating.insert(guild_id);
		}
		let opts = ActivationOpts {
			hook_timeout: self.opts.hook_timeout,
			cache_capacity: self.opts.cache_capacity,
		};
		let result =
			lifecycle::activate(guild_id, self.registry.clone(), self.env.clone(), overlay, &opts)
				.await;
		match result {
			Ok(runtime) => {
				// Publish first, then release the claim, so no second
				// activation can slip in between
				self.guilds
					.write()
					.map_err(|_| Error::Internal("failed to access guild map".to_string()))?
					.insert(guild_id, Arc::new(runtime));
				lock!(self.activating, "activating")?.remove(&guild_id);
				Ok(())
			}
			Err(err) => {
				lock!(self.activating, "activating")?.remove(&guild_id);
				Err(err)
			}
		}
	}

	/// Deactivate a guild, tearing its plugins down in reverse load order.
	/// The guild stops being resolvable before teardown hooks run.
	pub async fn deactivate_guild(&self, guild_id: GuildId) -> PbResult<()> {
		let runtime = self
			.guilds
			.write()
			.map_err(|_| Error::Internal("failed to access guild map".to_string()))?
			.remove(&guild_id)
			.ok_or(Error::GuildNotActive(guild_id))?;
		runtime.deactivate(self.opts.hook_timeout).await;
		Ok(())
	}

	/// Validate and swap in a new guild configuration document.
	///
	/// This changes configuration resolution only; the loaded plugin set is
	/// not recomputed. Deactivate and reactivate to apply `enabled` changes.
	pub fn reload_guild_config(&self, guild_id: GuildId, config: Value) -> PbResult<()> {
		let overlay = GuildOverlay::parse_value(config, &self.registry)?;
		let runtime = self.guild(guild_id).ok_or(Error::GuildNotActive(guild_id))?;
		runtime.swap_overlay(Some(Arc::new(overlay)));
		Ok(())
	}

	/// Resolve a plugin's effective configuration for an active guild
	pub fn resolve(&self, guild_id: GuildId, plugin: &str, ctx: &EvalContext) -> PbResult<Arc<Value>> {
		let runtime = self.guild(guild_id).ok_or(Error::GuildNotActive(guild_id))?;
		runtime.resolve(plugin, ctx)
	}

	/// Resolve a plugin's configuration from its declared layers only,
	/// without any guild document. Works whether or not a guild is active.
	pub fn resolve_declared(&self, plugin: &str, ctx: &EvalContext) -> PbResult<Value> {
		lifecycle::resolve_declared(&self.registry, plugin, ctx)
	}

	/// Handle onto a loaded plugin of an active guild
	pub fn handle(&self, guild_id: GuildId, plugin: &str) -> PbResult<PluginHandle> {
		let runtime = self.guild(guild_id).ok_or(Error::GuildNotActive(guild_id))?;
		runtime.handle(plugin)
	}

	/// Runtime of an active guild, if any
	pub fn guild(&self, guild_id: GuildId) -> Option<Arc<GuildRuntime>> {
		self.guilds.read().ok()?.get(&guild_id).cloned()
	}

	pub fn is_active(&self, guild_id: GuildId) -> bool {
		self.guild(guild_id).is_some()
	}

	/// Ids of all active guilds, in ascending order
	pub fn active_guilds(&self) -> Vec<GuildId> {
		let mut ids: Vec<GuildId> = match self.guilds.read() {
			Ok(guilds) => guilds.keys().copied().collect(),
			Err(_) => Vec::new(),
		};
		ids.sort_unstable();
		ids
	}
}

// vim: ts=4
