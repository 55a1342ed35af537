//! Effective config resolution
//!
//! Resolution is a pure fold: schema defaults, then base patches, then every
//! matching override in declaration order. It cannot fail; anything that
//! could fail (schema checks, predicate parsing) happened at registration.

use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::merge::deep_merge;
use crate::overrides::{EvalContext, OverrideSet};

/// Limits memory for cached resolved configs (one entry per plugin/context pair)
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// The ordered layers that produce one plugin's effective config.
///
/// Declared layers come from the plugin's registration; guild layers come
/// from the guild's config document and always apply after their declared
/// counterpart, so a guild can override what a plugin ships with.
#[derive(Debug)]
pub struct ConfigLayers<'a> {
	/// Complete config built from schema defaults
	pub defaults: &'a Value,
	/// Base partial declared with the plugin
	pub base: Option<&'a Value>,
	/// Base partial from the guild's config document
	pub guild_base: Option<&'a Value>,
	/// Override rules declared with the plugin
	pub declared: &'a OverrideSet,
	/// Override rules from the guild's config document
	pub guild_rules: Option<&'a OverrideSet>,
}

/// Resolve the effective config for one context.
///
/// Later layers win on conflict; within a layer, later rules win, which is
/// what makes "last match wins" hold for rules that match the same context.
pub fn resolve_config(layers: &ConfigLayers<'_>, ctx: &EvalContext) -> Value {
	let mut config = layers.defaults.clone();
	if let Some(base) = layers.base {
		deep_merge(&mut config, base);
	}
	if let Some(guild_base) = layers.guild_base {
		deep_merge(&mut config, guild_base);
	}
	for rule in layers.declared.matching(ctx) {
		deep_merge(&mut config, rule.config());
	}
	if let Some(rules) = layers.guild_rules {
		for rule in rules.matching(ctx) {
			deep_merge(&mut config, rule.config());
		}
	}
	config
}

/// LRU cache for resolved configs, keyed by plugin name and eval context.
///
/// Values are shared as `Arc` so repeated lookups hand out the same
/// immutable document instead of cloning it.
#[derive(Clone)]
pub struct ResolvedCache {
	cache: Arc<parking_lot::RwLock<LruCache<(Box<str>, EvalContext), Arc<Value>>>>,
}

impl std::fmt::Debug for ResolvedCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ResolvedCache").field("entries", &self.cache.read().len()).finish()
	}
}

impl ResolvedCache {
	/// Create a new cache with the specified maximum capacity
	pub fn new(capacity: usize) -> Self {
		let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
		Self { cache: Arc::new(parking_lot::RwLock::new(LruCache::new(capacity))) }
	}

	pub fn get(&self, plugin: &str, ctx: &EvalContext) -> Option<Arc<Value>> {
		let mut cache = self.cache.write();
		cache.get(&(plugin.into(), ctx.clone())).cloned()
	}

	pub fn put(&self, plugin: &str, ctx: &EvalContext, value: Arc<Value>) {
		let mut cache = self.cache.write();
		cache.put((plugin.into(), ctx.clone()), value);
	}

	/// Invalidate everything; called when the guild's config document changes
	pub fn clear(&self) {
		let mut cache = self.cache.write();
		cache.clear();
	}

	pub fn len(&self) -> usize {
		self.cache.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.cache.read().is_empty()
	}
}

impl Default for ResolvedCache {
	fn default() -> Self {
		Self::new(DEFAULT_CACHE_CAPACITY)
	}
}


// vim: ts=4
