//! Plugin descriptors and the registry that orders them
//!
//! Plugins are registered while the host is being built, then the registry
//! is frozen: dependency names are checked, the load order is computed once,
//! and nothing about the plugin set can change afterwards.

use itertools::Itertools;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use crate::hooks::{PluginCtx, PluginHook};
use crate::overrides::{OverrideRule, OverrideSet};
use crate::prelude::*;
use crate::schema::ConfigSchema;

/// Everything a plugin declares about itself
pub struct PluginDescriptor {
	name: Box<str>,
	schema: ConfigSchema,
	base_config: Option<Value>,
	overrides: OverrideSet,
	dependencies: Box<[Box<str>]>,
	init: Option<PluginHook>,
	teardown: Option<PluginHook>,
}

impl std::fmt::Debug for PluginDescriptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PluginDescriptor")
			.field("name", &self.name)
			.field("dependencies", &self.dependencies)
			.field("overrides", &self.overrides.len())
			.field("init", &self.init.as_ref().map(|_| ".."))
			.field("teardown", &self.teardown.as_ref().map(|_| ".."))
			.finish()
	}
}

impl PluginDescriptor {
	/// Create a builder for constructing a PluginDescriptor
	pub fn builder(name: impl Into<Box<str>>) -> PluginDescriptorBuilder {
		PluginDescriptorBuilder::new(name)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn schema(&self) -> &ConfigSchema {
		&self.schema
	}

	pub fn base_config(&self) -> Option<&Value> {
		self.base_config.as_ref()
	}

	pub fn overrides(&self) -> &OverrideSet {
		&self.overrides
	}

	/// Declared dependencies, in declaration order
	pub fn dependencies(&self) -> &[Box<str>] {
		&self.dependencies
	}

	pub fn init(&self) -> Option<&PluginHook> {
		self.init.as_ref()
	}

	pub fn teardown(&self) -> Option<&PluginHook> {
		self.teardown.as_ref()
	}
}

/// Builder for PluginDescriptor with fluent API
#[derive(Default)]
pub struct PluginDescriptorBuilder {
	name: Box<str>,
	schema: Option<ConfigSchema>,
	base_config: Option<Value>,
	overrides: Vec<OverrideRule>,
	dependencies: Vec<Box<str>>,
	init: Option<PluginHook>,
	teardown: Option<PluginHook>,
}

impl PluginDescriptorBuilder {
	pub fn new(name: impl Into<Box<str>>) -> Self {
		Self { name: name.into(), ..Self::default() }
	}

	/// Set the config schema (defaults to an empty schema)
	pub fn schema(mut self, schema: ConfigSchema) -> Self {
		self.schema = Some(schema);
		self
	}

	/// Set the base config partial, applied over the schema defaults
	pub fn config(mut self, config: Value) -> Self {
		self.base_config = Some(config);
		self
	}

	/// Append an override rule; rules evaluate in the order they are added
	pub fn override_rule(mut self, rule: OverrideRule) -> Self {
		self.overrides.push(rule);
		self
	}

	/// Declare a dependency on another plugin
	pub fn dependency(mut self, name: impl Into<Box<str>>) -> Self {
		let name = name.into();
		if !self.dependencies.contains(&name) {
			self.dependencies.push(name);
		}
		self
	}

	/// Declare several dependencies, in order
	pub fn dependencies<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Box<str>>,
	{
		for name in names {
			self = self.dependency(name);
		}
		self
	}

	/// Set the init hook, run when a guild loads this plugin
	pub fn on_init<F, Fut>(mut self, f: F) -> Self
	where
		F: Fn(PluginCtx) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = PbResult<()>> + Send + 'static,
	{
		self.init = Some(Arc::new(move |ctx| Box::pin(f(ctx))));
		self
	}

	/// Set the teardown hook, run when a guild unloads this plugin
	pub fn on_teardown<F, Fut>(mut self, f: F) -> Self
	where
		F: Fn(PluginCtx) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = PbResult<()>> + Send + 'static,
	{
		self.teardown = Some(Arc::new(move |ctx| Box::pin(f(ctx))));
		self
	}

	/// Build the descriptor, validating the base config and every override
	/// patch against the schema. All violations are reported together.
	pub fn build(self) -> PbResult<PluginDescriptor> {
		if self.name.trim().is_empty() {
			return Err(Error::ConfigValidation(vec![ConfigIssue::new(
				"name",
				"non-empty plugin name",
				"empty",
			)]));
		}
		let schema = self.schema.unwrap_or_default();

		let mut issues = Vec::new();
		if let Some(config) = &self.base_config {
			collect_partial_issues(&schema, config, "config", &mut issues)?;
		}
		for (idx, rule) in self.overrides.iter().enumerate() {
			let prefix = format!("overrides[{}].config", idx);
			collect_partial_issues(&schema, rule.config(), &prefix, &mut issues)?;
		}
		if !issues.is_empty() {
			return Err(Error::ConfigValidation(issues));
		}

		Ok(PluginDescriptor {
			name: self.name,
			schema,
			base_config: self.base_config,
			overrides: OverrideSet::new(self.overrides),
			dependencies: self.dependencies.into(),
			init: self.init,
			teardown: self.teardown,
		})
	}
}

/// Run a partial validation and remap issue paths under a prefix, so issues
/// from different patches stay distinguishable in one report
pub(crate) fn collect_partial_issues(
	schema: &ConfigSchema,
	config: &Value,
	prefix: &str,
	issues: &mut Vec<ConfigIssue>,
) -> PbResult<()> {
	match schema.validate_partial(config) {
		Ok(()) => Ok(()),
		Err(Error::ConfigValidation(list)) => {
			for issue in list {
				let path = if &*issue.path == "<config>" {
					prefix.into()
				} else {
					format!("{}.{}", prefix, issue.path).into()
				};
				issues.push(ConfigIssue { path, ..issue });
			}
			Ok(())
		}
		Err(err) => Err(err),
	}
}

/// Mutable registry used while the host is being built
#[derive(Debug, Default)]
pub struct PluginRegistry {
	plugins: Vec<PluginDescriptor>,
}

impl PluginRegistry {
	pub fn new() -> Self {
		Self { plugins: Vec::new() }
	}

	/// Register a plugin descriptor; registration order is the tie-break
	/// for the load order
	pub fn register(&mut self, desc: PluginDescriptor) -> PbResult<()> {
		if self.plugins.iter().any(|p| p.name == desc.name) {
			return Err(Error::PluginAlreadyRegistered(desc.name.clone()));
		}
		debug!("Registering plugin: {}", desc.name);
		self.plugins.push(desc);
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.plugins.len()
	}

	pub fn is_empty(&self) -> bool {
		self.plugins.is_empty()
	}

	/// Freeze the registry: check dependency names, compute the load order,
	/// and make the plugin set immutable
	pub fn freeze(self) -> PbResult<FrozenPluginRegistry> {
		let n = self.plugins.len();
		let mut index = HashMap::with_capacity(n);
		for (i, desc) in self.plugins.iter().enumerate() {
			index.insert(desc.name.clone(), i);
		}

		let mut deps_idx: Vec<Vec<usize>> = Vec::with_capacity(n);
		for desc in &self.plugins {
			let mut ids = Vec::with_capacity(desc.dependencies.len());
			for dep in desc.dependencies.iter() {
				let Some(&d) = index.get(dep) else {
					return Err(Error::UnknownDependency {
						plugin: desc.name.clone(),
						dependency: dep.clone(),
					});
				};
				ids.push(d);
			}
			deps_idx.push(ids);
		}

		let load_order = toposort(&self.plugins, &deps_idx)?;
		info!("Freezing plugin registry with {} plugins", n);
		debug!(
			"Plugin load order: {}",
			load_order.iter().map(|&i| &*self.plugins[i].name).join(", ")
		);

		Ok(FrozenPluginRegistry {
			plugins: self.plugins.into(),
			index,
			load_order: load_order.into(),
		})
	}
}

/// Kahn's algorithm over the dependency graph.
///
/// The ready set is ordered by registration index, so whenever several
/// plugins are simultaneously loadable the earliest-registered one goes
/// first. That makes the load order fully deterministic.
fn toposort(plugins: &[PluginDescriptor], deps_idx: &[Vec<usize>]) -> PbResult<Vec<usize>> {
	let n = plugins.len();
	let mut in_degree: Vec<usize> = deps_idx.iter().map(Vec::len).collect();
	let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
	for (i, ids) in deps_idx.iter().enumerate() {
		for &d in ids {
			dependents[d].push(i);
		}
	}

	let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
	let mut load_order = Vec::with_capacity(n);
	while let Some(i) = ready.pop_first() {
		load_order.push(i);
		for &j in &dependents[i] {
			in_degree[j] -= 1;
			if in_degree[j] == 0 {
				ready.insert(j);
			}
		}
	}

	if load_order.len() < n {
		return Err(Error::DependencyCycle(extract_cycle(plugins, deps_idx, &in_degree)));
	}
	Ok(load_order)
}

/// Walk unresolved dependency edges from any leftover node until a node
/// repeats; the repeated segment is a cycle, named in edge order
fn extract_cycle(
	plugins: &[PluginDescriptor],
	deps_idx: &[Vec<usize>],
	in_degree: &[usize],
) -> Vec<Box<str>> {
	let start = (0..plugins.len()).find(|&i| in_degree[i] > 0).unwrap_or(0);
	let mut path: Vec<usize> = Vec::new();
	let mut pos: HashMap<usize, usize> = HashMap::new();
	let mut current = start;
	loop {
		if let Some(&at) = pos.get(&current) {
			return path[at..].iter().map(|&i| plugins[i].name.clone()).collect();
		}
		pos.insert(current, path.len());
		path.push(current);
		// A leftover node always has a leftover dependency to follow
		if let Some(&d) = deps_idx[current].iter().find(|&&d| in_degree[d] > 0) {
			current = d;
		}
	}
}

/// Immutable registry shared by every guild of a host
#[derive(Debug)]
pub struct FrozenPluginRegistry {
	plugins: Box<[PluginDescriptor]>,
	index: HashMap<Box<str>, usize>,
	load_order: Box<[usize]>,
}

impl FrozenPluginRegistry {
	/// Get a plugin descriptor by name
	pub fn get(&self, name: &str) -> Option<&PluginDescriptor> {
		self.index.get(name).map(|&i| &self.plugins[i])
	}

	pub fn contains(&self, name: &str) -> bool {
		self.index.contains_key(name)
	}

	/// Descriptors in dependency-respecting load order
	pub fn load_order(&self) -> impl Iterator<Item = &PluginDescriptor> {
		self.load_order.iter().map(|&i| &self.plugins[i])
	}

	pub fn load_order_names(&self) -> Vec<&str> {
		self.load_order.iter().map(|&i| &*self.plugins[i].name).collect()
	}

	pub fn plugins(&self) -> &[PluginDescriptor] {
		&self.plugins
	}

	pub fn len(&self) -> usize {
		self.plugins.len()
	}

	pub fn is_empty(&self) -> bool {
		self.plugins.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn plain(name: &str) -> PluginDescriptor {
		PluginDescriptor::builder(name).build().unwrap()
	}

	fn with_deps(name: &str, deps: &[&str]) -> PluginDescriptor {
		PluginDescriptor::builder(name).dependencies(deps.iter().copied()).build().unwrap()
	}

	#[test]
	fn test_duplicate_registration_rejected() {
		let mut registry = PluginRegistry::new();
		registry.register(plain("cases")).unwrap();
		let err = registry.register(plain("cases")).unwrap_err();
		assert!(matches!(err, Error::PluginAlreadyRegistered(name) if &*name == "cases"));
	}

	#[test]
	fn test_chain_loads_dependencies_first() {
		let mut registry = PluginRegistry::new();
		registry.register(with_deps("a", &["b"])).unwrap();
		registry.register(with_deps("b", &["c"])).unwrap();
		registry.register(plain("c")).unwrap();
		let frozen = registry.freeze().unwrap();
		assert_eq!(frozen.load_order_names(), vec!["c", "b", "a"]);
	}

	#[test]
	fn test_independent_plugins_keep_registration_order() {
		let mut registry = PluginRegistry::new();
		registry.register(plain("utility")).unwrap();
		registry.register(plain("cases")).unwrap();
		registry.register(plain("logs")).unwrap();
		let frozen = registry.freeze().unwrap();
		assert_eq!(frozen.load_order_names(), vec!["utility", "cases", "logs"]);
	}

	#[test]
	fn test_tie_break_is_registration_order() {
		// Both "x" and "y" become loadable once "base" is in; "y" was
		// registered first so it must come first
		let mut registry = PluginRegistry::new();
		registry.register(with_deps("y", &["base"])).unwrap();
		registry.register(with_deps("x", &["base"])).unwrap();
		registry.register(plain("base")).unwrap();
		let frozen = registry.freeze().unwrap();
		assert_eq!(frozen.load_order_names(), vec!["base", "y", "x"]);
	}

	#[test]
	fn test_unknown_dependency_named() {
		let mut registry = PluginRegistry::new();
		registry.register(with_deps("context_menu", &["caases"])).unwrap();
		let err = registry.freeze().unwrap_err();
		let Error::UnknownDependency { plugin, dependency } = err else { panic!("wrong error") };
		assert_eq!(&*plugin, "context_menu");
		assert_eq!(&*dependency, "caases");
	}

	#[test]
	fn test_two_cycle_names_both_members() {
		let mut registry = PluginRegistry::new();
		registry.register(with_deps("a", &["b"])).unwrap();
		registry.register(with_deps("b", &["a"])).unwrap();
		let err = registry.freeze().unwrap_err();
		let Error::DependencyCycle(members) = err else { panic!("wrong error") };
		let mut names: Vec<&str> = members.iter().map(|m| &**m).collect();
		names.sort_unstable();
		assert_eq!(names, vec!["a", "b"]);
	}

	#[test]
	fn test_self_cycle_names_itself() {
		let mut registry = PluginRegistry::new();
		registry.register(with_deps("a", &["a"])).unwrap();
		let err = registry.freeze().unwrap_err();
		let Error::DependencyCycle(members) = err else { panic!("wrong error") };
		assert_eq!(members.len(), 1);
		assert_eq!(&*members[0], "a");
	}

	#[test]
	fn test_cycle_excludes_innocent_plugins() {
		let mut registry = PluginRegistry::new();
		registry.register(plain("standalone")).unwrap();
		registry.register(with_deps("a", &["b"])).unwrap();
		registry.register(with_deps("b", &["a"])).unwrap();
		let err = registry.freeze().unwrap_err();
		let Error::DependencyCycle(members) = err else { panic!("wrong error") };
		assert!(!members.iter().any(|m| &**m == "standalone"));
	}

	#[test]
	fn test_builder_validates_base_config() {
		let schema = ConfigSchema::builder().bool("can_use", false).build().unwrap();
		let err = PluginDescriptor::builder("mod_menu")
			.schema(schema)
			.config(json!({"can_use": "yes"}))
			.build()
			.unwrap_err();
		let Error::ConfigValidation(issues) = err else { panic!("wrong error") };
		assert_eq!(&*issues[0].path, "config.can_use");
	}

	#[test]
	fn test_builder_validates_override_patches() {
		let schema = ConfigSchema::builder().bool("can_use", false).build().unwrap();
		let err = PluginDescriptor::builder("mod_menu")
			.schema(schema)
			.override_rule(
				OverrideRule::builder().level(">=50").config(json!({"can_uze": true})).build().unwrap(),
			)
			.build()
			.unwrap_err();
		let Error::ConfigValidation(issues) = err else { panic!("wrong error") };
		assert_eq!(&*issues[0].path, "overrides[0].config.can_uze");
	}

	#[test]
	fn test_builder_rejects_empty_name() {
		assert!(PluginDescriptor::builder("  ").build().is_err());
	}

	#[test]
	fn test_duplicate_dependency_declared_once() {
		let desc = PluginDescriptor::builder("context_menu")
			.dependency("cases")
			.dependency("cases")
			.build()
			.unwrap();
		assert_eq!(desc.dependencies().len(), 1);
	}
}

// vim: ts=4
