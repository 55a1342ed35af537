//! Type-erased per-plugin state map
//!
//! Lets a plugin attach its own state during init without coupling the
//! engine to plugin-specific types. Dependents read the state back through
//! typed handles after the owning plugin is ready.

use std::any::{Any, TypeId};
use std::collections::HashMap;

pub struct StateMap {
	map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for StateMap {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StateMap").field("entries", &self.map.len()).finish()
	}
}

impl Default for StateMap {
	fn default() -> Self {
		Self::new()
	}
}

impl StateMap {
	pub fn new() -> Self {
		Self { map: HashMap::new() }
	}

	pub fn insert<T: Send + Sync + 'static>(&mut self, val: T) {
		self.map.insert(TypeId::of::<T>(), Box::new(val));
	}

	pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
		self.map.get(&TypeId::of::<T>())?.downcast_ref::<T>()
	}

	pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
		self.map
			.remove(&TypeId::of::<T>())
			.and_then(|boxed| boxed.downcast::<T>().ok())
			.map(|boxed| *boxed)
	}

	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}
}


// vim: ts=4
