//! Config schemas and validation
//!
//! Every plugin declares a schema for its config shape. Validation reports
//! every violation at once, keyed by dotted path, instead of stopping at the
//! first offending key.

use serde_json::{Map, Value};

use crate::prelude::*;

/// Kind of value a config key accepts
#[derive(Debug, Clone)]
pub enum ConfigKind {
	Bool,
	Int,
	Str,
	/// Homogeneous list; elements are checked with indexed paths ("roles[2]")
	List(Box<ConfigKind>),
	/// Nested section with its own schema; validated recursively
	Map(Box<ConfigSchema>),
	/// Opaque JSON, accepted as-is
	Json,
}

impl ConfigKind {
	/// Kind name used in validation issues
	pub fn name(&self) -> &'static str {
		match self {
			ConfigKind::Bool => "bool",
			ConfigKind::Int => "int",
			ConfigKind::Str => "string",
			ConfigKind::List(_) => "list",
			ConfigKind::Map(_) => "map",
			ConfigKind::Json => "json",
		}
	}
}

/// Kind name of a JSON value for error messages
pub fn kind_of(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(n) if n.is_i64() => "int",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "list",
		Value::Object(_) => "map",
	}
}

/// One declared config key
#[derive(Debug, Clone)]
pub struct SchemaField {
	pub name: Box<str>,
	pub kind: ConfigKind,
	/// Nullable keys accept `null` in addition to their kind
	pub nullable: bool,
	/// Filled in for keys absent from the validated config
	pub default: Value,
}

/// Declared shape of a plugin's config.
///
/// Field order is kept as declared; defaults and validation both walk it
/// in that order so issue lists are stable.
#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
	fields: Vec<SchemaField>,
}

impl ConfigSchema {
	/// Create a builder for constructing a ConfigSchema
	pub fn builder() -> ConfigSchemaBuilder {
		ConfigSchemaBuilder::new()
	}

	pub fn fields(&self) -> &[SchemaField] {
		&self.fields
	}

	fn field(&self, name: &str) -> Option<&SchemaField> {
		self.fields.iter().find(|f| &*f.name == name)
	}

	/// Config object with every key at its default value
	pub fn defaults(&self) -> Value {
		let mut map = Map::new();
		for field in &self.fields {
			map.insert(field.name.to_string(), field.default.clone());
		}
		Value::Object(map)
	}

	/// Validate a complete config against this schema.
	///
	/// Absent keys are filled with their defaults. Unknown keys and kind
	/// mismatches are collected into a single [`Error::ConfigValidation`]
	/// carrying every offending path.
	pub fn validate(&self, config: &Value) -> PbResult<Value> {
		let mut issues = Vec::new();
		let filled = self.fill(config, "", &mut issues);
		if issues.is_empty() {
			Ok(filled)
		} else {
			Err(Error::ConfigValidation(issues))
		}
	}

	/// Validate a partial config against this schema.
	///
	/// Only the keys present are checked; absent keys are not filled.
	/// Unknown keys are still rejected so typos surface at registration
	/// instead of silently never matching.
	pub fn validate_partial(&self, config: &Value) -> PbResult<()> {
		let mut issues = Vec::new();
		self.check_subset(config, "", &mut issues);
		if issues.is_empty() {
			Ok(())
		} else {
			Err(Error::ConfigValidation(issues))
		}
	}

	fn fill(&self, config: &Value, prefix: &str, issues: &mut Vec<ConfigIssue>) -> Value {
		let Some(obj) = config.as_object() else {
			issues.push(ConfigIssue::new(root_path(prefix), "map", kind_of(config)));
			return self.defaults();
		};

		let mut out = Map::new();
		for field in &self.fields {
			let path = join_path(prefix, &field.name);
			match obj.get(&*field.name) {
				None => {
					out.insert(field.name.to_string(), field.default.clone());
				}
				Some(value) => {
					out.insert(
						field.name.to_string(),
						fill_value(field, value, &path, issues),
					);
				}
			}
		}
		for (key, value) in obj {
			if self.field(key).is_none() {
				issues.push(ConfigIssue::unknown_key(join_path(prefix, key), kind_of(value)));
			}
		}
		Value::Object(out)
	}

	fn check_subset(&self, config: &Value, prefix: &str, issues: &mut Vec<ConfigIssue>) {
		let Some(obj) = config.as_object() else {
			issues.push(ConfigIssue::new(root_path(prefix), "map", kind_of(config)));
			return;
		};

		for (key, value) in obj {
			let path = join_path(prefix, key);
			match self.field(key) {
				None => issues.push(ConfigIssue::unknown_key(path, kind_of(value))),
				Some(field) => check_value(field, value, &path, issues),
			}
		}
	}
}

/// Full-mode check of one present key, recursing into sections with defaults
fn fill_value(field: &SchemaField, value: &Value, path: &str, issues: &mut Vec<ConfigIssue>) -> Value {
	if value.is_null() {
		if field.nullable || matches!(field.kind, ConfigKind::Json) {
			return Value::Null;
		}
		issues.push(ConfigIssue::new(path, field.kind.name(), "null"));
		return field.default.clone();
	}
	match &field.kind {
		ConfigKind::Bool if value.is_boolean() => value.clone(),
		ConfigKind::Int if value.as_i64().is_some() => value.clone(),
		ConfigKind::Str if value.is_string() => value.clone(),
		ConfigKind::List(elem) => {
			let Some(items) = value.as_array() else {
				issues.push(ConfigIssue::new(path, "list", kind_of(value)));
				return field.default.clone();
			};
			check_elements(elem, items, path, issues);
			value.clone()
		}
		ConfigKind::Map(schema) => {
			if value.is_object() {
				schema.fill(value, path, issues)
			} else {
				issues.push(ConfigIssue::new(path, "map", kind_of(value)));
				field.default.clone()
			}
		}
		ConfigKind::Json => value.clone(),
		kind => {
			issues.push(ConfigIssue::new(path, kind.name(), kind_of(value)));
			field.default.clone()
		}
	}
}

/// Partial-mode check of one present key.
///
/// Lists are still checked in full: an array in a partial replaces the base
/// array entirely, so its elements are the final content.
fn check_value(field: &SchemaField, value: &Value, path: &str, issues: &mut Vec<ConfigIssue>) {
	if value.is_null() {
		if !field.nullable && !matches!(field.kind, ConfigKind::Json) {
			issues.push(ConfigIssue::new(path, field.kind.name(), "null"));
		}
		return;
	}
	match &field.kind {
		ConfigKind::Bool if value.is_boolean() => {}
		ConfigKind::Int if value.as_i64().is_some() => {}
		ConfigKind::Str if value.is_string() => {}
		ConfigKind::List(elem) => match value.as_array() {
			Some(items) => check_elements(elem, items, path, issues),
			None => issues.push(ConfigIssue::new(path, "list", kind_of(value))),
		},
		ConfigKind::Map(schema) => {
			if value.is_object() {
				schema.check_subset(value, path, issues);
			} else {
				issues.push(ConfigIssue::new(path, "map", kind_of(value)));
			}
		}
		ConfigKind::Json => {}
		kind => issues.push(ConfigIssue::new(path, kind.name(), kind_of(value))),
	}
}

fn check_elements(elem: &ConfigKind, items: &[Value], path: &str, issues: &mut Vec<ConfigIssue>) {
	for (idx, item) in items.iter().enumerate() {
		let elem_path = format!("{path}[{idx}]");
		let elem_field = SchemaField {
			name: "".into(),
			kind: elem.clone(),
			nullable: false,
			default: Value::Null,
		};
		check_value(&elem_field, item, &elem_path, issues);
	}
}

fn join_path(prefix: &str, name: &str) -> String {
	if prefix.is_empty() {
		name.to_string()
	} else {
		format!("{prefix}.{name}")
	}
}

fn root_path(prefix: &str) -> &str {
	if prefix.is_empty() {
		"<config>"
	} else {
		prefix
	}
}

/// Builder for ConfigSchema with fluent API
#[derive(Debug, Default)]
pub struct ConfigSchemaBuilder {
	fields: Vec<SchemaField>,
}

impl ConfigSchemaBuilder {
	pub fn new() -> Self {
		Self { fields: Vec::new() }
	}

	/// Add a field with an explicit kind, nullability, and default
	pub fn field(
		mut self,
		name: impl Into<Box<str>>,
		kind: ConfigKind,
		nullable: bool,
		default: Value,
	) -> Self {
		self.fields.push(SchemaField { name: name.into(), kind, nullable, default });
		self
	}

	/// Boolean key with a default
	pub fn bool(self, name: impl Into<Box<str>>, default: bool) -> Self {
		self.field(name, ConfigKind::Bool, false, Value::Bool(default))
	}

	/// Integer key with a default
	pub fn int(self, name: impl Into<Box<str>>, default: i64) -> Self {
		self.field(name, ConfigKind::Int, false, Value::from(default))
	}

	/// String key with a default
	pub fn str(self, name: impl Into<Box<str>>, default: impl Into<String>) -> Self {
		self.field(name, ConfigKind::Str, false, Value::String(default.into()))
	}

	/// Nullable string key defaulting to `null` (ids, channel references)
	pub fn str_opt(self, name: impl Into<Box<str>>) -> Self {
		self.field(name, ConfigKind::Str, true, Value::Null)
	}

	/// Nullable integer key defaulting to `null`
	pub fn int_opt(self, name: impl Into<Box<str>>) -> Self {
		self.field(name, ConfigKind::Int, true, Value::Null)
	}

	/// Homogeneous list key with a default
	pub fn list(self, name: impl Into<Box<str>>, elem: ConfigKind, default: Value) -> Self {
		self.field(name, ConfigKind::List(Box::new(elem)), false, default)
	}

	/// Nested section; its default is the sub-schema's defaults
	pub fn section(self, name: impl Into<Box<str>>, schema: ConfigSchema) -> Self {
		let default = schema.defaults();
		self.field(name, ConfigKind::Map(Box::new(schema)), false, default)
	}

	/// Opaque JSON key with a default
	pub fn json(self, name: impl Into<Box<str>>, default: Value) -> Self {
		self.field(name, ConfigKind::Json, false, default)
	}

	/// Build the schema, rejecting duplicate keys and defaults that do not
	/// match their declared kind
	pub fn build(self) -> PbResult<ConfigSchema> {
		let mut issues = Vec::new();
		for (idx, field) in self.fields.iter().enumerate() {
			if self.fields[..idx].iter().any(|f| f.name == field.name) {
				issues.push(ConfigIssue::new(&*field.name, "unique key", "duplicate"));
			}
			check_value(field, &field.default, &field.name, &mut issues);
		}
		if issues.is_empty() {
			Ok(ConfigSchema { fields: self.fields })
		} else {
			Err(Error::ConfigValidation(issues))
		}
	}
}


// vim: ts=4
