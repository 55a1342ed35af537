//! Plugin fixtures shared across integration tests
//!
//! The moderation set mirrors a realistic bot layout: a `cases` store at the
//! bottom, `logs` and `mutes` built on it, a standalone `utility`, and a
//! `context_menu` that pulls all of them together behind a level gate.

use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

use plugboard::case_adapter::{Case, CaseAdapter, CaseKind, CreateCaseData};
use plugboard::error::PbResult;
use plugboard::overrides::OverrideRule;
use plugboard::registry::{PluginDescriptor, PluginDescriptorBuilder};
use plugboard::schema::ConfigSchema;
use plugboard::types::{GuildId, UserId};

/// Ordered record of hook invocations across a whole test
pub type HookLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> HookLog {
	Arc::new(Mutex::new(Vec::new()))
}

/// Builder for a plugin whose hooks append "init:{name}" / "teardown:{name}"
/// to the log. Returned unbuilt so tests can attach schemas or rules first.
pub fn recorder(name: &str, deps: &[&str], log: &HookLog) -> PluginDescriptorBuilder {
	let init_log = log.clone();
	let teardown_log = log.clone();
	PluginDescriptor::builder(name)
		.dependencies(deps.iter().copied())
		.on_init(move |ctx| {
			let log = init_log.clone();
			async move {
				log.lock().push(format!("init:{}", ctx.plugin()));
				Ok(())
			}
		})
		.on_teardown(move |ctx| {
			let log = teardown_log.clone();
			async move {
				log.lock().push(format!("teardown:{}", ctx.plugin()));
				Ok(())
			}
		})
}

/// Permission shape shared by the moderation plugins
pub fn moderation_schema() -> ConfigSchema {
	ConfigSchema::builder()
		.bool("can_use", false)
		.bool("can_open_mod_menu", false)
		.str_opt("log_channel")
		.build()
		.unwrap()
}

/// Declared rule opening the context menu to moderators (level 50 and up)
pub fn context_menu_gate() -> OverrideRule {
	OverrideRule::builder()
		.level(">=50")
		.config(json!({"can_use": true, "can_open_mod_menu": true}))
		.build()
		.unwrap()
}

/// The five-plugin moderation graph used by most integration tests
pub fn moderation_plugins(log: &HookLog) -> Vec<PluginDescriptor> {
	vec![
		recorder("cases", &[], log).schema(moderation_schema()).build().unwrap(),
		recorder("logs", &["cases"], log).schema(moderation_schema()).build().unwrap(),
		recorder("mutes", &["cases", "logs"], log).schema(moderation_schema()).build().unwrap(),
		recorder("utility", &[], log).schema(moderation_schema()).build().unwrap(),
		recorder("context_menu", &["cases", "mutes", "logs", "utility"], log)
			.schema(moderation_schema())
			.override_rule(context_menu_gate())
			.build()
			.unwrap(),
	]
}

/// Handle the `cases` plugin attaches; dependents fetch it to file cases
#[derive(Debug, Clone)]
pub struct CaseFiler {
	guild_id: GuildId,
	adapter: Arc<dyn CaseAdapter>,
}

impl CaseFiler {
	pub async fn warn(&self, user_id: UserId, mod_id: UserId, reason: &str) -> PbResult<Case> {
		self.adapter
			.create_case(&CreateCaseData {
				guild_id: self.guild_id,
				user_id,
				mod_id: Some(mod_id),
				kind: CaseKind::Warn,
				reason: Some(reason),
				is_hidden: false,
			})
			.await
	}
}

/// A `cases` plugin with real init behavior: wires the case adapter from the
/// host environment and attaches a [`CaseFiler`] for dependents
pub fn cases_service() -> PluginDescriptor {
	PluginDescriptor::builder("cases")
		.schema(moderation_schema())
		.on_init(|ctx| async move {
			let adapter = ctx.case_adapter()?;
			ctx.attach(CaseFiler { guild_id: ctx.guild_id(), adapter });
			Ok(())
		})
		.build()
		.unwrap()
}

// vim: ts=4
