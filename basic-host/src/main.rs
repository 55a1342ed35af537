#![allow(unused)]

use serde_json::json;
use std::{env, path, sync::Arc, time::Duration};

use plugboard::case_adapter::{Case, CaseAdapter, CaseKind, CreateCaseData};
use plugboard::overrides::EvalContext;
use plugboard::prelude::*;
use plugboard::registry::PluginDescriptor;
use plugboard::schema::ConfigSchema;
use plugboard_case_adapter_sqlite::CaseAdapterSqlite;

pub struct Config {
	pub db_dir: path::PathBuf,
}

/// Attached by the `cases` plugin; dependents and the host use it to file
/// and list moderation cases for one guild
#[derive(Debug, Clone)]
struct CaseStore {
	guild_id: GuildId,
	adapter: Arc<dyn CaseAdapter>,
}

impl CaseStore {
	async fn warn(&self, user: UserId, moderator: UserId, reason: &str) -> PbResult<Case> {
		self.adapter
			.create_case(&CreateCaseData {
				guild_id: self.guild_id,
				user_id: user,
				mod_id: Some(moderator),
				kind: CaseKind::Warn,
				reason: Some(reason),
				is_hidden: false,
			})
			.await
	}

	async fn history(&self, user: UserId) -> PbResult<Vec<Case>> {
		self.adapter.list_cases_by_user(self.guild_id, user).await
	}
}

fn moderation_schema() -> PbResult<ConfigSchema> {
	ConfigSchema::builder()
		.bool("can_use", false)
		.bool("can_open_mod_menu", false)
		.str_opt("log_channel")
		.build()
}

fn plugins() -> PbResult<Vec<PluginDescriptor>> {
	let cases = PluginDescriptor::builder("cases")
		.schema(moderation_schema()?)
		.on_init(|ctx| async move {
			let adapter = ctx.case_adapter()?;
			ctx.attach(CaseStore { guild_id: ctx.guild_id(), adapter });
			info!("cases ready for guild {}", ctx.guild_id());
			Ok(())
		})
		.build()?;

	let logs = PluginDescriptor::builder("logs")
		.schema(moderation_schema()?)
		.dependency("cases")
		.build()?;

	let mutes = PluginDescriptor::builder("mutes")
		.schema(moderation_schema()?)
		.dependencies(["cases", "logs"])
		.build()?;

	let utility = PluginDescriptor::builder("utility").schema(moderation_schema()?).build()?;

	let context_menu = PluginDescriptor::builder("context_menu")
		.schema(moderation_schema()?)
		.dependencies(["cases", "mutes", "logs", "utility"])
		.override_rule(
			plugboard::overrides::OverrideRule::builder()
				.level(">=50")
				.config(json!({"can_use": true, "can_open_mod_menu": true}))
				.build()?,
		)
		.build()?;

	Ok(vec![cases, logs, mutes, utility, context_menu])
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> PbResult<()> {
	let config = Config {
		db_dir: path::PathBuf::from(env::var("DB_DIR").unwrap_or("./data".to_string())),
	};

	let case_adapter = Arc::new(CaseAdapterSqlite::new(config.db_dir.join("cases.db")).await?);

	let mut builder = HostBuilder::new();
	builder.case_adapter(case_adapter);
	builder.hook_timeout(Duration::from_secs(10));
	for plugin in plugins()? {
		builder.plugin(plugin)?;
	}
	let host = builder.build().await?;

	let guild = GuildId(1);
	host.activate_guild_with_config(
		guild,
		json!({
			"levels": {
				"200000000000000001": 100,
				"300000000000000001": 50
			},
			"plugins": {
				"context_menu": {
					"config": {"log_channel": "400000000000000001"},
					"overrides": [
						{"level": ">=100", "config": {"log_channel": null}}
					]
				}
			}
		}),
	)
	.await?;

	for level in [0, 50, 100] {
		let resolved =
			host.resolve(guild, "context_menu", &EvalContext::new().with_level(level))?;
		info!("context_menu at level {}: {}", level, resolved);
	}

	let store = host.handle(guild, "cases")?.expect::<CaseStore>("case store")?;
	let case = store.warn(UserId(42), UserId(200000000000000001), "Spamming invite links").await?;
	info!("filed case #{} ({})", case.case_number, case.kind);
	let history = store.history(UserId(42)).await?;
	info!("user 42 now has {} case(s) on record", history.len());

	host.deactivate_guild(guild).await?;
	Ok(())
}

// vim: ts=4
