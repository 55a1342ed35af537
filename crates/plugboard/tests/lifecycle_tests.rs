mod common;

use rand::seq::SliceRandom;
use rand::RngExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use plugboard::case_adapter::CaseAdapter;
use plugboard::identity_adapter::Member;
use plugboard::lifecycle::PluginState;
use plugboard::overrides::EvalContext;
use plugboard::prelude::*;
use plugboard::registry::PluginDescriptor;
use plugboard::time_adapter::TimeStyle;

async fn moderation_host_with(log: &HookLog) -> Host {
	setup_test_logging();
	let mut builder = HostBuilder::new();
	for plugin in moderation_plugins(log) {
		builder.plugin(plugin).unwrap();
	}
	builder.build().await.unwrap()
}

fn pos(entries: &[String], needle: &str) -> usize {
	entries
		.iter()
		.position(|e| e == needle)
		.unwrap_or_else(|| panic!("'{needle}' missing from {entries:?}"))
}

#[tokio::test]
async fn test_activation_follows_dependency_order() {
	let log = new_log();
	let host = moderation_host_with(&log).await;
	host.activate_guild(GuildId(1)).await.unwrap();

	let entries = log.lock().clone();
	assert_eq!(entries.len(), 5);
	assert!(pos(&entries, "init:cases") < pos(&entries, "init:logs"));
	assert!(pos(&entries, "init:logs") < pos(&entries, "init:mutes"));
	assert!(pos(&entries, "init:mutes") < pos(&entries, "init:context_menu"));
	assert!(pos(&entries, "init:utility") < pos(&entries, "init:context_menu"));

	let runtime = host.guild(GuildId(1)).unwrap();
	assert_eq!(runtime.loaded_plugins().len(), 5);
	assert_eq!(runtime.plugin_state("mutes"), PluginState::Ready);
}

#[tokio::test]
async fn test_deactivation_reverses_init_order() {
	let log = new_log();
	let host = moderation_host_with(&log).await;
	host.activate_guild(GuildId(1)).await.unwrap();
	host.deactivate_guild(GuildId(1)).await.unwrap();
	assert!(!host.is_active(GuildId(1)));

	let entries = log.lock().clone();
	let inits: Vec<&str> = entries
		.iter()
		.filter_map(|e| e.strip_prefix("init:"))
		.collect();
	let teardowns: Vec<&str> = entries
		.iter()
		.filter_map(|e| e.strip_prefix("teardown:"))
		.collect();
	let reversed: Vec<&str> = inits.iter().rev().copied().collect();
	assert_eq!(teardowns, reversed);
}

#[tokio::test]
async fn test_duplicate_plugin_rejected() {
	let log = new_log();
	let mut builder = HostBuilder::new();
	builder.plugin(recorder("cases", &[], &log).build().unwrap()).unwrap();
	let Err(err) = builder.plugin(recorder("cases", &[], &log).build().unwrap()) else {
		panic!("duplicate registration accepted");
	};
	assert!(matches!(err, Error::PluginAlreadyRegistered(ref name) if &**name == "cases"));
}

#[tokio::test]
async fn test_unknown_dependency_rejected_at_build() {
	let log = new_log();
	let mut builder = HostBuilder::new();
	builder.plugin(recorder("logs", &["nope"], &log).build().unwrap()).unwrap();
	let Err(err) = builder.build().await else { panic!("unknown dependency accepted") };
	let Error::UnknownDependency { plugin, dependency } = err else {
		panic!("wrong error: {err}")
	};
	assert_eq!(&*plugin, "logs");
	assert_eq!(&*dependency, "nope");
}

#[tokio::test]
async fn test_dependency_cycle_names_every_member() {
	let log = new_log();
	let mut builder = HostBuilder::new();
	builder.plugin(recorder("a", &["b"], &log).build().unwrap()).unwrap();
	builder.plugin(recorder("b", &["c"], &log).build().unwrap()).unwrap();
	builder.plugin(recorder("c", &["a"], &log).build().unwrap()).unwrap();
	let Err(err) = builder.build().await else { panic!("cycle accepted") };
	let Error::DependencyCycle(members) = err else { panic!("wrong error: {err}") };
	for name in ["a", "b", "c"] {
		assert!(members.iter().any(|m| &**m == name), "{name} missing from {members:?}");
	}
}

#[tokio::test]
async fn test_randomized_graphs_init_dependencies_first() {
	let mut rng = rand::rng();
	for _ in 0..20 {
		let n = 8;
		// Each plugin may depend on any earlier-numbered plugin, which keeps
		// the graph acyclic while still covering diamonds and fan-ins
		let deps: Vec<Vec<String>> = (0..n)
			.map(|i| {
				(0..i).filter(|_| rng.random_bool(0.4)).map(|j| format!("p{j}")).collect()
			})
			.collect();

		let log = new_log();
		let mut descriptors: Vec<PluginDescriptor> = deps
			.iter()
			.enumerate()
			.map(|(i, mine)| {
				let refs: Vec<&str> = mine.iter().map(String::as_str).collect();
				recorder(&format!("p{i}"), &refs, &log).build().unwrap()
			})
			.collect();
		descriptors.shuffle(&mut rng);

		let mut builder = HostBuilder::new();
		for descriptor in descriptors {
			builder.plugin(descriptor).unwrap();
		}
		let host = builder.build().await.unwrap();
		host.activate_guild(GuildId(1)).await.unwrap();

		let entries = log.lock().clone();
		for (i, mine) in deps.iter().enumerate() {
			let me = pos(&entries, &format!("init:p{i}"));
			for dep in mine {
				assert!(
					pos(&entries, &format!("init:{dep}")) < me,
					"p{i} initialized before its dependency {dep}: {entries:?}"
				);
			}
		}
	}
}

#[tokio::test]
async fn test_failed_init_rolls_back_completed_plugins() {
	let log = new_log();
	let mut builder = HostBuilder::new();
	builder.plugin(recorder("cases", &[], &log).build().unwrap()).unwrap();
	builder.plugin(recorder("logs", &["cases"], &log).build().unwrap()).unwrap();
	// Fails for guild 1 only; other guilds are untouched by the failure
	let flaky = recorder("mutes", &["cases", "logs"], &log)
		.on_init(|ctx| async move {
			if ctx.guild_id() == GuildId(1) {
				Err(Error::Internal("mute store offline".to_string()))
			} else {
				Ok(())
			}
		})
		.build()
		.unwrap();
	builder.plugin(flaky).unwrap();
	let host = builder.build().await.unwrap();

	let err = host.activate_guild(GuildId(1)).await.unwrap_err();
	let Error::InitFailed { guild, plugin, reason } = err else {
		panic!("wrong error: {err}")
	};
	assert_eq!(guild, GuildId(1));
	assert_eq!(&*plugin, "mutes");
	assert!(reason.contains("mute store offline"));
	assert!(!host.is_active(GuildId(1)));

	// Everything that initialized was torn down again, in reverse order
	let entries = log.lock().clone();
	let inits: Vec<&str> = entries.iter().filter_map(|e| e.strip_prefix("init:")).collect();
	let teardowns: Vec<&str> =
		entries.iter().filter_map(|e| e.strip_prefix("teardown:")).collect();
	let reversed: Vec<&str> = inits.iter().rev().copied().collect();
	assert_eq!(teardowns, reversed);

	host.activate_guild(GuildId(2)).await.unwrap();
	assert!(host.is_active(GuildId(2)));
	assert_eq!(host.active_guilds(), vec![GuildId(2)]);
}

#[tokio::test]
async fn test_init_timeout_bounds_hung_hooks() {
	let log = new_log();
	let mut builder = HostBuilder::new();
	builder.hook_timeout(Duration::from_millis(20));
	let hung = recorder("cases", &[], &log)
		.on_init(|_ctx| async move {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(())
		})
		.build()
		.unwrap();
	builder.plugin(hung).unwrap();
	let host = builder.build().await.unwrap();

	let err = host.activate_guild(GuildId(1)).await.unwrap_err();
	let Error::InitTimeout { plugin, timeout_ms, .. } = err else {
		panic!("wrong error: {err}")
	};
	assert_eq!(&*plugin, "cases");
	assert_eq!(timeout_ms, 20);
	assert!(!host.is_active(GuildId(1)));
}

#[tokio::test]
async fn test_double_activation_rejected() {
	let log = new_log();
	let host = moderation_host_with(&log).await;
	host.activate_guild(GuildId(1)).await.unwrap();

	let err = host.activate_guild(GuildId(1)).await.unwrap_err();
	assert!(matches!(err, Error::GuildAlreadyActive(GuildId(1))));
	// The rejected attempt must not have re-run any hook
	assert_eq!(log.lock().len(), 5);

	host.deactivate_guild(GuildId(1)).await.unwrap();
	host.activate_guild(GuildId(1)).await.unwrap();
	assert_eq!(log.lock().iter().filter(|e| e.starts_with("init:")).count(), 10);
}

#[tokio::test]
async fn test_disabled_plugin_skipped_dependencies_forced() {
	let log = new_log();
	let host = moderation_host_with(&log).await;

	// context_menu has no dependents, disabling it actually unloads it
	let doc = json!({"plugins": {"context_menu": {"enabled": false}}});
	host.activate_guild_with_config(GuildId(1), doc).await.unwrap();
	let runtime = host.guild(GuildId(1)).unwrap();
	assert_eq!(runtime.loaded_plugins().len(), 4);
	assert_eq!(runtime.plugin_state("context_menu"), PluginState::Unloaded);

	// Unloaded but registered: no handle, but resolution still answers
	let err = host.handle(GuildId(1), "context_menu").unwrap_err();
	assert!(matches!(err, Error::NotFound));
	let resolved = host.resolve(GuildId(1), "context_menu", &EvalContext::new()).unwrap();
	assert_eq!(resolved["can_use"], json!(false));

	// cases is depended on by logs and mutes, disabling it cannot unload it
	let doc = json!({"plugins": {"cases": {"enabled": false}}});
	host.activate_guild_with_config(GuildId(2), doc).await.unwrap();
	let runtime = host.guild(GuildId(2)).unwrap();
	assert_eq!(runtime.plugin_state("cases"), PluginState::Ready);
	assert!(runtime.loaded_plugins().iter().any(|p| &**p == "cases"));
}

#[tokio::test]
async fn test_case_filer_shared_through_dependency_handle() {
	setup_test_logging();
	let adapter = Arc::new(MemCaseAdapter::new());
	let consumer = PluginDescriptor::builder("logs")
		.dependency("cases")
		.on_init(|ctx| async move {
			let filer = ctx.dependency("cases")?.expect::<CaseFiler>("case filer")?;
			let case = filer.warn(UserId(5), UserId(9), "spam").await?;
			ctx.attach(case.case_number);
			Ok(())
		})
		.build()
		.unwrap();

	let mut builder = HostBuilder::new();
	builder.case_adapter(adapter.clone());
	builder.plugin(cases_service()).unwrap();
	builder.plugin(consumer).unwrap();
	let host = builder.build().await.unwrap();

	host.activate_guild(GuildId(1)).await.unwrap();
	host.activate_guild(GuildId(2)).await.unwrap();

	// Numbering is per guild, both see case #1
	assert_eq!(host.handle(GuildId(1), "logs").unwrap().get::<i64>(), Some(1));
	assert_eq!(host.handle(GuildId(2), "logs").unwrap().get::<i64>(), Some(1));
	assert_eq!(adapter.case_count(), 2);

	let case = adapter.read_case(GuildId(1), 1).await.unwrap();
	assert_eq!(case.user_id, UserId(5));
	assert_eq!(case.reason.as_deref(), Some("spam"));
}

#[tokio::test]
async fn test_identity_and_time_adapters_reach_hooks() {
	let identity = Arc::new(MemIdentityAdapter::new());
	identity.add_member(Member {
		user_id: UserId(5),
		guild_id: GuildId(1),
		nickname: None,
		roles: Box::new([RoleId(77)]),
		joined_at: Some(Timestamp(1_700_000_000)),
	});

	let probe = PluginDescriptor::builder("probe")
		.on_init(|ctx| async move {
			let member = ctx.identity_adapter()?.resolve_member(ctx.guild_id(), UserId(5)).await?;
			let joined = member.joined_at.unwrap_or(Timestamp(0));
			let line = ctx.time_adapter()?.format(ctx.guild_id(), joined, TimeStyle::DateTime).await?;
			ctx.attach(line);
			Ok(())
		})
		.build()
		.unwrap();

	let mut builder = HostBuilder::new();
	builder.identity_adapter(identity);
	builder.time_adapter(Arc::new(FixedTimeAdapter::utc()));
	builder.plugin(probe).unwrap();
	let host = builder.build().await.unwrap();
	host.activate_guild(GuildId(1)).await.unwrap();

	let line = host.handle(GuildId(1), "probe").unwrap().get::<String>();
	assert_eq!(line.as_deref(), Some("2023-11-14 22:13"));
}

#[tokio::test]
async fn test_on_init_callback_preactivates_guilds() {
	let log = new_log();
	let mut builder = HostBuilder::new();
	for plugin in moderation_plugins(&log) {
		builder.plugin(plugin).unwrap();
	}
	builder.on_init(|host| async move { host.activate_guild(GuildId(42)).await });
	let host = builder.build().await.unwrap();

	assert!(host.is_active(GuildId(42)));
	assert_eq!(log.lock().len(), 5);
}

#[tokio::test]
async fn test_active_guilds_listed_in_order() {
	let log = new_log();
	let host = moderation_host_with(&log).await;
	for id in [30, 10, 20] {
		host.activate_guild(GuildId(id)).await.unwrap();
	}
	assert_eq!(host.active_guilds(), vec![GuildId(10), GuildId(20), GuildId(30)]);

	host.deactivate_guild(GuildId(20)).await.unwrap();
	assert_eq!(host.active_guilds(), vec![GuildId(10), GuildId(30)]);
}

// vim: ts=4
