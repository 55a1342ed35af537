#![allow(unused)]

use async_trait::async_trait;
use sqlx::{
	sqlite::{self, SqlitePool, SqliteRow},
	Row,
};
use std::path::Path;

use plugboard::{
	case_adapter::{Case, CaseAdapter, CaseKind, CasePatch, CreateCaseData},
	prelude::*,
	types::Patch,
};

fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

/// SQLite-backed [`CaseAdapter`].
///
/// Case numbers are assigned per guild inside a transaction, so concurrent
/// creates never hand out the same number even across pool connections.
#[derive(Debug)]
pub struct CaseAdapterSqlite {
	db: SqlitePool,
}

impl CaseAdapterSqlite {
	pub async fn new(path: impl AsRef<Path>) -> PbResult<Self> {
		if let Some(dir) = path.as_ref().parent().filter(|d| !d.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(dir).await?;
		}
		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path.as_ref())
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		init_db(&db).await.inspect_err(inspect).or(Err(Error::DbError))?;

		Ok(Self { db })
	}
}

#[async_trait]
impl CaseAdapter for CaseAdapterSqlite {
	async fn create_case(&self, data: &CreateCaseData<'_>) -> PbResult<Case> {
		let created_at = Timestamp::now();
		let mut tx = self.db.begin().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

		let row = sqlx::query(
			"SELECT coalesce(max(case_number), 0) + 1 AS next FROM cases WHERE guild_id=?1",
		)
		.bind(data.guild_id.0 as i64)
		.fetch_one(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;
		let case_number: i64 = row.try_get("next").or(Err(Error::DbError))?;

		let row = sqlx::query(
			"INSERT INTO cases (guild_id, case_number, user_id, mod_id, kind, reason, is_hidden, created_at)
			VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) RETURNING case_id",
		)
		.bind(data.guild_id.0 as i64)
		.bind(case_number)
		.bind(data.user_id.0 as i64)
		.bind(data.mod_id.map(|id| id.0 as i64))
		.bind(data.kind.code())
		.bind(data.reason)
		.bind(data.is_hidden)
		.bind(created_at.0)
		.fetch_one(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;
		let case_id: i64 = row.try_get("case_id").or(Err(Error::DbError))?;

		tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

		Ok(Case {
			case_id,
			guild_id: data.guild_id,
			case_number,
			user_id: data.user_id,
			mod_id: data.mod_id,
			kind: data.kind,
			reason: data.reason.map(Into::into),
			is_hidden: data.is_hidden,
			created_at,
			log_message_id: None,
		})
	}

	async fn read_case(&self, guild_id: GuildId, case_number: i64) -> PbResult<Case> {
		let res = sqlx::query(
			"SELECT case_id, guild_id, case_number, user_id, mod_id, kind, reason, is_hidden, created_at, log_message_id
			FROM cases WHERE guild_id=?1 AND case_number=?2",
		)
		.bind(guild_id.0 as i64)
		.bind(case_number)
		.fetch_one(&self.db)
		.await;

		match res {
			Err(sqlx::Error::RowNotFound) => Err(Error::NotFound),
			Err(err) => {
				inspect(&err);
				Err(Error::DbError)
			}
			Ok(row) => row_to_case(&row),
		}
	}

	async fn list_cases_by_user(&self, guild_id: GuildId, user_id: UserId) -> PbResult<Vec<Case>> {
		let rows = sqlx::query(
			"SELECT case_id, guild_id, case_number, user_id, mod_id, kind, reason, is_hidden, created_at, log_message_id
			FROM cases WHERE guild_id=?1 AND user_id=?2 ORDER BY case_number",
		)
		.bind(guild_id.0 as i64)
		.bind(user_id.0 as i64)
		.fetch_all(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		rows.iter().map(row_to_case).collect()
	}

	async fn update_case(
		&self,
		guild_id: GuildId,
		case_number: i64,
		patch: &CasePatch,
	) -> PbResult<Case> {
		let mut query = sqlx::QueryBuilder::new("UPDATE cases SET ");
		let mut has_fields = false;

		match &patch.log_message_id {
			Patch::Value(id) => {
				query.push("log_message_id=").push_bind(id.as_ref());
				has_fields = true;
			}
			Patch::Null => {
				query.push("log_message_id=NULL");
				has_fields = true;
			}
			Patch::Undefined => {}
		}
		match patch.is_hidden {
			Patch::Value(hidden) => {
				if has_fields {
					query.push(", ");
				}
				query.push("is_hidden=").push_bind(hidden);
				has_fields = true;
			}
			Patch::Null => {
				// is_hidden is NOT NULL, clearing means visible again
				if has_fields {
					query.push(", ");
				}
				query.push("is_hidden=0");
				has_fields = true;
			}
			Patch::Undefined => {}
		}

		if has_fields {
			query.push(" WHERE guild_id=").push_bind(guild_id.0 as i64);
			query.push(" AND case_number=").push_bind(case_number);
			let res = query
				.build()
				.execute(&self.db)
				.await
				.inspect_err(inspect)
				.map_err(|_| Error::DbError)?;
			if res.rows_affected() == 0 {
				return Err(Error::NotFound);
			}
		}

		self.read_case(guild_id, case_number).await
	}
}

fn row_to_case(row: &SqliteRow) -> PbResult<Case> {
	let kind: i64 = row.try_get("kind").or(Err(Error::DbError))?;
	Ok(Case {
		case_id: row.try_get("case_id").or(Err(Error::DbError))?,
		guild_id: GuildId(row.try_get::<i64, _>("guild_id").or(Err(Error::DbError))? as u64),
		case_number: row.try_get("case_number").or(Err(Error::DbError))?,
		user_id: UserId(row.try_get::<i64, _>("user_id").or(Err(Error::DbError))? as u64),
		mod_id: row
			.try_get::<Option<i64>, _>("mod_id")
			.or(Err(Error::DbError))?
			.map(|id| UserId(id as u64)),
		kind: CaseKind::from_code(kind).ok_or(Error::DbError)?,
		reason: row.try_get("reason").or(Err(Error::DbError))?,
		is_hidden: row.try_get("is_hidden").or(Err(Error::DbError))?,
		created_at: Timestamp(row.try_get("created_at").or(Err(Error::DbError))?),
		log_message_id: row.try_get("log_message_id").or(Err(Error::DbError))?,
	})
}

async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	sqlx::query("CREATE TABLE IF NOT EXISTS cases (
		case_id integer NOT NULL,
		guild_id integer NOT NULL,
		case_number integer NOT NULL,
		user_id integer NOT NULL,
		mod_id integer,
		kind integer NOT NULL,			-- numeric CaseKind code
		reason text,
		is_hidden boolean NOT NULL DEFAULT 0,
		created_at datetime DEFAULT (unixepoch()),
		log_message_id text,			-- 'channel_id-message_id'
		PRIMARY KEY(case_id)
	)").execute(&mut *tx).await?;
	sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_cases_guild_number ON cases(guild_id, case_number)")
		.execute(&mut *tx).await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_cases_guild_user ON cases(guild_id, user_id)")
		.execute(&mut *tx).await?;

	tx.commit().await?;

	Ok(())
}

// vim: ts=4
