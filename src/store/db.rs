use anyhow::Result;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool, Row,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

use crate::util::env::env_flag;

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut connect_options = PgConnectOptions::from_str(database_url)?;

        if database_url.contains("sslmode=require") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        // PgBouncer txn mode safe unless prepared statements are explicitly requested
        if !env_flag("USE_PREPARED", false) {
            connect_options = connect_options.statement_cache_capacity(0);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");

        // Opt-in: seeding must also run against databases migrated out-of-band.
        if env_flag("AUTO_MIGRATE", false) {
            info!("running migrations (AUTO_MIGRATE=on)");
            Self::run_migrations(&pool).await?;
        } else {
            info!("AUTO_MIGRATE disabled; skipping migrations");
        }
        Ok(Self { pool })
    }
}

impl Db {
    // Lightweight migration runner: applies ./migrations/NNNN_name.sql files in
    // version order, tracked in _sqlx_migrations. Non-numeric filenames are ignored.
    async fn run_migrations(pool: &PgPool) -> Result<()> {
        use std::{collections::HashSet, fs, path::Path};
        let dir = Path::new("./migrations");
        if !dir.exists() {
            return Ok(());
        }
        // raw_sql keeps statements unprepared so PgBouncer transaction mode stays happy
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _sqlx_migrations (
                version BIGINT PRIMARY KEY,
                description TEXT,
                installed_at TIMESTAMPTZ DEFAULT now()
             )",
        )
        .execute(pool)
        .await?;

        let applied_rows = sqlx::raw_sql("SELECT version FROM _sqlx_migrations")
            .fetch_all(pool)
            .await?;
        let mut applied: HashSet<i64> = HashSet::new();
        for r in applied_rows {
            applied.insert(r.try_get::<i64, _>(0)?);
        }

        let mut candidates: Vec<(i64, String, std::path::PathBuf)> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(fname) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if !fname.ends_with(".sql") {
                continue;
            }
            let digits: String = fname.chars().take_while(|c| c.is_ascii_digit()).collect();
            let Ok(version) = digits.parse::<i64>() else {
                continue;
            };
            let desc = fname[digits.len()..]
                .trim_start_matches('_')
                .trim_end_matches(".sql")
                .to_string();
            candidates.push((version, desc, path));
        }
        candidates.sort_by_key(|(v, _, _)| *v);

        for (version, desc, path) in candidates {
            if applied.contains(&version) {
                continue;
            }
            let sql = fs::read_to_string(&path)?;
            info!(version, file = ?path, "applying migration");
            sqlx::raw_sql(sql.trim()).execute(pool).await?;

            let desc_escaped = desc.replace('\'', "''");
            let stmt = format!(
                "INSERT INTO _sqlx_migrations(version, description) VALUES ({version}, '{desc_escaped}')"
            );
            sqlx::raw_sql(&stmt).execute(pool).await?;
            applied.insert(version);
        }
        Ok(())
    }
}
