//! Connection pools, embedded migrations, and first-run database setup.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::{debug, info};

use crate::config::DbConfig;

/// Schema and catalog seed, embedded from `crates/stride-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables owned by stride, in the order `stride db-init` reports them.
pub const STRIDE_TABLES: [&str; 3] = ["selected_workouts", "users", "workouts"];

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(url)
        .await
        .with_context(|| format!("failed to connect to database at {url}"))
}

/// Open the pool shared by the CLI commands and the HTTP server.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    connect(&config.database_url, MAX_CONNECTIONS).await
}

/// Apply pending migrations. After this the workout catalog is seeded and
/// plans can be generated.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to migrate the stride schema")?;

    info!(migrations = MIGRATOR.iter().count(), "schema up to date");
    Ok(())
}

/// Whether `name` can be spliced into `CREATE DATABASE` unquoted.
fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Create the configured database through the `postgres` maintenance
/// database unless it is already there.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<()> {
    let Some(db_name) = config.database_name() else {
        bail!("no database name in {}", config.database_url);
    };
    if !is_plain_identifier(db_name) {
        bail!("database name {db_name:?} must be ASCII letters, digits, or underscores");
    }

    let admin = connect(&config.maintenance_url(), 1).await?;

    let present: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&admin)
            .await
            .context("failed to look up pg_database")?;

    let outcome = if present {
        debug!(db = db_name, "database already present");
        Ok(())
    } else {
        admin
            .execute(format!("CREATE DATABASE {db_name}").as_str())
            .await
            .map(|_| info!(db = db_name, "created database"))
            .with_context(|| format!("failed to create database {db_name}"))
    };

    admin.close().await;
    outcome
}

/// Row counts of the stride tables, for the `stride db-init` summary.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    let mut counts = Vec::with_capacity(STRIDE_TABLES.len());
    for table in STRIDE_TABLES {
        let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to count rows in {table}"))?;
        counts.push((table.to_owned(), rows));
    }
    Ok(counts)
}
