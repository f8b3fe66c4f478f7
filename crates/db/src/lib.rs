//! SQLite connection factory and the migration runner for module-contributed
//! DDL.

use std::str::FromStr;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use folio_kernel::settings::DatabaseSettings;
use folio_kernel::Migration;

const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS _folio_migrations (
    module     TEXT NOT NULL,
    id         TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (module, id)
)";

/// Open a pool against `settings.url` with foreign keys enforced.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&settings.url)
        .with_context(|| format!("invalid database url '{}'", settings.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    // Each in-memory connection is a separate database: pin it to one
    // connection that is never recycled.
    let in_memory = is_in_memory(&settings.url);
    let max_connections = if in_memory { 1 } else { settings.max_connections };

    let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
    if in_memory {
        pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to '{}'", settings.url))?;

    tracing::info!(
        target: "folio-db",
        url = %settings.url,
        max_connections,
        "database pool ready"
    );

    Ok(pool)
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Apply every migration not yet recorded; returns how many ran.
pub async fn migrate(
    pool: &SqlitePool,
    migrations: &[(String, Migration)],
) -> anyhow::Result<usize> {
    sqlx::query(MIGRATIONS_TABLE)
        .execute(pool)
        .await
        .context("failed to create migrations table")?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let already: Option<(String,)> =
            sqlx::query_as("SELECT id FROM _folio_migrations WHERE module = ? AND id = ?")
                .bind(module.as_str())
                .bind(migration.id)
                .fetch_optional(pool)
                .await
                .context("failed to read migrations table")?;

        if already.is_some() {
            tracing::debug!(target: "folio-db", %module, id = migration.id, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await.context("failed to open migration transaction")?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration {}/{} failed", module, migration.id))?;
        sqlx::query("INSERT INTO _folio_migrations (module, id) VALUES (?, ?)")
            .bind(module.as_str())
            .bind(migration.id)
            .execute(&mut *tx)
            .await
            .context("failed to record migration")?;
        tx.commit().await.context("failed to commit migration")?;

        tracing::info!(target: "folio-db", %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}
