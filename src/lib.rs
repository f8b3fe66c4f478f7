//! Folio application library
//!
//! Wires the catalog modules to their infrastructure: the SQLite pool, the
//! listing cache handle and the HTTP server.

pub mod modules;

use anyhow::Context;
use axum::Router;
use sqlx::SqlitePool;

use folio_cache::SharedCache;
use folio_kernel::settings::{DatabaseBackend, Settings};
use folio_kernel::{InitCtx, ModuleRegistry};

/// A started application: modules initialized, migrated and running.
pub struct App {
    pub registry: ModuleRegistry,
    pub pool: Option<SqlitePool>,
    pub cache: SharedCache,
}

impl App {
    /// The HTTP router for every registered module.
    pub fn router(&self, settings: &Settings) -> Router {
        folio_http::build_router(&self.registry, settings)
    }

    /// Stop modules in reverse order, then release the pool.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.registry.stop_modules().await?;
        if let Some(pool) = self.pool {
            pool.close().await;
            tracing::info!("database pool closed");
        }
        Ok(())
    }
}

async fn connect_database(settings: &Settings) -> anyhow::Result<Option<SqlitePool>> {
    match settings.database.backend {
        DatabaseBackend::Sqlite => Ok(Some(folio_db::connect(&settings.database).await?)),
        DatabaseBackend::Memory => {
            tracing::info!("using in-memory catalog store");
            Ok(None)
        }
    }
}

/// Connect infrastructure, register modules and run init, migrations and
/// start in that order.
pub async fn bootstrap(settings: &Settings) -> anyhow::Result<App> {
    let pool = connect_database(settings).await?;
    let cache = folio_cache::connect(&settings.cache).await;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);

    let ctx = InitCtx {
        settings,
        db: pool.as_ref(),
        cache: &cache,
    };

    registry.init_modules(&ctx).await?;

    if let Some(pool) = &pool {
        let applied = folio_db::migrate(pool, &registry.collect_migrations())
            .await
            .context("failed to apply module migrations")?;
        tracing::info!(applied, "migrations complete");
    }

    registry.start_modules(&ctx).await?;

    tracing::info!(modules = registry.len(), "folio bootstrap complete");

    Ok(App {
        registry,
        pool,
        cache,
    })
}

/// Bootstrap, serve until a shutdown signal, then shut down.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let app = bootstrap(settings).await?;

    let served = folio_http::start_server(&app.registry, settings).await;
    let stopped = app.shutdown().await;

    served?;
    stopped
}

/// Apply pending migrations without starting any module.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let pool = match connect_database(settings).await? {
        Some(pool) => pool,
        None => {
            tracing::info!("memory backend has no migrations to apply");
            return Ok(0);
        }
    };

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);

    let applied = folio_db::migrate(&pool, &registry.collect_migrations()).await?;
    pool.close().await;
    Ok(applied)
}
