use async_trait::async_trait;
use axum::Router;
use folio_cache::SharedCache;
use sqlx::SqlitePool;

/// Shared infrastructure handed to each module at init and start.
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
    /// Present only when the relational store is SQLite.
    pub db: Option<&'a SqlitePool>,
    pub cache: &'a SharedCache,
}

/// One DDL step owned by a module, applied at most once per database.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// A unit of the application: routes, schema and lifecycle hooks.
///
/// Lifecycle: `init` → migrations → `start` → serve → `stop`.
#[async_trait]
pub trait Module: Sync + Send {
    fn name(&self) -> &'static str;

    /// Build internal state from the context. Runs before migrations.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes with absolute paths, merged at the application root.
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment (`paths` and `components.schemas`) for the merged document.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Applied in `id` order, each recorded once.
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
