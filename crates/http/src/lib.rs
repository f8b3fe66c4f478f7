//! HTTP server facade for Folio with Axum, error handling, and OpenAPI support.

use anyhow::Context;
use axum::{extract::Request, http::HeaderValue, routing::get, Json, Router};
use serde_json::json;
use tokio::signal;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::{Timestamp, Uuid};

use folio_kernel::settings::Settings;
use folio_kernel::ModuleRegistry;

pub mod error;
pub mod router;

pub use error::AppError;
use router::RouterBuilder;

/// Serve until Ctrl+C or SIGTERM, then drain in-flight requests.
pub async fn start_server(registry: &ModuleRegistry, settings: &Settings) -> anyhow::Result<()> {
    let app = build_router(registry, settings);
    let address = format!("{}:{}", settings.server.host, settings.server.port);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {address}"))?;

    tracing::info!("HTTP server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the application router with all module routes merged
pub fn build_router(registry: &ModuleRegistry, settings: &Settings) -> Router {
    let title = settings.server.title.clone();
    let mut router_builder = RouterBuilder::new()
        .route("/healthz", get(health_check))
        .route("/health", get(health_status))
        .route(
            "/",
            get(move || {
                let title = title.clone();
                async move {
                    Json(json!({
                        "message": title,
                        "version": env!("CARGO_PKG_VERSION")
                    }))
                }
            }),
        );

    for module in registry.modules() {
        router_builder = router_builder.merge_module(module.name(), module.routes());
    }

    router_builder
        .with_openapi(registry, &settings.server.title)
        .with_tracing()
        .with_cors()
        .with_request_id()
        .with_timeout(settings.server.request_timeout_ms)
        .build()
}

async fn health_check() -> &'static str {
    "ok"
}

async fn health_status() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy"}))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

/// Request ID generator for tracing
#[derive(Clone)]
pub(crate) struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let timestamp = Timestamp::now(uuid::NoContext);
        let request_id = Uuid::new_v7(timestamp)
            .to_string()
            .parse::<HeaderValue>()
            .ok()?;
        Some(RequestId::new(request_id))
    }
}
