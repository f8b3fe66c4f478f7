//! Router builder for the Folio HTTP server

use axum::{routing::get, Router};
use serde_json::{json, Value};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};

use folio_kernel::ModuleRegistry;

use crate::MakeRequestUuid;

/// Builder for constructing the main HTTP router
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Add a route to the router
    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Merge a module's router; module routes carry absolute paths
    pub fn merge_module(mut self, module_name: &str, module_router: Router) -> Self {
        tracing::info!(module = module_name, "mounting module routes");
        self.router = self.router.merge(module_router);
        self
    }

    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    pub fn with_cors(mut self) -> Self {
        self.router = self.router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
        self
    }

    /// Tag each request with an `x-request-id` and echo it on the response
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self
            .router
            .layer(TimeoutLayer::new(Duration::from_millis(timeout_ms)));
        self
    }

    /// Serve the merged OpenAPI document at `/docs/openapi.json`
    pub fn with_openapi(mut self, registry: &ModuleRegistry, title: &str) -> Self {
        let document = merge_openapi(registry, title);
        self.router = self.router.route(
            "/docs/openapi.json",
            get(move || {
                let document = document.clone();
                async move { axum::Json(document) }
            }),
        );
        self
    }

    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge every module's OpenAPI fragment into one document.
///
/// The result is checked against the utoipa model; a fragment that does not
/// fit is logged and the raw merge is served anyway.
pub fn merge_openapi(registry: &ModuleRegistry, title: &str) -> Value {
    let mut document = json!({
        "openapi": "3.1.0",
        "info": {
            "title": title,
            "version": env!("CARGO_PKG_VERSION")
        },
        "paths": {
            "/healthz": {
                "get": {
                    "summary": "Health check",
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": {"text/plain": {"schema": {"type": "string"}}}
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "ErrorResponse": error_response_schema()
            }
        }
    });

    for module in registry.modules() {
        let Some(fragment) = module.openapi() else {
            continue;
        };

        if let Some(paths) = fragment.get("paths").and_then(Value::as_object) {
            for (path, item) in paths {
                document["paths"][path] = item.clone();
            }
        }

        if let Some(schemas) = fragment
            .pointer("/components/schemas")
            .and_then(Value::as_object)
        {
            for (name, schema) in schemas {
                document["components"]["schemas"][name] = schema.clone();
            }
        }
    }

    if let Err(err) = serde_json::from_value::<utoipa::openapi::OpenApi>(document.clone()) {
        tracing::warn!(error = %err, "merged OpenAPI document does not match the OpenAPI model");
    }

    document
}

fn error_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "error": {
                "type": "object",
                "properties": {
                    "code": {"type": "string"},
                    "message": {"type": "string"},
                    "details": {"type": "array", "items": {}},
                    "trace_id": {"type": "string"},
                    "timestamp": {"type": "string"}
                },
                "required": ["code", "message", "trace_id", "timestamp"]
            }
        },
        "required": ["error"]
    })
}
