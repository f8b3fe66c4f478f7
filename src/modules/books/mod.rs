pub mod cache;
pub mod models;
pub mod routes;
pub mod service;
pub mod store;
pub mod validation;

use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use axum::Router;
use once_cell::sync::OnceCell;
use serde_json::json;

use folio_kernel::settings::DatabaseBackend;
use folio_kernel::{InitCtx, Migration, Module};

use cache::BookListingCache;
use service::CatalogService;
use store::{CatalogStore, InMemoryCatalogStore, SqliteCatalogStore};

/// Book and review catalog with a cached book listing.
pub struct BooksModule {
    service: OnceCell<Arc<CatalogService>>,
}

impl BooksModule {
    pub const fn new() -> Self {
        Self {
            service: OnceCell::new(),
        }
    }

    /// The service built during `init`, if it has run.
    pub fn service(&self) -> Option<Arc<CatalogService>> {
        self.service.get().cloned()
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let store: Arc<dyn CatalogStore> = match ctx.settings.database.backend {
            DatabaseBackend::Sqlite => {
                let pool = ctx
                    .db
                    .context("books module needs a database pool for the sqlite backend")?;
                Arc::new(SqliteCatalogStore::new(pool.clone()))
            }
            DatabaseBackend::Memory => Arc::new(InMemoryCatalogStore::new()),
        };

        let listing_cache = BookListingCache::new(ctx.cache.clone(), &ctx.settings.cache);
        self.service
            .set(Arc::new(CatalogService::new(store, listing_cache)))
            .map_err(|_| anyhow!("books module initialized twice"))?;

        tracing::info!(
            module = self.name(),
            backend = ?ctx.settings.database.backend,
            cache_ttl_secs = ctx.settings.cache.ttl_secs,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        match self.service.get() {
            Some(service) => routes::router(service.clone()),
            None => {
                tracing::warn!(module = self.name(), "routes requested before init");
                Router::new()
            }
        }
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        store::MIGRATIONS.to_vec()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn json_content(schema: &str) -> serde_json::Value {
    json!({
        "application/json": {
            "schema": {"$ref": format!("#/components/schemas/{schema}")}
        }
    })
}

/// A response map with the success entry plus the shared error entries.
fn responses(status: &str, description: &str, schema: &str, errors: &[&str]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert(
        status.to_string(),
        json!({"description": description, "content": json_content(schema)}),
    );
    for code in errors {
        let description = match *code {
            "404" => "Book not found",
            "422" => "Validation error",
            _ => "Internal server error",
        };
        map.insert(
            code.to_string(),
            json!({"description": description, "content": json_content("ErrorResponse")}),
        );
    }
    serde_json::Value::Object(map)
}

fn paging_parameters() -> Vec<serde_json::Value> {
    vec![
        json!({"name": "page", "in": "query", "schema": {"type": "integer", "minimum": 1, "default": 1}}),
        json!({"name": "per_page", "in": "query", "schema": {"type": "integer", "minimum": 1, "maximum": 100, "default": 50}}),
    ]
}

fn id_parameter() -> serde_json::Value {
    json!({"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}})
}

fn openapi_fragment() -> serde_json::Value {
    let timestamp = json!({"type": "string", "format": "date-time"});
    let nullable_string = json!({"type": ["string", "null"]});
    let mut review_list_parameters = vec![id_parameter()];
    review_list_parameters.extend(paging_parameters());

    json!({
        "paths": {
            "/books": {
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "parameters": paging_parameters(),
                    "responses": responses("200", "A page of books", "BookPage", &["422", "500"])
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": {"required": true, "content": json_content("CreateBook")},
                    "responses": responses("201", "Book created", "Book", &["422", "500"])
                }
            },
            "/books/{id}": {
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": responses("200", "The book", "Book", &["404", "422", "500"])
                }
            },
            "/books/{id}/reviews": {
                "get": {
                    "summary": "List a book's reviews, newest first",
                    "tags": ["Reviews"],
                    "parameters": review_list_parameters,
                    "responses": responses("200", "A page of reviews", "ReviewPage", &["404", "422", "500"])
                },
                "post": {
                    "summary": "Review a book",
                    "tags": ["Reviews"],
                    "parameters": [id_parameter()],
                    "requestBody": {"required": true, "content": json_content("CreateReview")},
                    "responses": responses("201", "Review created", "Review", &["404", "422", "500"])
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer"},
                        "title": {"type": "string", "maxLength": 255},
                        "author": {"type": "string", "maxLength": 255},
                        "description": nullable_string,
                        "isbn": nullable_string,
                        "published_year": {"type": ["integer", "null"]},
                        "average_rating": {"type": "number"},
                        "created_at": timestamp,
                        "updated_at": timestamp
                    },
                    "required": ["id", "title", "author", "average_rating", "created_at", "updated_at"]
                },
                "CreateBook": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "minLength": 1, "maxLength": 255},
                        "author": {"type": "string", "minLength": 1, "maxLength": 255},
                        "description": {"type": "string"},
                        "isbn": {"type": "string", "pattern": "^([0-9]{10}|[0-9]{13})$"},
                        "published_year": {"type": "integer", "minimum": 1000, "maximum": 2024}
                    },
                    "required": ["title", "author"]
                },
                "BookPage": {
                    "type": "object",
                    "properties": {
                        "books": {"type": "array", "items": {"$ref": "#/components/schemas/Book"}},
                        "total": {"type": "integer"},
                        "page": {"type": "integer"},
                        "per_page": {"type": "integer"}
                    },
                    "required": ["books", "total", "page", "per_page"]
                },
                "Review": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer"},
                        "book_id": {"type": "integer"},
                        "reviewer_name": {"type": "string"},
                        "rating": {"type": "number"},
                        "comment": nullable_string,
                        "created_at": timestamp,
                        "updated_at": timestamp
                    },
                    "required": ["id", "book_id", "reviewer_name", "rating", "created_at", "updated_at"]
                },
                "CreateReview": {
                    "type": "object",
                    "properties": {
                        "reviewer_name": {"type": "string", "minLength": 1, "maxLength": 100},
                        "rating": {"type": "number", "minimum": 1.0, "maximum": 5.0},
                        "comment": {"type": "string"}
                    },
                    "required": ["reviewer_name", "rating"]
                },
                "ReviewPage": {
                    "type": "object",
                    "properties": {
                        "reviews": {"type": "array", "items": {"$ref": "#/components/schemas/Review"}},
                        "total": {"type": "integer"},
                        "book_id": {"type": "integer"},
                        "page": {"type": "integer"},
                        "per_page": {"type": "integer"}
                    },
                    "required": ["reviews", "total", "book_id", "page", "per_page"]
                }
            }
        }
    })
}

/// Create a new instance of the books module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(BooksModule::new())
}
