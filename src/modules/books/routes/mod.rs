//! HTTP handlers for `/books` and `/books/{id}/reviews`.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use folio_http::AppError;

use super::models::{Book, BookPage, CreateBook, CreateReview, Review, ReviewPage};
use super::service::{CatalogError, CatalogService};
use super::validation::{FieldError, Pagination, DEFAULT_PAGE, DEFAULT_PER_PAGE};

type AppState = Arc<CatalogService>;

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/{id}", get(get_book))
        .route("/books/{id}/reviews", get(list_reviews).post(create_review))
        .with_state(service)
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(errors) => {
                let message = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.error))
                    .collect::<Vec<_>>()
                    .join("; ");
                AppError::validation(field_details(&errors), message)
            }
            CatalogError::BookNotFound(_) => AppError::not_found(err.to_string()),
            CatalogError::DuplicateIsbn(ref isbn) => AppError::duplicate(
                "duplicate_isbn",
                vec![json!({"field": "isbn", "error": "already exists", "value": isbn})],
                err.to_string(),
            ),
            CatalogError::Infrastructure(_) => AppError::Internal(anyhow::Error::new(err)),
        }
    }
}

fn field_details(errors: &[FieldError]) -> Vec<serde_json::Value> {
    errors
        .iter()
        .map(|e| json!({"field": e.field, "error": e.error}))
        .collect()
}

fn rejected(field: &str, body_text: String) -> AppError {
    AppError::validation(
        vec![json!({"field": field, "error": body_text})],
        format!("invalid {field}"),
    )
}

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<i64>,
    per_page: Option<i64>,
}

impl ListParams {
    fn pagination(self) -> Result<Pagination, AppError> {
        Pagination::new(
            self.page.unwrap_or(DEFAULT_PAGE),
            self.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
        .map_err(|errors| CatalogError::Validation(errors).into())
    }
}

fn pagination(params: Result<Query<ListParams>, QueryRejection>) -> Result<Pagination, AppError> {
    let Query(params) = params.map_err(|e| rejected("query", e.body_text()))?;
    params.pagination()
}

fn book_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    let Path(id) = path.map_err(|e| rejected("id", e.body_text()))?;
    Ok(id)
}

async fn list_books(
    State(service): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<BookPage>, AppError> {
    let pagination = pagination(params)?;
    Ok(Json(service.list_books_cached(pagination).await?))
}

async fn create_book(
    State(service): State<AppState>,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let Json(input) = payload.map_err(|e| rejected("body", e.body_text()))?;
    let book = service.create_book(input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn get_book(
    State(service): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Book>, AppError> {
    let id = book_id(path)?;
    Ok(Json(service.get_book(id).await?))
}

async fn list_reviews(
    State(service): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ReviewPage>, AppError> {
    let id = book_id(path)?;
    let pagination = pagination(params)?;
    Ok(Json(service.list_reviews(id, pagination).await?))
}

async fn create_review(
    State(service): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CreateReview>, JsonRejection>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let id = book_id(path)?;
    let Json(input) = payload.map_err(|e| rejected("body", e.body_text()))?;
    let review = service.create_review(id, input).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
