//! Persistence seam for the catalog.
//!
//! Two backends implement [`CatalogStore`]: SQLite through sqlx, and an
//! in-process map used for the `memory` database backend and in tests.

mod memory;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use super::models::{Book, CreateBook, CreateReview, Review};

pub use memory::InMemoryCatalogStore;
pub use sqlite::{SqliteCatalogStore, MIGRATIONS};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced book does not exist.
    #[error("book {0} not found")]
    NotFound(i64),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store backend failed: {0}")]
    Backend(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Transactional book and review storage.
///
/// Listing calls return the page plus the total count of matching rows.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_book(&self, id: i64) -> StoreResult<Option<Book>>;

    async fn find_book_by_isbn(&self, isbn: &str) -> StoreResult<Option<Book>>;

    /// Persist a new book with `average_rating = 0.0`.
    async fn insert_book(&self, input: &CreateBook) -> StoreResult<Book>;

    /// Books in id order.
    async fn list_books(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Book>, i64)>;

    /// Persist a review and recompute the owning book's average rating as
    /// one atomic step.
    async fn insert_review(&self, book_id: i64, input: &CreateReview) -> StoreResult<Review>;

    /// A book's reviews, newest first.
    async fn list_reviews(
        &self,
        book_id: i64,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Review>, i64)>;
}
