//! Catalog operations: validation, uniqueness, derived ratings and listing
//! cache invalidation.

use std::sync::Arc;

use thiserror::Error;

use super::cache::BookListingCache;
use super::models::{Book, BookPage, CreateBook, CreateReview, Review, ReviewPage};
use super::store::{CatalogStore, StoreError};
use super::validation::{self, FieldError, Pagination};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("Book with id {0} not found")]
    BookNotFound(i64),

    #[error("Book with ISBN {0} already exists")]
    DuplicateIsbn(String),

    #[error("storage failure: {0}")]
    Infrastructure(#[source] StoreError),
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::BookNotFound(id),
            other => Self::Infrastructure(other),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    listing_cache: BookListingCache,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>, listing_cache: BookListingCache) -> Self {
        Self {
            store,
            listing_cache,
        }
    }

    pub async fn create_book(&self, input: CreateBook) -> CatalogResult<Book> {
        validation::validate_book(&input).map_err(CatalogError::Validation)?;

        if let Some(isbn) = input.isbn.as_deref() {
            if self.store.find_book_by_isbn(isbn).await?.is_some() {
                return Err(CatalogError::DuplicateIsbn(isbn.to_string()));
            }
        }

        let book = match self.store.insert_book(&input).await {
            Ok(book) => book,
            // Lost a race with a concurrent insert of the same ISBN
            Err(StoreError::Conflict(_)) => {
                return Err(CatalogError::DuplicateIsbn(
                    input.isbn.unwrap_or_default(),
                ))
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(book_id = book.id, "book created");
        self.listing_cache.invalidate().await;
        Ok(book)
    }

    pub async fn get_book(&self, id: i64) -> CatalogResult<Book> {
        self.store
            .find_book(id)
            .await?
            .ok_or(CatalogError::BookNotFound(id))
    }

    /// One page of books in id order, read straight from the store.
    pub async fn list_books(&self, pagination: Pagination) -> CatalogResult<BookPage> {
        let (books, total) = self
            .store
            .list_books(pagination.offset(), pagination.limit())
            .await?;

        Ok(BookPage {
            books,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }

    /// [`list_books`](Self::list_books) behind the listing cache.
    pub async fn list_books_cached(&self, pagination: Pagination) -> CatalogResult<BookPage> {
        self.listing_cache
            .get_or_populate(pagination.page, pagination.per_page, || {
                self.list_books(pagination)
            })
            .await
    }

    pub async fn create_review(&self, book_id: i64, input: CreateReview) -> CatalogResult<Review> {
        self.get_book(book_id).await?;

        let input = validation::validate_review(&input).map_err(CatalogError::Validation)?;
        let review = self.store.insert_review(book_id, &input).await?;

        tracing::info!(book_id, review_id = review.id, rating = review.rating, "review created");
        self.listing_cache.invalidate().await;
        Ok(review)
    }

    pub async fn list_reviews(
        &self,
        book_id: i64,
        pagination: Pagination,
    ) -> CatalogResult<ReviewPage> {
        self.get_book(book_id).await?;

        let (reviews, total) = self
            .store
            .list_reviews(book_id, pagination.offset(), pagination.limit())
            .await?;

        Ok(ReviewPage {
            reviews,
            total,
            book_id,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }
}
