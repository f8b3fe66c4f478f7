use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{CatalogStore, StoreError, StoreResult};
use crate::modules::books::models::{Book, CreateBook, CreateReview, Review};
use crate::modules::books::validation::average_rating;

#[derive(Default)]
struct State {
    books: BTreeMap<i64, Book>,
    reviews: Vec<Review>,
    last_book_id: i64,
    last_review_id: i64,
}

/// Process-local store. Every call takes the lock once, so a review insert
/// and its average recompute are observed together.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    state: RwLock<State>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T>(items: impl Iterator<Item = T>, offset: i64, limit: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    items.skip(offset).take(limit).collect()
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn find_book(&self, id: i64) -> StoreResult<Option<Book>> {
        Ok(self.state.read().await.books.get(&id).cloned())
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> StoreResult<Option<Book>> {
        let state = self.state.read().await;
        Ok(state
            .books
            .values()
            .find(|book| book.isbn.as_deref() == Some(isbn))
            .cloned())
    }

    async fn insert_book(&self, input: &CreateBook) -> StoreResult<Book> {
        let mut state = self.state.write().await;

        if let Some(isbn) = input.isbn.as_deref() {
            if state.books.values().any(|b| b.isbn.as_deref() == Some(isbn)) {
                return Err(StoreError::Conflict(format!("isbn {isbn} already exists")));
            }
        }

        state.last_book_id += 1;
        let now = OffsetDateTime::now_utc();
        let book = Book {
            id: state.last_book_id,
            title: input.title.clone(),
            author: input.author.clone(),
            description: input.description.clone(),
            isbn: input.isbn.clone(),
            published_year: input.published_year,
            average_rating: 0.0,
            created_at: now,
            updated_at: now,
        };
        state.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn list_books(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Book>, i64)> {
        let state = self.state.read().await;
        let total = state.books.len() as i64;
        Ok((page(state.books.values().cloned(), offset, limit), total))
    }

    async fn insert_review(&self, book_id: i64, input: &CreateReview) -> StoreResult<Review> {
        let mut state = self.state.write().await;

        if !state.books.contains_key(&book_id) {
            return Err(StoreError::NotFound(book_id));
        }

        state.last_review_id += 1;
        let now = OffsetDateTime::now_utc();
        let review = Review {
            id: state.last_review_id,
            book_id,
            reviewer_name: input.reviewer_name.clone(),
            rating: input.rating,
            comment: input.comment.clone(),
            created_at: now,
            updated_at: now,
        };
        state.reviews.push(review.clone());

        let ratings: Vec<f64> = state
            .reviews
            .iter()
            .filter(|r| r.book_id == book_id)
            .map(|r| r.rating)
            .collect();
        let average = average_rating(&ratings);

        if let Some(book) = state.books.get_mut(&book_id) {
            book.average_rating = average;
            book.updated_at = now;
        }

        Ok(review)
    }

    async fn list_reviews(
        &self,
        book_id: i64,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Review>, i64)> {
        let state = self.state.read().await;

        let mut reviews: Vec<&Review> = state
            .reviews
            .iter()
            .filter(|r| r.book_id == book_id)
            .collect();
        reviews.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = reviews.len() as i64;
        Ok((page(reviews.into_iter().cloned(), offset, limit), total))
    }
}
