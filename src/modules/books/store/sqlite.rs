use async_trait::async_trait;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use folio_kernel::Migration;

use super::{CatalogStore, StoreError, StoreResult};
use crate::modules::books::models::{Book, CreateBook, CreateReview, Review};
use crate::modules::books::validation::average_from_tenths;

/// DDL owned by the books module, applied once each by the migration runner.
pub const MIGRATIONS: &[Migration] = &[Migration {
    id: "001_init",
    up: r#"
        CREATE TABLE IF NOT EXISTS books (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            title          TEXT NOT NULL,
            author         TEXT NOT NULL,
            description    TEXT,
            isbn           TEXT,
            published_year INTEGER,
            average_rating REAL NOT NULL DEFAULT 0.0,
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_books_isbn ON books(isbn);

        CREATE TABLE IF NOT EXISTS reviews (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id       INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
            reviewer_name TEXT NOT NULL,
            rating        REAL NOT NULL,
            comment       TEXT,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reviews_book_id ON reviews(book_id);
    "#,
}];

const BOOK_COLUMNS: &str =
    "id, title, author, description, isbn, published_year, average_rating, created_at, updated_at";
const REVIEW_COLUMNS: &str =
    "id, book_id, reviewer_name, rating, comment, created_at, updated_at";

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Backend(err),
    }
}

/// SQLite-backed catalog storage.
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn find_book(&self, id: i64) -> StoreResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> StoreResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE isbn = ?"
        ))
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    async fn insert_book(&self, input: &CreateBook) -> StoreResult<Book> {
        let now = OffsetDateTime::now_utc();

        sqlx::query_as::<_, Book>(&format!(
            "INSERT INTO books (title, author, description, isbn, published_year, average_rating, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 0.0, ?, ?) RETURNING {BOOK_COLUMNS}"
        ))
        .bind(&input.title)
        .bind(&input.author)
        .bind(input.description.as_deref())
        .bind(input.isbn.as_deref())
        .bind(input.published_year)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_books(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Book>, i64)> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY id ASC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;

        Ok((books, total))
    }

    async fn insert_review(&self, book_id: i64, input: &CreateReview) -> StoreResult<Review> {
        // The INSERT must stay the first statement: concurrent writers that
        // read first cannot upgrade to the write lock and fail with SQLITE_BUSY.
        let mut tx = self.pool.begin().await?;

        let now = OffsetDateTime::now_utc();
        let review = sqlx::query_as::<_, Review>(&format!(
            "INSERT INTO reviews (book_id, reviewer_name, rating, comment, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(book_id)
        .bind(&input.reviewer_name)
        .bind(input.rating)
        .bind(input.comment.as_deref())
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreError::NotFound(book_id)
            }
            _ => map_sqlx_error(err),
        })?;

        // Ratings are stored at one decimal; sum them as whole tenths
        let (sum_tenths, count): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(CAST(ROUND(rating * 10) AS INTEGER)), 0), COUNT(*) \
             FROM reviews WHERE book_id = ?",
        )
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;
        let average = average_from_tenths(sum_tenths, count);

        sqlx::query("UPDATE books SET average_rating = ?, updated_at = ? WHERE id = ?")
            .bind(average)
            .bind(now)
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(book_id, review_id = review.id, average, "review stored");
        Ok(review)
    }

    async fn list_reviews(
        &self,
        book_id: i64,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Review>, i64)> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE book_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(book_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE book_id = ?")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((reviews, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_kernel::settings::DatabaseSettings;

    async fn store() -> SqliteCatalogStore {
        let pool = folio_db::connect(&DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            ..DatabaseSettings::default()
        })
        .await
        .unwrap();

        let migrations: Vec<(String, Migration)> = MIGRATIONS
            .iter()
            .cloned()
            .map(|migration| ("books".to_string(), migration))
            .collect();
        folio_db::migrate(&pool, &migrations).await.unwrap();

        SqliteCatalogStore::new(pool)
    }

    fn new_book(title: &str, isbn: Option<&str>) -> CreateBook {
        CreateBook {
            title: title.to_string(),
            author: "A".to_string(),
            description: Some("d".to_string()),
            isbn: isbn.map(str::to_string),
            published_year: Some(1999),
        }
    }

    fn new_review(rating: f64) -> CreateReview {
        CreateReview {
            reviewer_name: "R".to_string(),
            rating,
            comment: Some("fine".to_string()),
        }
    }

    #[tokio::test]
    async fn insert_and_find_book() {
        let store = store().await;
        let book = store
            .insert_book(&new_book("T", Some("1234567890123")))
            .await
            .unwrap();

        assert_eq!(book.average_rating, 0.0);
        assert_eq!(book.published_year, Some(1999));

        let found = store.find_book(book.id).await.unwrap().unwrap();
        assert_eq!(found, book);

        let by_isbn = store.find_book_by_isbn("1234567890123").await.unwrap();
        assert_eq!(by_isbn.map(|b| b.id), Some(book.id));
        assert!(store.find_book(book.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unique_isbn_violation_is_a_conflict() {
        let store = store().await;
        store
            .insert_book(&new_book("one", Some("1234567890")))
            .await
            .unwrap();

        let err = store
            .insert_book(&new_book("two", Some("1234567890")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Books without an ISBN never collide
        store.insert_book(&new_book("three", None)).await.unwrap();
        store.insert_book(&new_book("four", None)).await.unwrap();
        assert_eq!(store.list_books(0, 10).await.unwrap().1, 3);
    }

    #[tokio::test]
    async fn listing_is_id_ordered_with_total() {
        let store = store().await;
        for title in ["a", "b", "c", "d", "e"] {
            store.insert_book(&new_book(title, None)).await.unwrap();
        }

        let (books, total) = store.list_books(2, 2).await.unwrap();
        assert_eq!(total, 5);
        let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "d"]);

        let (books, _) = store.list_books(10, 2).await.unwrap();
        assert!(books.is_empty());
    }

    #[tokio::test]
    async fn review_insert_recomputes_average_in_one_transaction() {
        let store = store().await;
        let book = store.insert_book(&new_book("T", None)).await.unwrap();

        store.insert_review(book.id, &new_review(4.5)).await.unwrap();
        assert_eq!(
            store.find_book(book.id).await.unwrap().unwrap().average_rating,
            4.5
        );

        store.insert_review(book.id, &new_review(3.0)).await.unwrap();
        assert_eq!(
            store.find_book(book.id).await.unwrap().unwrap().average_rating,
            3.8
        );
    }

    #[tokio::test]
    async fn average_ties_round_half_away_from_zero() {
        let store = store().await;
        for (ratings, expected) in [([2.3, 2.4], 2.4), ([1.1, 4.6], 2.9)] {
            let book = store.insert_book(&new_book("T", None)).await.unwrap();
            for rating in ratings {
                store.insert_review(book.id, &new_review(rating)).await.unwrap();
            }
            let stored = store.find_book(book.id).await.unwrap().unwrap();
            assert_eq!(stored.average_rating, expected, "{ratings:?}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reviews_on_a_file_database_all_succeed() {
        let path = std::env::temp_dir().join(format!(
            "folio-reviews-{}-{}.db",
            std::process::id(),
            OffsetDateTime::now_utc().unix_timestamp_nanos()
        ));
        let pool = folio_db::connect(&DatabaseSettings {
            url: format!("sqlite://{}", path.display()),
            max_connections: 5,
            ..DatabaseSettings::default()
        })
        .await
        .unwrap();
        let migrations: Vec<(String, Migration)> = MIGRATIONS
            .iter()
            .cloned()
            .map(|migration| ("books".to_string(), migration))
            .collect();
        folio_db::migrate(&pool, &migrations).await.unwrap();

        let store = std::sync::Arc::new(SqliteCatalogStore::new(pool.clone()));
        let book_id = store.insert_book(&new_book("T", None)).await.unwrap().id;

        let handles: Vec<_> = (0..40)
            .map(|i| {
                let store = store.clone();
                let rating = if i % 2 == 0 { 4.0 } else { 5.0 };
                tokio::spawn(async move { store.insert_review(book_id, &new_review(rating)).await })
            })
            .collect();

        let mut failures = Vec::new();
        for handle in handles {
            if let Err(err) = handle.await.unwrap() {
                failures.push(err.to_string());
            }
        }
        assert!(failures.is_empty(), "{failures:?}");

        let (_, total) = store.list_reviews(book_id, 0, 1).await.unwrap();
        assert_eq!(total, 40);
        let stored = store.find_book(book_id).await.unwrap().unwrap();
        assert_eq!(stored.average_rating, 4.5);

        pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test]
    async fn review_for_missing_book_leaves_nothing_behind() {
        let store = store().await;
        let err = store.insert_review(7, &new_review(3.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(7)));

        let (reviews, total) = store.list_reviews(7, 0, 10).await.unwrap();
        assert!(reviews.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn reviews_are_newest_first() {
        let store = store().await;
        let book = store.insert_book(&new_book("T", None)).await.unwrap();
        let mut ids = Vec::new();
        for rating in [1.0, 2.0, 3.0] {
            ids.push(store.insert_review(book.id, &new_review(rating)).await.unwrap().id);
        }

        let (reviews, total) = store.list_reviews(book.id, 0, 10).await.unwrap();
        assert_eq!(total, 3);
        let listed: Vec<i64> = reviews.iter().map(|r| r.id).collect();
        ids.reverse();
        assert_eq!(listed, ids);
    }
}
