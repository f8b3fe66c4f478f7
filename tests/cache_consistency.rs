use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use folio_app::modules::books::cache::{listing_key, BookListingCache};
use folio_app::modules::books::models::{Book, CreateBook, CreateReview, Review};
use folio_app::modules::books::service::CatalogService;
use folio_app::modules::books::store::{CatalogStore, InMemoryCatalogStore, StoreResult};
use folio_app::modules::books::validation::Pagination;
use folio_cache::{Cache, CacheError, CacheSettings, MemoryCache, SharedCache};

/// Delegates to the in-memory store and counts listing reads.
#[derive(Default)]
struct CountingStore {
    inner: InMemoryCatalogStore,
    list_calls: AtomicUsize,
}

impl CountingStore {
    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogStore for CountingStore {
    async fn find_book(&self, id: i64) -> StoreResult<Option<Book>> {
        self.inner.find_book(id).await
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> StoreResult<Option<Book>> {
        self.inner.find_book_by_isbn(isbn).await
    }

    async fn insert_book(&self, input: &CreateBook) -> StoreResult<Book> {
        self.inner.insert_book(input).await
    }

    async fn list_books(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Book>, i64)> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_books(offset, limit).await
    }

    async fn insert_review(&self, book_id: i64, input: &CreateReview) -> StoreResult<Review> {
        self.inner.insert_review(book_id, input).await
    }

    async fn list_reviews(
        &self,
        book_id: i64,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Review>, i64)> {
        self.inner.list_reviews(book_id, offset, limit).await
    }
}

/// A cache whose every operation fails.
struct UnreachableCache;

#[async_trait]
impl Cache for UnreachableCache {
    async fn get(&self, _key: &str) -> folio_cache::Result<Option<Vec<u8>>> {
        Err(CacheError::ConnectionFailed("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) -> folio_cache::Result<()> {
        Err(CacheError::ConnectionFailed("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> folio_cache::Result<()> {
        Err(CacheError::ConnectionFailed("connection refused".to_string()))
    }
}

fn service_with(cache: SharedCache) -> (CatalogService, Arc<CountingStore>) {
    let store = Arc::new(CountingStore::default());
    let listing = BookListingCache::new(cache, &CacheSettings::default());
    (CatalogService::new(store.clone(), listing), store)
}

fn memory_cache() -> SharedCache {
    Arc::new(MemoryCache::new(256))
}

fn book(title: &str) -> CreateBook {
    CreateBook {
        title: title.to_string(),
        author: "A".to_string(),
        ..CreateBook::default()
    }
}

fn review(rating: f64) -> CreateReview {
    CreateReview {
        reviewer_name: "R".to_string(),
        rating,
        comment: None,
    }
}

#[tokio::test]
async fn hit_skips_the_store_and_matches_direct_read() {
    let (service, store) = service_with(memory_cache());
    for i in 0..3 {
        service.create_book(book(&format!("b{i}"))).await.unwrap();
    }
    let pagination = Pagination::new(1, 10).unwrap();

    let miss = service.list_books_cached(pagination).await.unwrap();
    assert_eq!(store.list_calls(), 1);

    let hit = service.list_books_cached(pagination).await.unwrap();
    assert_eq!(store.list_calls(), 1);
    assert_eq!(hit, miss);

    let direct = service.list_books(pagination).await.unwrap();
    assert_eq!(direct, hit);
}

#[tokio::test]
async fn hit_returns_exactly_the_stored_page() {
    let cache = memory_cache();
    let (service, _) = service_with(cache.clone());
    service.create_book(book("b")).await.unwrap();
    let pagination = Pagination::new(1, 25).unwrap();

    let first = service.list_books_cached(pagination).await.unwrap();

    let stored = cache.get(&listing_key(1, 25)).await.unwrap().unwrap();
    let decoded: folio_app::modules::books::models::BookPage =
        serde_json::from_slice(&stored).unwrap();
    assert_eq!(decoded, first);
}

#[tokio::test]
async fn every_grid_page_reflects_writes() {
    let (service, _) = service_with(memory_cache());
    let created = service.create_book(book("first")).await.unwrap();

    let grid: Vec<Pagination> = (1..=9)
        .flat_map(|page| [10, 25, 50, 100].map(move |per_page| (page, per_page)))
        .map(|(page, per_page)| Pagination::new(page, per_page).unwrap())
        .collect();

    for pagination in &grid {
        assert_eq!(service.list_books_cached(*pagination).await.unwrap().total, 1);
    }

    service.create_book(book("second")).await.unwrap();
    service.create_review(created.id, review(2.0)).await.unwrap();

    for pagination in &grid {
        let page = service.list_books_cached(*pagination).await.unwrap();
        assert_eq!(page.total, 2, "{pagination:?}");
    }

    let first_page = service
        .list_books_cached(Pagination::new(1, 10).unwrap())
        .await
        .unwrap();
    assert_eq!(first_page.books[0].average_rating, 2.0);
}

#[tokio::test]
async fn pages_outside_the_grid_stay_stale_until_expiry() {
    let (service, _) = service_with(memory_cache());
    service.create_book(book("first")).await.unwrap();
    let off_grid = Pagination::new(1, 20).unwrap();

    assert_eq!(service.list_books_cached(off_grid).await.unwrap().total, 1);
    service.create_book(book("second")).await.unwrap();

    assert_eq!(service.list_books_cached(off_grid).await.unwrap().total, 1);
    assert_eq!(service.list_books(off_grid).await.unwrap().total, 2);
}

#[tokio::test]
async fn unreachable_cache_never_fails_requests() {
    let (service, store) = service_with(Arc::new(UnreachableCache));
    let pagination = Pagination::default();

    let created = service.create_book(book("b")).await.unwrap();
    service.create_review(created.id, review(5.0)).await.unwrap();

    let first = service.list_books_cached(pagination).await.unwrap();
    let second = service.list_books_cached(pagination).await.unwrap();

    assert_eq!(first.total, 1);
    assert_eq!(second.books[0].average_rating, 5.0);
    assert_eq!(store.list_calls(), 2);
}

#[tokio::test]
async fn disabled_cache_reads_through() {
    let (service, store) = service_with(folio_cache::disabled());
    let pagination = Pagination::default();

    service.list_books_cached(pagination).await.unwrap();
    service.list_books_cached(pagination).await.unwrap();
    assert_eq!(store.list_calls(), 2);
}
