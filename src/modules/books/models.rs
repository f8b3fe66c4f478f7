use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A catalog entry. `average_rating` is derived from the book's reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub average_rating: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Request model for creating a new book.
///
/// Unknown fields, `average_rating` included, are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBook {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub published_year: Option<i32>,
}

/// A rating left on a book. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub book_id: i64,
    pub reviewer_name: String,
    pub rating: f64,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateReview {
    pub reviewer_name: String,
    pub rating: f64,
    #[serde(default)]
    pub comment: Option<String>,
}

/// One page of the book listing; also the cached value shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookPage {
    pub books: Vec<Book>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    pub total: i64,
    pub book_id: i64,
    pub page: u32,
    pub per_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn book_timestamps_serialize_as_rfc3339() {
        let book = Book {
            id: 1,
            title: "T".to_string(),
            author: "A".to_string(),
            description: None,
            isbn: Some("1234567890123".to_string()),
            published_year: None,
            average_rating: 0.0,
            created_at: datetime!(2024-03-01 12:30:00 UTC),
            updated_at: datetime!(2024-03-01 12:30:00 UTC),
        };

        let value = serde_json::to_value(&book).unwrap();
        assert_eq!(value["created_at"], "2024-03-01T12:30:00Z");
        assert_eq!(value["average_rating"], 0.0);
        assert!(value["description"].is_null());
    }

    #[test]
    fn create_book_ignores_client_rating() {
        let input: CreateBook = serde_json::from_value(json!({
            "title": "T",
            "author": "A",
            "average_rating": 5.0
        }))
        .unwrap();

        assert_eq!(input.title, "T");
        assert!(input.isbn.is_none());
    }
}
