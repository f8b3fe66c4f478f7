//! Input rules for books, reviews and listing parameters.

use serde::Serialize;

use super::models::{CreateBook, CreateReview};

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_AUTHOR_LEN: usize = 255;
pub const MAX_REVIEWER_NAME_LEN: usize = 100;
pub const MIN_PUBLISHED_YEAR: i32 = 1000;
pub const MAX_PUBLISHED_YEAR: i32 = 2024;
pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;
pub const MAX_PER_PAGE: i64 = 100;
pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 50;

/// A single rejected field, rendered into the error `details` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: String,
}

impl FieldError {
    fn new(field: &'static str, error: impl Into<String>) -> Self {
        Self {
            field,
            error: error.into(),
        }
    }
}

fn check_length(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: &str,
    max: usize,
) {
    let len = value.chars().count();
    if len == 0 {
        errors.push(FieldError::new(field, "must not be empty"));
    } else if len > max {
        errors.push(FieldError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
}

pub fn is_valid_isbn(isbn: &str) -> bool {
    matches!(isbn.len(), 10 | 13) && isbn.bytes().all(|b| b.is_ascii_digit())
}

pub fn validate_book(input: &CreateBook) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    check_length(&mut errors, "title", &input.title, MAX_TITLE_LEN);
    check_length(&mut errors, "author", &input.author, MAX_AUTHOR_LEN);

    if let Some(isbn) = &input.isbn {
        if !is_valid_isbn(isbn) {
            errors.push(FieldError::new("isbn", "ISBN must be 10 or 13 digits"));
        }
    }

    if let Some(year) = input.published_year {
        if !(MIN_PUBLISHED_YEAR..=MAX_PUBLISHED_YEAR).contains(&year) {
            errors.push(FieldError::new(
                "published_year",
                format!("must be between {MIN_PUBLISHED_YEAR} and {MAX_PUBLISHED_YEAR}"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a review and return it with its rating rounded to one decimal.
pub fn validate_review(input: &CreateReview) -> Result<CreateReview, Vec<FieldError>> {
    let mut errors = Vec::new();

    check_length(
        &mut errors,
        "reviewer_name",
        &input.reviewer_name,
        MAX_REVIEWER_NAME_LEN,
    );

    // NaN fails the range check too
    if !(MIN_RATING..=MAX_RATING).contains(&input.rating) {
        errors.push(FieldError::new(
            "rating",
            "Rating must be between 1.0 and 5.0",
        ));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(CreateReview {
        rating: round_one_decimal(input.rating),
        ..input.clone()
    })
}

/// Round half away from zero to one decimal place.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// A stored rating in whole tenths.
pub fn rating_tenths(rating: f64) -> i64 {
    (rating * 10.0).round() as i64
}

/// Mean of `count` ratings summing to `sum_tenths`, rounded half away from
/// zero to one decimal. Integer arithmetic keeps `.x5` ties exact.
pub fn average_from_tenths(sum_tenths: i64, count: i64) -> f64 {
    if count <= 0 {
        return 0.0;
    }
    // Ratings are positive, so rounding up at the half is away from zero
    let tenths = (2 * sum_tenths + count) / (2 * count);
    tenths as f64 / 10.0
}

/// Mean of `ratings` rounded to one decimal, or 0.0 when there are none.
pub fn average_rating(ratings: &[f64]) -> f64 {
    let sum_tenths: i64 = ratings.iter().copied().map(rating_tenths).sum();
    average_from_tenths(sum_tenths, ratings.len() as i64)
}

/// Validated listing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Result<Self, Vec<FieldError>> {
        let mut errors = Vec::new();

        let page = match u32::try_from(page) {
            Ok(page) if page >= 1 => page,
            _ => {
                errors.push(FieldError::new("page", "must be at least 1"));
                0
            }
        };

        let per_page = match u32::try_from(per_page) {
            Ok(per_page) if (1..=MAX_PER_PAGE as u32).contains(&per_page) => per_page,
            _ => {
                errors.push(FieldError::new(
                    "per_page",
                    format!("must be between 1 and {MAX_PER_PAGE}"),
                ));
                0
            }
        };

        if errors.is_empty() {
            Ok(Self { page, per_page })
        } else {
            Err(errors)
        }
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE as u32,
            per_page: DEFAULT_PER_PAGE as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(title: &str, author: &str) -> CreateBook {
        CreateBook {
            title: title.to_string(),
            author: author.to_string(),
            ..CreateBook::default()
        }
    }

    fn review(name: &str, rating: f64) -> CreateReview {
        CreateReview {
            reviewer_name: name.to_string(),
            rating,
            comment: None,
        }
    }

    #[test]
    fn accepts_minimal_book() {
        assert!(validate_book(&book("T", "A")).is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized_names() {
        let errors = validate_book(&book("", &"a".repeat(256))).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["title", "author"]);

        assert!(validate_book(&book(&"t".repeat(255), "A")).is_ok());
    }

    #[test]
    fn isbn_must_be_10_or_13_digits() {
        assert!(is_valid_isbn("1234567890"));
        assert!(is_valid_isbn("1234567890123"));
        assert!(!is_valid_isbn("123456789012"));
        assert!(!is_valid_isbn("123456789X"));
        assert!(!is_valid_isbn(""));

        let input = CreateBook {
            isbn: Some("12345".to_string()),
            ..book("T", "A")
        };
        assert_eq!(validate_book(&input).unwrap_err()[0].field, "isbn");
    }

    #[test]
    fn published_year_bounds_are_inclusive() {
        for (year, ok) in [(999, false), (1000, true), (2024, true), (2025, false)] {
            let input = CreateBook {
                published_year: Some(year),
                ..book("T", "A")
            };
            assert_eq!(validate_book(&input).is_ok(), ok, "year {year}");
        }
    }

    #[test]
    fn review_rating_is_range_checked_and_rounded() {
        assert_eq!(validate_review(&review("R", 4.46)).unwrap().rating, 4.5);
        assert_eq!(validate_review(&review("R", 1.0)).unwrap().rating, 1.0);
        assert_eq!(validate_review(&review("R", 5.0)).unwrap().rating, 5.0);

        for rating in [0.9, 5.1, 6.0, f64::NAN] {
            let errors = validate_review(&review("R", rating)).unwrap_err();
            assert_eq!(errors[0].field, "rating");
        }
    }

    #[test]
    fn reviewer_name_length() {
        assert!(validate_review(&review("", 3.0)).is_err());
        assert!(validate_review(&review(&"r".repeat(101), 3.0)).is_err());
        assert!(validate_review(&review(&"r".repeat(100), 3.0)).is_ok());
    }

    #[test]
    fn rounding_goes_half_away_from_zero() {
        assert_eq!(round_one_decimal(3.75), 3.8);
        assert_eq!(round_one_decimal(3.25), 3.3);
        assert_eq!(round_one_decimal(4.0), 4.0);
    }

    #[test]
    fn average_of_no_reviews_is_zero() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[4.5]), 4.5);
        assert_eq!(average_rating(&[4.5, 3.0]), 3.8);
        assert_eq!(average_rating(&[1.0, 2.0, 2.0]), 1.7);
    }

    #[test]
    fn average_ties_round_up_exactly() {
        assert_eq!(average_rating(&[2.3, 2.4]), 2.4);
        assert_eq!(average_rating(&[1.1, 4.6]), 2.9);
        assert_eq!(average_rating(&[1.0, 1.1]), 1.1);

        // Every pair of one-decimal ratings whose mean lands on a .x5 tie
        for a in 10..=50_i64 {
            for b in a..=50_i64 {
                if (a + b) % 2 == 0 {
                    continue;
                }
                let expected = ((a + b) / 2 + 1) as f64 / 10.0;
                let ratings = [a as f64 / 10.0, b as f64 / 10.0];
                assert_eq!(average_rating(&ratings), expected, "{ratings:?}");
            }
        }
    }

    #[test]
    fn pagination_bounds() {
        let pagination = Pagination::new(3, 25).unwrap();
        assert_eq!(pagination.offset(), 50);
        assert_eq!(pagination.limit(), 25);

        assert!(Pagination::new(0, 10).is_err());
        assert!(Pagination::new(-1, 10).is_err());
        assert!(Pagination::new(1, 0).is_err());
        assert!(Pagination::new(1, 101).is_err());
        assert!(Pagination::new(1, 100).is_ok());

        let errors = Pagination::new(0, 0).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn pagination_defaults() {
        let pagination = Pagination::default();
        assert_eq!((pagination.page, pagination.per_page), (1, 50));
        assert_eq!(pagination.offset(), 0);
    }
}
