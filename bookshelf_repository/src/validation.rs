use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

use crate::api::{BookPatch, NewBook};

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema, thiserror::Error)]
#[error("Validation failed: {}", describe(.detail))]
/// Itemized validation failures, serialized as the body of a 422 response
pub struct ValidationErrors {
    pub detail: Vec<FieldError>,
}

fn describe(detail: &[FieldError]) -> String {
    detail
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.detail.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.detail.is_empty()
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn check_not_blank(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "must not be empty");
    }
}

fn check_rating(errors: &mut ValidationErrors, rating: f64) {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        errors.add(
            "rating",
            format!("must be between {} and {}", MIN_RATING, MAX_RATING),
        );
    }
}

/// Checks a create request before anything reaches the store
pub fn validate_new_book(book: &NewBook) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_not_blank(&mut errors, "title", &book.title);
    check_not_blank(&mut errors, "author", &book.author);
    if let Some(rating) = book.rating {
        check_rating(&mut errors, rating);
    }
    errors.into_result()
}

/// Checks only the fields the patch actually carries
pub fn validate_book_patch(patch: &BookPatch) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if let Some(title) = &patch.title {
        check_not_blank(&mut errors, "title", title);
    }
    if let Some(author) = &patch.author {
        check_not_blank(&mut errors, "author", author);
    }
    if let Some(Some(rating)) = patch.rating {
        check_rating(&mut errors, rating);
    }
    errors.into_result()
}

#[cfg(test)]
mod validation_tests {
    use crate::api::{BookPatch, NewBook};
    use crate::validation::{validate_book_patch, validate_new_book, FieldError};

    #[test]
    fn test_valid_new_book() {
        let book = NewBook {
            rating: Some(5.0),
            ..NewBook::new("Dune", "Herbert")
        };
        assert!(validate_new_book(&book).is_ok());
    }

    #[test]
    fn test_new_book_errors_are_itemized() {
        let book = NewBook {
            rating: Some(7.5),
            ..NewBook::new("  ", "")
        };
        let errors = validate_new_book(&book).unwrap_err();
        let fields: Vec<&str> = errors.detail.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "author", "rating"]);
    }

    #[test]
    fn test_rating_bounds_are_inclusive() {
        for rating in [0.0, 2.5, 5.0] {
            let patch = BookPatch {
                rating: Some(Some(rating)),
                ..BookPatch::default()
            };
            assert!(validate_book_patch(&patch).is_ok(), "rating {}", rating);
        }
        for rating in [-0.1, 5.01] {
            let patch = BookPatch {
                rating: Some(Some(rating)),
                ..BookPatch::default()
            };
            assert!(validate_book_patch(&patch).is_err(), "rating {}", rating);
        }
    }

    #[test]
    fn test_patch_checks_only_supplied_fields() {
        assert!(validate_book_patch(&BookPatch::default()).is_ok());

        // clearing the rating is allowed
        let clear_rating = BookPatch {
            rating: Some(None),
            ..BookPatch::default()
        };
        assert!(validate_book_patch(&clear_rating).is_ok());

        let blank_title = BookPatch {
            title: Some("".to_string()),
            ..BookPatch::default()
        };
        assert_eq!(
            validate_book_patch(&blank_title).unwrap_err().detail,
            vec![FieldError {
                field: "title".to_string(),
                message: "must not be empty".to_string(),
            }]
        );
    }
}
