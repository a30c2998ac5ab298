use std::collections::HashMap;

use chrono::NaiveDate;

pub use in_memory_books_repository::InMemoryBookRepository;
pub use postgres_books_repository::{PostgresBooksRepository, PostgresBooksRepositoryConfig};

use crate::api::{Book, BookId, BookPatch, NewBook, ReadingStatus};

mod in_memory_books_repository;
mod postgres_books_repository;

#[derive(thiserror::Error, Debug)]
pub enum BookRepositoryError {
    #[error("Failed to deserialize book: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

/// Conjunction of optional conditions applied by list and count queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub status: Option<ReadingStatus>,
    pub genre: Option<String>,
    /// Case-insensitive substring of either title or author
    pub search: Option<String>,
}

impl BookFilter {
    pub fn matches(&self, book: &Book) -> bool {
        if let Some(status) = self.status {
            if book.status != status {
                return false;
            }
        }
        if let Some(genre) = &self.genre {
            if book.genre.as_ref() != Some(genre) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let search = search.to_lowercase();
            if !book.title.to_lowercase().contains(&search)
                && !book.author.to_lowercase().contains(&search)
            {
                return false;
            }
        }
        true
    }
}

/// Current local date, used for date_added and date_completed
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[async_trait::async_trait]
pub trait BookRepository {
    /// Adds book to repository, assigns id and date_added and returns the stored record
    async fn add_book(&self, book: NewBook) -> Result<Book, BookRepositoryError>;
    /// Retrieves the book, None if there is no book with given id
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>, BookRepositoryError>;
    /// Lists books matching the filter in insertion order, skipping `skip` and returning at most `limit`
    async fn list_books(
        &self,
        filter: &BookFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Book>, BookRepositoryError>;
    /// Counts books matching the filter
    async fn count_books(&self, filter: &BookFilter) -> Result<u64, BookRepositoryError>;
    /// Counts all books grouped by status, statuses without books are absent
    async fn count_books_by_status(
        &self,
    ) -> Result<HashMap<ReadingStatus, u64>, BookRepositoryError>;
    /// Applies the patch, returns the updated book or None if it was not found
    async fn update_book(
        &self,
        book_id: BookId,
        patch: BookPatch,
    ) -> Result<Option<Book>, BookRepositoryError>;
    /// Removes the book, returns true if it was removed and false if it was not found
    async fn delete_book(&self, book_id: BookId) -> Result<bool, BookRepositoryError>;
}

#[cfg(test)]
mod book_filter_tests {
    use crate::api::{Book, ReadingStatus};
    use crate::books_repository::{today, BookFilter};

    fn book(title: &str, author: &str, genre: Option<&str>, status: ReadingStatus) -> Book {
        Book {
            id: 1,
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.map(str::to_string),
            status,
            rating: None,
            notes: None,
            date_added: today(),
            date_completed: None,
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = BookFilter::default();
        assert!(filter.matches(&book("Dune", "Herbert", None, ReadingStatus::ToRead)));
    }

    #[test]
    fn test_search_is_case_insensitive_on_title_and_author() {
        let filter = BookFilter {
            search: Some("dune".to_string()),
            ..BookFilter::default()
        };
        assert!(filter.matches(&book("Dune", "Herbert", None, ReadingStatus::ToRead)));
        assert!(filter.matches(&book("Messiah", "Fan of DUNE", None, ReadingStatus::ToRead)));
        assert!(!filter.matches(&book("Emma", "Austen", None, ReadingStatus::ToRead)));
    }

    #[test]
    fn test_conditions_are_combined() {
        let filter = BookFilter {
            status: Some(ReadingStatus::Reading),
            genre: Some("scifi".to_string()),
            search: None,
        };
        assert!(filter.matches(&book("Dune", "Herbert", Some("scifi"), ReadingStatus::Reading)));
        assert!(!filter.matches(&book("Dune", "Herbert", Some("scifi"), ReadingStatus::ToRead)));
        assert!(!filter.matches(&book("Dune", "Herbert", Some("SciFi"), ReadingStatus::Reading)));
        assert!(!filter.matches(&book("Dune", "Herbert", None, ReadingStatus::Reading)));
    }
}
