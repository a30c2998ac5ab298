use std::collections::HashMap;
use std::sync::Arc;

use crate::api::{Book, BookId, BookPatch, ListBooksQuery, NewBook, ReadingStats, ReadingStatus};
use crate::books_repository::{today, BookFilter, BookRepository, BookRepositoryError};
use crate::validation::{validate_book_patch, validate_new_book, ValidationErrors};

/// Status that marks a book as completed for the update rule and the statistics
pub const COMPLETION_STATUS: ReadingStatus = ReadingStatus::Finished;

#[derive(thiserror::Error, Debug)]
pub enum BookServiceError {
    #[error("Book {0} not found")]
    NotFound(BookId),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Repository failure {0}")]
    Repository(#[from] BookRepositoryError),
}

/// Request-shaped operations on top of a books repository.
/// Holds no state of its own, the repository handle is passed in once at startup.
#[derive(Clone)]
pub struct BookService {
    books_repository: Arc<dyn BookRepository + Send + Sync>,
}

impl BookService {
    pub fn new(books_repository: Arc<dyn BookRepository + Send + Sync>) -> Self {
        Self { books_repository }
    }

    pub async fn create_book(&self, new_book: NewBook) -> Result<Book, BookServiceError> {
        validate_new_book(&new_book)?;
        let book = self.books_repository.add_book(new_book).await?;
        tracing::info!("Added book {} '{}'", book.id, book.title);
        Ok(book)
    }

    pub async fn list_books(&self, query: &ListBooksQuery) -> Result<Vec<Book>, BookServiceError> {
        Ok(self
            .books_repository
            .list_books(&filter_from_query(query), query.skip, query.limit)
            .await?)
    }

    /// Number of all books matching the query filters, ignoring skip and limit
    pub async fn count_books(&self, query: &ListBooksQuery) -> Result<u64, BookServiceError> {
        Ok(self
            .books_repository
            .count_books(&filter_from_query(query))
            .await?)
    }

    pub async fn get_book(&self, book_id: BookId) -> Result<Book, BookServiceError> {
        self.books_repository
            .get_book(book_id)
            .await?
            .ok_or(BookServiceError::NotFound(book_id))
    }

    /// Applies the supplied fields only. Setting the completion status stamps
    /// date_completed with today's date unless the book ends up with one already.
    pub async fn update_book(
        &self,
        book_id: BookId,
        mut patch: BookPatch,
    ) -> Result<Book, BookServiceError> {
        validate_book_patch(&patch)?;

        let existing = self.get_book(book_id).await?;
        if patch.status == Some(COMPLETION_STATUS) {
            let date_completed = match patch.date_completed {
                Some(date_completed) => date_completed,
                None => existing.date_completed,
            };
            if date_completed.is_none() {
                patch.date_completed = Some(Some(today()));
            }
        }

        self.books_repository
            .update_book(book_id, patch)
            .await?
            .ok_or(BookServiceError::NotFound(book_id))
    }

    pub async fn delete_book(&self, book_id: BookId) -> Result<(), BookServiceError> {
        if self.books_repository.delete_book(book_id).await? {
            tracing::info!("Deleted book {}", book_id);
            Ok(())
        } else {
            Err(BookServiceError::NotFound(book_id))
        }
    }

    pub async fn reading_stats(&self) -> Result<ReadingStats, BookServiceError> {
        let counts = self.books_repository.count_books_by_status().await?;
        Ok(reading_stats_from_counts(&counts))
    }
}

/// Builds the repository filter, parameters that are omitted or empty are not applied
fn filter_from_query(query: &ListBooksQuery) -> BookFilter {
    let non_empty = |value: &Option<String>| value.clone().filter(|value| !value.is_empty());
    BookFilter {
        status: query.status,
        genre: non_empty(&query.genre),
        search: non_empty(&query.search),
    }
}

fn reading_stats_from_counts(counts: &HashMap<ReadingStatus, u64>) -> ReadingStats {
    let count_of = |status: ReadingStatus| counts.get(&status).copied().unwrap_or_default();
    let total_books: u64 = counts.values().sum();
    let completed_books = count_of(COMPLETION_STATUS);
    let completion_rate = if total_books > 0 {
        (completed_books as f64 / total_books as f64 * 100.0 * 100.0).round_ties_even() / 100.0
    } else {
        0.0
    };

    ReadingStats {
        total_books,
        completed_books,
        to_read_books: count_of(ReadingStatus::ToRead),
        reading_books: count_of(ReadingStatus::Reading),
        completion_rate,
    }
}
