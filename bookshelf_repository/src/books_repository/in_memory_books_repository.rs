use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI32, Ordering};

use serde_json::json;

use crate::api::{Book, BookId, BookPatch, NewBook, ReadingStatus};
use crate::books_repository::{today, BookFilter, BookRepository, BookRepositoryError};

/// Keeps books ordered by id, which is also the insertion order
pub struct InMemoryBookRepository {
    book_sequence_generator: AtomicI32,
    books: parking_lot::RwLock<BTreeMap<BookId, Book>>,
}

impl Default for InMemoryBookRepository {
    fn default() -> Self {
        Self {
            book_sequence_generator: AtomicI32::new(1),
            books: Default::default(),
        }
    }
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

#[async_trait::async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn add_book(&self, book: NewBook) -> Result<Book, BookRepositoryError> {
        let id = self.book_sequence_generator.fetch_add(1, Ordering::Relaxed);
        let book = Book {
            id,
            title: book.title,
            author: book.author,
            genre: book.genre,
            status: book.status,
            rating: book.rating,
            notes: book.notes,
            date_added: today(),
            date_completed: book.date_completed,
        };
        self.books.write().insert(id, book.clone());
        Ok(book)
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>, BookRepositoryError> {
        Ok(self.books.read().get(&book_id).cloned())
    }

    async fn list_books(
        &self,
        filter: &BookFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Book>, BookRepositoryError> {
        Ok(self
            .books
            .read()
            .values()
            .filter(|book| filter.matches(book))
            .skip(to_usize(skip))
            .take(to_usize(limit))
            .cloned()
            .collect())
    }

    async fn count_books(&self, filter: &BookFilter) -> Result<u64, BookRepositoryError> {
        Ok(self
            .books
            .read()
            .values()
            .filter(|book| filter.matches(book))
            .count() as u64)
    }

    async fn count_books_by_status(
        &self,
    ) -> Result<HashMap<ReadingStatus, u64>, BookRepositoryError> {
        let mut counts = HashMap::new();
        for book in self.books.read().values() {
            *counts.entry(book.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn update_book(
        &self,
        book_id: BookId,
        patch: BookPatch,
    ) -> Result<Option<Book>, BookRepositoryError> {
        let mut locked_books = self.books.write();
        if let Some(book) = locked_books.get_mut(&book_id) {
            let mut result_book = json!(book);
            json_patch::merge(&mut result_book, &json!(patch));
            let result_book: Book = serde_json::from_value(result_book)?;
            *book = result_book;
            Ok(Some(book.clone()))
        } else {
            Ok(None)
        }
    }

    async fn delete_book(&self, book_id: BookId) -> Result<bool, BookRepositoryError> {
        Ok(self.books.write().remove(&book_id).is_some())
    }
}

#[cfg(test)]
mod in_memory_book_repository_tests {
    use chrono::NaiveDate;

    use crate::api::{BookPatch, NewBook, ReadingStatus};
    use crate::books_repository::{today, BookFilter, BookRepository, InMemoryBookRepository};

    #[tokio::test]
    /// Tests if add_book and get_book work correctly
    async fn test_add_book_and_get_it() {
        let repo = InMemoryBookRepository::default();

        let not_existing_book_id = 20000;
        let book_not_found = repo
            .get_book(not_existing_book_id)
            .await
            .expect("Failed to get book");
        assert_eq!(book_not_found, None);

        let new_book = NewBook {
            genre: Some("scifi".to_string()),
            rating: Some(4.5),
            notes: Some("spice".to_string()),
            ..NewBook::new("Dune", "Herbert")
        };
        let added = repo
            .add_book(new_book.clone())
            .await
            .expect("Failed to add book");

        assert_eq!(added.title, "Dune");
        assert_eq!(added.author, "Herbert");
        assert_eq!(added.genre, new_book.genre);
        assert_eq!(added.status, ReadingStatus::ToRead);
        assert_eq!(added.rating, Some(4.5));
        assert_eq!(added.date_added, today());
        assert_eq!(added.date_completed, None);

        let fetched = repo
            .get_book(added.id)
            .await
            .expect("Failed to get book")
            .expect("Book not found");
        assert_eq!(fetched, added);
    }

    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let repo = InMemoryBookRepository::default();
        let first = repo.add_book(NewBook::new("a", "b")).await.unwrap();
        assert!(repo.delete_book(first.id).await.unwrap());
        let second = repo.add_book(NewBook::new("a", "b")).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    /// Tests if list_books applies filters and skip/limit in insertion order
    async fn test_add_books_and_list_them() {
        let repo = InMemoryBookRepository::default();

        let list = repo
            .list_books(&BookFilter::default(), 0, 100)
            .await
            .expect("Failed to list books");
        assert_eq!(list, vec![]);

        let dune = repo
            .add_book(NewBook {
                genre: Some("scifi".to_string()),
                ..NewBook::new("Dune", "Frank Herbert")
            })
            .await
            .unwrap();
        let emma = repo
            .add_book(NewBook {
                genre: Some("classic".to_string()),
                status: ReadingStatus::Reading,
                ..NewBook::new("Emma", "Jane Austen")
            })
            .await
            .unwrap();
        let messiah = repo
            .add_book(NewBook {
                genre: Some("scifi".to_string()),
                status: ReadingStatus::Reading,
                ..NewBook::new("Messiah", "frank herbert")
            })
            .await
            .unwrap();

        let all = repo
            .list_books(&BookFilter::default(), 0, 100)
            .await
            .unwrap();
        assert_eq!(all, vec![dune.clone(), emma.clone(), messiah.clone()]);

        let paged = repo
            .list_books(&BookFilter::default(), 1, 1)
            .await
            .unwrap();
        assert_eq!(paged, vec![emma.clone()]);

        let scifi = BookFilter {
            genre: Some("scifi".to_string()),
            ..BookFilter::default()
        };
        assert_eq!(
            repo.list_books(&scifi, 0, 100).await.unwrap(),
            vec![dune.clone(), messiah.clone()]
        );
        assert_eq!(repo.count_books(&scifi).await.unwrap(), 2);

        let reading_herbert = BookFilter {
            status: Some(ReadingStatus::Reading),
            search: Some("HERBERT".to_string()),
            ..BookFilter::default()
        };
        assert_eq!(
            repo.list_books(&reading_herbert, 0, 100).await.unwrap(),
            vec![messiah]
        );
        assert_eq!(repo.count_books(&reading_herbert).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_books_by_status() {
        let repo = InMemoryBookRepository::default();
        assert!(repo.count_books_by_status().await.unwrap().is_empty());

        for status in [
            ReadingStatus::ToRead,
            ReadingStatus::ToRead,
            ReadingStatus::Finished,
        ] {
            repo.add_book(NewBook {
                status,
                ..NewBook::new("t", "a")
            })
            .await
            .unwrap();
        }

        let counts = repo.count_books_by_status().await.unwrap();
        assert_eq!(counts.get(&ReadingStatus::ToRead), Some(&2));
        assert_eq!(counts.get(&ReadingStatus::Finished), Some(&1));
        assert_eq!(counts.get(&ReadingStatus::Reading), None);
    }

    #[tokio::test]
    /// Tests that only supplied fields are patched and null clears nullable ones
    async fn test_add_book_patch_and_get_it() {
        let repo = InMemoryBookRepository::default();
        let not_existing_book = 2000;
        let result = repo
            .update_book(not_existing_book, BookPatch::default())
            .await
            .expect("Failed to update");
        assert_eq!(result, None);

        let added = repo
            .add_book(NewBook {
                genre: Some("scifi".to_string()),
                notes: Some("reread".to_string()),
                ..NewBook::new("xx", "sss")
            })
            .await
            .expect("Failed to add book");

        let patch_title_only = BookPatch {
            title: Some("patchedTitle".to_string()),
            ..BookPatch::default()
        };
        let patched = repo
            .update_book(added.id, patch_title_only)
            .await
            .expect("Failed to patch")
            .expect("Book not found");
        assert_eq!(patched.title, "patchedTitle");
        assert_eq!(patched.genre, Some("scifi".to_string()));
        assert_eq!(patched.notes, Some("reread".to_string()));

        let finished_on = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let patch_all_fields = BookPatch {
            title: Some("t".to_string()),
            author: Some("a".to_string()),
            genre: Some(None),
            status: Some(ReadingStatus::Finished),
            rating: Some(Some(3.0)),
            notes: Some(None),
            date_completed: Some(Some(finished_on)),
        };
        let patched = repo
            .update_book(added.id, patch_all_fields)
            .await
            .expect("Failed to patch")
            .expect("Book not found");

        assert_eq!(patched.id, added.id);
        assert_eq!(patched.date_added, added.date_added);
        assert_eq!(patched.title, "t");
        assert_eq!(patched.author, "a");
        assert_eq!(patched.genre, None);
        assert_eq!(patched.status, ReadingStatus::Finished);
        assert_eq!(patched.rating, Some(3.0));
        assert_eq!(patched.notes, None);
        assert_eq!(patched.date_completed, Some(finished_on));
        assert_eq!(repo.get_book(added.id).await.unwrap(), Some(patched));
    }

    #[tokio::test]
    async fn test_delete_book() {
        let repo = InMemoryBookRepository::default();
        assert!(!repo.delete_book(1).await.unwrap());

        let added = repo.add_book(NewBook::new("Dune", "Herbert")).await.unwrap();
        assert!(repo.delete_book(added.id).await.unwrap());
        assert_eq!(repo.get_book(added.id).await.unwrap(), None);
        assert!(!repo.delete_book(added.id).await.unwrap());
    }
}
