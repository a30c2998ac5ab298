use std::collections::HashMap;

use anyhow::Context;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row, Statement};

use crate::api::{Book, BookId, BookPatch, NewBook, ReadingStatus};
use crate::books_repository::BookRepositoryError::Other;
use crate::books_repository::{today, BookFilter, BookRepository, BookRepositoryError};

const BOOK_COLUMNS: &str =
    "id, title, author, genre, status, rating, notes, date_added, date_completed";

/// Owns the single connection for the lifetime of the service.
/// The background connection task finishes once the client is dropped.
pub struct PostgresBooksRepository {
    client: Client,
}

pub struct PostgresBooksRepositoryConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl PostgresBooksRepository {
    pub async fn init(config: PostgresBooksRepositoryConfig) -> anyhow::Result<Self> {
        tracing::info!(
            "Connecting to postgres at {} as {} (database {})",
            config.hostname,
            config.username,
            config.database
        );
        let connection_str = format!(
            "postgresql://{}:{}@{}/{}",
            config.username, config.password, config.hostname, config.database
        );
        let (client, connection) = tokio_postgres::connect(&connection_str, NoTls)
            .await
            .context("Failed to start postgres")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Postgres connection error: {}", e);
            }
        });

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS books (
            id              SERIAL PRIMARY KEY,
            title           TEXT NOT NULL,
            author          TEXT NOT NULL,
            genre           TEXT,
            status          TEXT NOT NULL DEFAULT 'to_read',
            rating          DOUBLE PRECISION,
            notes           TEXT,
            date_added      DATE NOT NULL DEFAULT CURRENT_DATE,
            date_completed  DATE
            );
        CREATE INDEX IF NOT EXISTS books_title_idx ON books (title);
        CREATE INDEX IF NOT EXISTS books_author_idx ON books (author);
        ",
            )
            .await
            .context("Failed to setup table")?;
        Ok(Self { client })
    }
}

/// Positional query parameters, numbered in the order they are pushed
#[derive(Default)]
struct SqlParams {
    values: Vec<Box<dyn ToSql + Sync + Send>>,
}

impl SqlParams {
    /// Stores the value and returns its placeholder, e.g. `$3`
    fn push<T: ToSql + Sync + Send + 'static>(&mut self, value: T) -> String {
        self.values.push(Box::new(value));
        format!("${}", self.values.len())
    }

    fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values
            .iter()
            .map(|value| value.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }
}

fn where_clause(filter: &BookFilter, params: &mut SqlParams) -> String {
    let mut conditions = Vec::new();
    if let Some(status) = filter.status {
        conditions.push(format!("status = {}", params.push(status.as_str())));
    }
    if let Some(genre) = &filter.genre {
        conditions.push(format!("genre = {}", params.push(genre.clone())));
    }
    if let Some(search) = &filter.search {
        // position() instead of ILIKE so that % and _ in the search term match literally
        let placeholder = params.push(search.clone());
        conditions.push(format!(
            "(position(lower({0}::text) in lower(title)) > 0 OR position(lower({0}::text) in lower(author)) > 0)",
            placeholder
        ));
    }
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn parse_status(status: &str) -> Result<ReadingStatus, BookRepositoryError> {
    status
        .parse()
        .map_err(|err| Other(format!("Invalid stored status: {}", err)))
}

fn book_from_row(row: &Row) -> Result<Book, BookRepositoryError> {
    let status: String = row.try_get("status")?;
    Ok(Book {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        genre: row.try_get("genre")?,
        status: parse_status(&status)?,
        rating: row.try_get("rating")?,
        notes: row.try_get("notes")?,
        date_added: row.try_get("date_added")?,
        date_completed: row.try_get("date_completed")?,
    })
}

#[async_trait::async_trait]
impl BookRepository for PostgresBooksRepository {
    async fn add_book(&self, book: NewBook) -> Result<Book, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "INSERT INTO books (title, author, genre, status, rating, notes, date_completed, date_added) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
                BOOK_COLUMNS
            ))
            .await?;

        let rows = self
            .client
            .query(
                &stmt,
                &[
                    &book.title,
                    &book.author,
                    &book.genre,
                    &book.status.as_str(),
                    &book.rating,
                    &book.notes,
                    &book.date_completed,
                    &today(),
                ],
            )
            .await?;

        book_from_row(
            rows.first()
                .ok_or_else(|| Other("Book not returned".to_string()))?,
        )
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!("SELECT {} FROM books WHERE id = ($1)", BOOK_COLUMNS))
            .await?;

        let rows = self.client.query(&stmt, &[&book_id]).await?;

        rows.first().map(book_from_row).transpose()
    }

    async fn list_books(
        &self,
        filter: &BookFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Book>, BookRepositoryError> {
        let mut params = SqlParams::default();
        let where_clause = where_clause(filter, &mut params);
        let offset = params.push(to_i64(skip));
        let limit = params.push(to_i64(limit));
        let query = format!(
            "SELECT {} FROM books{} ORDER BY id OFFSET {} LIMIT {}",
            BOOK_COLUMNS, where_clause, offset, limit
        );

        let rows = self.client.query(query.as_str(), &params.as_refs()).await?;

        rows.iter().map(book_from_row).collect()
    }

    async fn count_books(&self, filter: &BookFilter) -> Result<u64, BookRepositoryError> {
        let mut params = SqlParams::default();
        let query = format!(
            "SELECT COUNT(*) FROM books{}",
            where_clause(filter, &mut params)
        );

        let row = self.client.query_one(query.as_str(), &params.as_refs()).await?;
        let count: i64 = row.try_get(0)?;
        Ok(count as u64)
    }

    async fn count_books_by_status(
        &self,
    ) -> Result<HashMap<ReadingStatus, u64>, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("SELECT status, COUNT(*) FROM books GROUP BY status")
            .await?;

        let rows = self.client.query(&stmt, &[]).await?;

        let mut counts = HashMap::new();
        for row in rows {
            let status: String = row.try_get(0)?;
            let count: i64 = row.try_get(1)?;
            *counts.entry(parse_status(&status)?).or_insert(0) += count as u64;
        }
        Ok(counts)
    }

    async fn update_book(
        &self,
        book_id: BookId,
        patch: BookPatch,
    ) -> Result<Option<Book>, BookRepositoryError> {
        let mut params = SqlParams::default();
        let mut assignments = Vec::new();
        if let Some(title) = patch.title {
            assignments.push(format!("title = {}", params.push(title)));
        }
        if let Some(author) = patch.author {
            assignments.push(format!("author = {}", params.push(author)));
        }
        if let Some(genre) = patch.genre {
            assignments.push(format!("genre = {}", params.push(genre)));
        }
        if let Some(status) = patch.status {
            assignments.push(format!("status = {}", params.push(status.as_str())));
        }
        if let Some(rating) = patch.rating {
            assignments.push(format!("rating = {}", params.push(rating)));
        }
        if let Some(notes) = patch.notes {
            assignments.push(format!("notes = {}", params.push(notes)));
        }
        if let Some(date_completed) = patch.date_completed {
            assignments.push(format!("date_completed = {}", params.push(date_completed)));
        }

        if assignments.is_empty() {
            return self.get_book(book_id).await;
        }

        let query = format!(
            "UPDATE books SET {} WHERE id = {} RETURNING {}",
            assignments.join(", "),
            params.push(book_id),
            BOOK_COLUMNS
        );

        let rows = self.client.query(query.as_str(), &params.as_refs()).await?;
        rows.first().map(book_from_row).transpose()
    }

    async fn delete_book(&self, book_id: BookId) -> Result<bool, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("DELETE FROM books WHERE id = ($1)")
            .await?;

        let removed = self.client.execute(&stmt, &[&book_id]).await?;
        Ok(removed > 0)
    }
}
