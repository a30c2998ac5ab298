use anyhow::{bail, Context};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use reqwest_tracing::TracingMiddleware;

use crate::api::{Book, BookId, BookPatch, ListBooksQuery, NewBook, ReadingStats};

const MAX_RETRIES: u32 = 3;

pub struct BookshelfClient {
    url: String,
    client: ClientWithMiddleware,
}

impl BookshelfClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);
        let client = ClientBuilder::new(reqwest_client)
            // Insert the tracing middleware
            .with(TracingMiddleware::default())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Calls POST /books/ endpoint
    /// Returns the stored book with its assigned id and date_added
    pub async fn create_book(&self, new_book: &NewBook) -> anyhow::Result<Book> {
        let response = self
            .client
            .post(format!("{}/books/", self.url))
            .json(new_book)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            bail!("Failed to create book {}", error)
        }
        response.json().await.context("Failed to parse book")
    }

    /// Calls GET /books/ endpoint with the query as url parameters
    pub async fn list_books(&self, query: &ListBooksQuery) -> anyhow::Result<Vec<Book>> {
        let response = self
            .client
            .get(format!("{}/books/", self.url))
            .query(query)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error = response.text().await.unwrap_or_default();
            bail!("Failed to list books {}", error)
        }
    }

    /// Calls GET /books/{book_id} endpoint
    /// Returns None if the book is not in the collection
    pub async fn get_book(&self, book_id: BookId) -> anyhow::Result<Option<Book>> {
        let response = self
            .client
            .get(format!("{}/books/{}", self.url, book_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            let error = response.text().await.unwrap_or_default();
            bail!("Failed to get book {}", error)
        }
    }

    /// Calls PUT /books/{book_id} endpoint
    /// Returns the updated book or None if the book is not in the collection
    pub async fn update_book(
        &self,
        book_id: BookId,
        patch: &BookPatch,
    ) -> anyhow::Result<Option<Book>> {
        let response = self
            .client
            .put(format!("{}/books/{}", self.url, book_id))
            .json(patch)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            let error = response.text().await.unwrap_or_default();
            bail!("Failed to update book {}", error)
        }
    }

    /// Calls DELETE /books/{book_id} endpoint
    /// Returns true if the book was removed and false if it was not found
    pub async fn delete_book(&self, book_id: BookId) -> anyhow::Result<bool> {
        let response = self
            .client
            .delete(format!("{}/books/{}", self.url, book_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(false)
        } else if response.status().is_success() {
            Ok(true)
        } else {
            let error = response.text().await.unwrap_or_default();
            bail!("Failed to delete book {}", error)
        }
    }

    /// Calls GET /books/stats/reading endpoint
    pub async fn reading_stats(&self) -> anyhow::Result<ReadingStats> {
        let response = self
            .client
            .get(format!("{}/books/stats/reading", self.url))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error = response.text().await.unwrap_or_default();
            bail!("Failed to get reading stats {}", error)
        }
    }
}
