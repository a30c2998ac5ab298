use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Deserializer, Serialize};

pub type BookId = i32;

pub const DEFAULT_LIST_LIMIT: u64 = 100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
/// Reading progress of a book.
/// `finished` is the completion status; `completed` is accepted on input as its alias.
pub enum ReadingStatus {
    #[default]
    ToRead,
    Reading,
    Finished,
    Abandoned,
}

impl ReadingStatus {
    pub const ALL: [ReadingStatus; 4] = [
        ReadingStatus::ToRead,
        ReadingStatus::Reading,
        ReadingStatus::Finished,
        ReadingStatus::Abandoned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::ToRead => "to_read",
            ReadingStatus::Reading => "reading",
            ReadingStatus::Finished => "finished",
            ReadingStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown reading status {0}")]
pub struct UnknownReadingStatus(pub String);

impl FromStr for ReadingStatus {
    type Err = UnknownReadingStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "to_read" => Ok(ReadingStatus::ToRead),
            "reading" => Ok(ReadingStatus::Reading),
            "finished" | "completed" => Ok(ReadingStatus::Finished),
            "abandoned" => Ok(ReadingStatus::Abandoned),
            other => Err(UnknownReadingStatus(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for ReadingStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(|_| {
            serde::de::Error::unknown_variant(
                &value,
                &["to_read", "reading", "finished", "abandoned"],
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Apiv2Schema)]
/// A book record as persisted in the collection
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub status: ReadingStatus,
    pub rating: Option<f64>,
    pub notes: Option<String>,
    pub date_added: NaiveDate,
    pub date_completed: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Apiv2Schema)]
/// Body of a create request. Id and date_added are assigned by the store.
pub struct NewBook {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub status: ReadingStatus,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub date_completed: Option<NaiveDate>,
}

impl NewBook {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            genre: None,
            status: ReadingStatus::default(),
            rating: None,
            notes: None,
            date_completed: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Apiv2Schema)]
/// Partial update of a book. Absent fields are left untouched.
/// For nullable fields `Some(None)` (an explicit `null`) clears the value.
/// Serializes to a JSON merge patch.
pub struct BookPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub genre: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReadingStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub rating: Option<Option<f64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub notes: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub date_completed: Option<Option<NaiveDate>>,
}

// Only called when the key is present, so `null` becomes Some(None)
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
/// Query parameters of the list endpoint
pub struct ListBooksQuery {
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_list_limit")]
    pub limit: u64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_status_filter"
    )]
    pub status: Option<ReadingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// Case-insensitive substring matched against title or author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

// `?status=` arrives as an empty string and means no status filter
fn deserialize_status_filter<'de, D>(deserializer: D) -> Result<Option<ReadingStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref() {
        None | Some("") => Ok(None),
        Some(status) => status
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn default_list_limit() -> u64 {
    DEFAULT_LIST_LIMIT
}

impl Default for ListBooksQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIST_LIMIT,
            status: None,
            genre: None,
            search: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct ReadingStats {
    pub total_books: u64,
    pub completed_books: u64,
    pub to_read_books: u64,
    pub reading_books: u64,
    /// Percentage of finished books, rounded to 2 decimal places
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
pub struct ErrorDetail {
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
pub struct EndpointPaths {
    pub books: String,
    pub reading_stats: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
/// Payload of the service root
pub struct WelcomeResponse {
    pub message: String,
    pub docs: String,
    pub endpoints: EndpointPaths,
}

#[cfg(test)]
mod api_tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use crate::api::{BookPatch, ListBooksQuery, NewBook, ReadingStatus};

    #[test]
    fn test_new_book_defaults() {
        let new_book: NewBook =
            serde_json::from_value(json!({"title": "Dune", "author": "Herbert"})).unwrap();
        assert_eq!(new_book, NewBook::new("Dune", "Herbert"));
        assert_eq!(new_book.status, ReadingStatus::ToRead);
    }

    #[test]
    fn test_new_book_requires_title_and_author() {
        assert!(serde_json::from_value::<NewBook>(json!({"title": "Dune"})).is_err());
        assert!(serde_json::from_value::<NewBook>(json!({"author": "Herbert"})).is_err());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result = serde_json::from_value::<NewBook>(
            json!({"title": "Dune", "author": "Herbert", "status": "lost"}),
        );
        assert!(result.is_err());
    }

    #[test]
    /// "completed" never was a declared status but is the value clients send to mark completion
    fn test_completed_is_accepted_as_alias_of_finished() {
        let status: ReadingStatus = serde_json::from_value(json!("completed")).unwrap();
        assert_eq!(status, ReadingStatus::Finished);
        assert_eq!(serde_json::to_value(status).unwrap(), json!("finished"));
    }

    #[test]
    fn test_patch_distinguishes_absent_from_null() {
        let patch: BookPatch =
            serde_json::from_value(json!({"genre": null, "rating": 4.5})).unwrap();
        assert_eq!(patch.title, None);
        assert_eq!(patch.genre, Some(None));
        assert_eq!(patch.rating, Some(Some(4.5)));
        assert_eq!(patch.notes, None);

        // serialized form is a merge patch: null clears, missing keys stay untouched
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"genre": null, "rating": 4.5})
        );
    }

    #[test]
    fn test_patch_with_date_completed() {
        let patch: BookPatch =
            serde_json::from_value(json!({"date_completed": "2024-03-01"})).unwrap();
        assert_eq!(
            patch.date_completed,
            Some(NaiveDate::from_ymd_opt(2024, 3, 1))
        );
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListBooksQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(query, ListBooksQuery::default());
        assert_eq!(query.limit, 100);
        assert_eq!(query.skip, 0);
    }
}
