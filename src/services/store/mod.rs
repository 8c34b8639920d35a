/// Record store abstraction
///
/// The movie list lives in an external document database. The catalog builder
/// and the watch-state toggle only talk to it through this trait, so the
/// Notion client can be swapped for an in-memory store in tests.
use crate::{
    error::AppResult,
    models::{MovieId, NotionPage, QueryResponse},
};

pub mod notion;

pub use notion::NotionStore;

/// One page of unwatched records
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub records: Vec<NotionPage>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl From<QueryResponse> for RecordPage {
    fn from(response: QueryResponse) -> Self {
        Self {
            records: response.results,
            has_more: response.has_more,
            next_cursor: response.next_cursor,
        }
    }
}

/// Trait for the external movie record store
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one page of records whose watched flag is false.
    ///
    /// `cursor` is `None` for the first page and the previous page's
    /// `next_cursor` afterwards.
    async fn query_unwatched(&self, cursor: Option<String>) -> AppResult<RecordPage>;

    /// Persist the watched flag of a single record
    async fn set_watched(&self, id: &MovieId, watched: bool) -> AppResult<()>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}
