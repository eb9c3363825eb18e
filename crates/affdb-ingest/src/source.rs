use affdb_core::SourceNetwork;
use async_trait::async_trait;

use crate::error::SourceError;
use crate::normalize::RawItem;

/// One page of raw records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<RawItem>,
    pub has_more: bool,
    /// Cursor for the following page. Page-number clients encode the next
    /// page number here.
    pub next_cursor: Option<String>,
}

/// A paged affiliate catalog.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Registry name of the source, used in logs and summaries.
    fn name(&self) -> &str;

    fn network(&self) -> SourceNetwork;

    /// Fetches the page at `cursor`, or the first page when `None`.
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, SourceError>;
}
