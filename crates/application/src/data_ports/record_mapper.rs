use async_trait::async_trait;
use breeze_core::AppResult;
use breeze_domain::{Page, PageRequest, Record};

use super::FinalQuery;

/// Generic data mapper executing rewritten queries.
#[async_trait]
pub trait RecordMapper: Send + Sync {
    /// Returns one page of rows matching the query's where clause, ordered by id.
    async fn select_page(&self, query: &FinalQuery, page: PageRequest) -> AppResult<Page<Record>>;
}
