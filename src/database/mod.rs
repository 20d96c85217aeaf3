use crate::error::Result;
use crate::features::pages::model::PageLookup;
use async_trait::async_trait;

pub mod pool;
pub mod queries;
pub mod sqlite;

// a PageRepository is shared between every dispatcher instance
// each operation runs exactly one statement on its own scoped connection
// title/content are optional so that incomplete requests fail in the database
// rather than being validated here
#[async_trait]
pub trait PageRepository: Send + Sync {
    /// Every page title, sorted ascending.
    async fn fetch_all_titles(&self) -> Result<Vec<String>>;
    async fn fetch_page(&self, title: Option<&str>) -> Result<PageLookup>;

    // write operations, all acknowledge even when no row was touched
    async fn create_page(&self, title: Option<&str>, content: Option<&str>) -> Result<()>;
    async fn save_page(&self, id: i64, content: Option<&str>) -> Result<()>;
    async fn delete_page(&self, id: i64) -> Result<()>;
}
