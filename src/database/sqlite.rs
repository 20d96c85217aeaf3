use crate::database::pool::ConnectionPool;
use crate::database::queries::{QueryCatalog, SqlQuery};
use crate::database::PageRepository;
use crate::error::Result;
use crate::features::pages::model::{DbPage, PageLookup};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct SqliteRepository {
    pool: ConnectionPool,
    queries: Arc<QueryCatalog>,
}

impl SqliteRepository {
    pub fn new(pool: ConnectionPool, queries: Arc<QueryCatalog>) -> Self {
        Self { pool, queries }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Runs the create-table statement. Safe against an initialized database.
    pub async fn ensure_schema(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.inspect_err(|e| {
            error!(error = %e, "Could not open a database connection");
        })?;

        sqlx::query(self.queries.get(SqlQuery::CreatePagesTable))
            .execute(&mut *conn)
            .await
            .inspect_err(|e| error!(error = %e, "Database preparation error"))?;

        info!("Database schema ready");
        Ok(())
    }

    async fn execute_write(&self, query: SqlQuery, run: WriteParams<'_>) -> Result<u64> {
        let mut conn = self.pool.acquire().await.inspect_err(|e| log_failure(query, e))?;

        let statement = sqlx::query(self.queries.get(query));
        let statement = match run {
            WriteParams::Create { title, content } => statement.bind(title).bind(content),
            WriteParams::Save { id, content } => statement.bind(content).bind(id),
            WriteParams::Delete { id } => statement.bind(id),
        };

        let result = statement
            .execute(&mut *conn)
            .await
            .inspect_err(|e| log_failure(query, e))?;

        debug!(%query, rows_affected = result.rows_affected(), "Statement executed");
        Ok(result.rows_affected())
    }
}

// bindings for the three write statements, in the order SqlQuery documents
enum WriteParams<'a> {
    Create {
        title: Option<&'a str>,
        content: Option<&'a str>,
    },
    Save {
        id: i64,
        content: Option<&'a str>,
    },
    Delete {
        id: i64,
    },
}

fn log_failure(query: SqlQuery, cause: &dyn std::fmt::Display) {
    error!(%query, error = %cause, "Database query error");
}

#[async_trait]
impl PageRepository for SqliteRepository {
    async fn fetch_all_titles(&self) -> Result<Vec<String>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .inspect_err(|e| log_failure(SqlQuery::AllPages, e))?;

        let rows = sqlx::query_as::<_, (String,)>(self.queries.get(SqlQuery::AllPages))
            .fetch_all(&mut *conn)
            .await
            .inspect_err(|e| log_failure(SqlQuery::AllPages, e))?;

        let mut titles: Vec<String> = rows.into_iter().map(|(title,)| title).collect();
        titles.sort();

        Ok(titles)
    }

    async fn fetch_page(&self, title: Option<&str>) -> Result<PageLookup> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .inspect_err(|e| log_failure(SqlQuery::GetPage, e))?;

        // fetch_optional keeps the first row when several pages share a title
        let row = sqlx::query_as::<_, (i64, String)>(self.queries.get(SqlQuery::GetPage))
            .bind(title)
            .fetch_optional(&mut *conn)
            .await
            .inspect_err(|e| log_failure(SqlQuery::GetPage, e))?;

        Ok(row.map(|(id, content)| DbPage { id, content }).into())
    }

    async fn create_page(&self, title: Option<&str>, content: Option<&str>) -> Result<()> {
        self.execute_write(SqlQuery::CreatePage, WriteParams::Create { title, content })
            .await?;
        Ok(())
    }

    async fn save_page(&self, id: i64, content: Option<&str>) -> Result<()> {
        // zero rows affected is not reported, the caller gets the same ack
        self.execute_write(SqlQuery::SavePage, WriteParams::Save { id, content })
            .await?;
        Ok(())
    }

    async fn delete_page(&self, id: i64) -> Result<()> {
        self.execute_write(SqlQuery::DeletePage, WriteParams::Delete { id })
            .await?;
        Ok(())
    }
}
