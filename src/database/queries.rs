//! Named SQL statements, loaded once at startup.
//!
//! The resource is a flat JSON object of `resource key -> SQL text`. Parameter
//! order for each statement is fixed by [`SqlQuery`]; an override file has to
//! bind the same parameters in the same order.

use crate::error::{Result, WikiDbError};
use derive_more::Display;
use std::collections::HashMap;
use std::path::PathBuf;

const BUNDLED_QUERIES: &str = include_str!("../../resources/db-queries.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SqlQuery {
    /// no parameters
    #[display("sql.create.db")]
    CreatePagesTable,
    /// no parameters, column 0 is the title
    #[display("sql.page.get.all")]
    AllPages,
    /// (title), columns are (id, content)
    #[display("sql.page.get.one")]
    GetPage,
    /// (title, content)
    #[display("sql.page.create")]
    CreatePage,
    /// (content, id)
    #[display("sql.page.update")]
    SavePage,
    /// (id)
    #[display("sql.page.delete")]
    DeletePage,
}

impl SqlQuery {
    pub const ALL: [SqlQuery; 6] = [
        SqlQuery::CreatePagesTable,
        SqlQuery::AllPages,
        SqlQuery::GetPage,
        SqlQuery::CreatePage,
        SqlQuery::SavePage,
        SqlQuery::DeletePage,
    ];

    pub fn resource_key(self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySource {
    Bundled,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct QueryCatalog {
    queries: HashMap<SqlQuery, String>,
}

impl QueryCatalog {
    pub fn load(source: &QuerySource) -> Result<Self> {
        let raw = match source {
            QuerySource::Bundled => BUNDLED_QUERIES.to_string(),
            QuerySource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                WikiDbError::Configuration(format!(
                    "Unable to read SQL queries from {}: {}",
                    path.display(),
                    e
                ))
            })?,
        };

        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut entries: HashMap<String, String> = serde_json::from_str(raw).map_err(|e| {
            WikiDbError::Configuration(format!("Malformed SQL queries resource: {}", e))
        })?;

        let mut queries = HashMap::with_capacity(SqlQuery::ALL.len());
        for query in SqlQuery::ALL {
            let key = query.resource_key();
            let sql = entries
                .remove(&key)
                .filter(|sql| !sql.trim().is_empty())
                .ok_or_else(|| {
                    WikiDbError::Configuration(format!("Missing SQL query for key {}", key))
                })?;
            queries.insert(query, sql);
        }

        Ok(Self { queries })
    }

    pub fn get(&self, query: SqlQuery) -> &str {
        // every key is checked in from_json
        self.queries
            .get(&query)
            .map(String::as_str)
            .unwrap_or_default()
    }
}
