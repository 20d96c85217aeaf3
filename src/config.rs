use crate::database::queries::QuerySource;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_QUEUE_ADDRESS: &str = "wikidb.queue";

#[derive(Clone, Debug)]
pub struct WikiDbConfig {
    pub database_url: String,
    pub database_driver: String,
    pub max_pool_size: u32,
    pub acquire_timeout: Duration,
    pub sql_queries_file: Option<PathBuf>,
    pub queue_address: String,
    pub instances: usize,
}

impl Default for WikiDbConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://db/wiki.db".to_string(),
            database_driver: "sqlite".to_string(),
            max_pool_size: 30,
            acquire_timeout: Duration::from_secs(30),
            sql_queries_file: None,
            queue_address: DEFAULT_QUEUE_ADDRESS.to_string(),
            instances: 1,
        }
    }
}

impl WikiDbConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let database_url = std::env::var("DATABASE_URL").unwrap_or(defaults.database_url);

        let database_driver =
            std::env::var("DATABASE_DRIVER").unwrap_or(defaults.database_driver);

        let max_pool_size = std::env::var("MAX_POOL_SIZE")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(defaults.max_pool_size);

        let acquire_timeout = std::env::var("POOL_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.acquire_timeout);

        // an empty value means "use the bundled queries"
        let sql_queries_file = std::env::var("SQL_QUERIES_FILE")
            .ok()
            .filter(|val| !val.trim().is_empty())
            .map(PathBuf::from);

        let queue_address = std::env::var("WIKIDB_QUEUE").unwrap_or(defaults.queue_address);

        let instances = std::env::var("WIKIDB_INSTANCES")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(defaults.instances)
            .max(1);

        Self {
            database_url,
            database_driver,
            max_pool_size,
            acquire_timeout,
            sql_queries_file,
            queue_address,
            instances,
        }
    }

    /// In-memory SQLite with a single connection, so every statement sees the
    /// same database.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_pool_size: 1,
            ..Self::default()
        }
    }

    pub fn query_source(&self) -> QuerySource {
        match &self.sql_queries_file {
            Some(path) => QuerySource::File(path.clone()),
            None => QuerySource::Bundled,
        }
    }
}
