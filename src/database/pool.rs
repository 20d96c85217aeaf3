use crate::config::WikiDbConfig;
use crate::error::{Result, WikiDbError};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteConnection, SqlitePoolOptions};
use sqlx::Pool;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const SUPPORTED_DRIVER: &str = "sqlite";

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Snapshot of how many connections were handed out and given back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub acquired: u64,
    pub released: u64,
}

impl PoolStats {
    pub fn in_use(&self) -> u64 {
        // snapshots taken under load may see a release before its acquire
        self.acquired.saturating_sub(self.released)
    }
}

// sqlx::Pool is already reference counted, cloning shares the same slots
#[derive(Clone)]
pub struct ConnectionPool {
    pool: Pool<Sqlite>,
    counters: Arc<Counters>,
}

impl ConnectionPool {
    pub async fn open(config: &WikiDbConfig) -> Result<Self> {
        if !config.database_driver.eq_ignore_ascii_case(SUPPORTED_DRIVER) {
            return Err(WikiDbError::Configuration(format!(
                "Unsupported database driver {}, only {} is available",
                config.database_driver, SUPPORTED_DRIVER
            )));
        }

        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| {
                WikiDbError::Configuration(format!(
                    "Invalid database url {}: {}",
                    config.database_url, e
                ))
            })?
            .create_if_missing(true);

        // sqlite creates the file but not the directory it lives in
        if let Some(parent) = options
            .get_filename()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                WikiDbError::Configuration(format!(
                    "Unable to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_pool_size.max(1))
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(WikiDbError::Connection)?;

        info!(
            url = %config.database_url,
            max_pool_size = config.max_pool_size,
            "Opened connection pool"
        );

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Hands out a connection that goes back to the pool when the returned
    /// guard is dropped.
    pub async fn acquire(&self) -> Result<ScopedConnection> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(WikiDbError::Connection)?;

        self.counters.acquired.fetch_add(1, Ordering::SeqCst);

        Ok(ScopedConnection {
            conn,
            counters: self.counters.clone(),
        })
    }

    pub fn stats(&self) -> PoolStats {
        // released first, a release never outruns the acquire it follows
        let released = self.counters.released.load(Ordering::SeqCst);
        let acquired = self.counters.acquired.load(Ordering::SeqCst);
        PoolStats { acquired, released }
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Waits for checked out connections to come back, then closes them.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed connection pool");
    }
}

pub struct ScopedConnection {
    conn: PoolConnection<Sqlite>,
    counters: Arc<Counters>,
}

impl Deref for ScopedConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        &self.conn
    }
}

impl DerefMut for ScopedConnection {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        // the PoolConnection field returns the slot right after this runs
        let released = self.counters.released.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(released, "Released pooled connection");
    }
}
