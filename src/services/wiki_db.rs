use crate::bus::EventBus;
use crate::config::WikiDbConfig;
use crate::database::pool::{ConnectionPool, PoolStats};
use crate::database::queries::QueryCatalog;
use crate::database::sqlite::SqliteRepository;
use crate::error::Result;
use crate::features::pages::Dispatcher;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A running wiki database service: one pool, `instances` dispatchers on the
/// same bus address.
pub struct WikiDbService {
    address: String,
    pool: ConnectionPool,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl WikiDbService {
    /// Boots the service. Every step has to succeed before any consumer is
    /// registered, so a failed start leaves nothing listening on the bus.
    pub async fn start(config: &WikiDbConfig, bus: &EventBus) -> Result<Self> {
        info!("Loading SQL queries");
        let queries = QueryCatalog::load(&config.query_source())
            .inspect_err(|e| error!(error = %e, "Could not load SQL queries"))?;

        let pool = ConnectionPool::open(config)
            .await
            .inspect_err(|e| error!(error = %e, "Could not open the connection pool"))?;

        let repo = SqliteRepository::new(pool.clone(), Arc::new(queries));
        if let Err(e) = repo.ensure_schema().await {
            pool.close().await;
            return Err(e);
        }

        let repo = Arc::new(repo);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let instances = config.instances.max(1);
        let workers = (0..instances)
            .map(|_| {
                let consumer = bus.consumer(&config.queue_address);
                Dispatcher::new(repo.clone()).spawn(consumer, shutdown_rx.clone())
            })
            .collect();

        info!(
            address = %config.queue_address,
            instances,
            "Wiki database service ready"
        );

        Ok(Self {
            address: config.queue_address.clone(),
            pool,
            shutdown,
            workers,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Stops listening, then closes the pool. Requests already handed to a
    /// dispatcher may still finish while the pool drains.
    pub async fn shutdown(self) {
        info!(address = %self.address, "Shutting down wiki database service");
        let _ = self.shutdown.send(true);

        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Dispatcher task ended abnormally");
            }
        }

        self.pool.close().await;
    }
}
