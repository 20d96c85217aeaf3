use crate::config::WikiDbConfig;
use crate::database::pool::{ConnectionPool, PoolStats};
use crate::database::queries::{QueryCatalog, QuerySource};
use crate::database::sqlite::SqliteRepository;
use crate::database::PageRepository;
use crate::error::WikiDbError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

// create a sqlite database in memory to test against, with the schema in place
pub async fn setup_test_db() -> SqliteRepository {
    setup_test_db_with(WikiDbConfig::in_memory()).await
}

pub async fn setup_test_db_with(config: WikiDbConfig) -> SqliteRepository {
    let pool = ConnectionPool::open(&config)
        .await
        .expect("Failed to create in-memory database");

    let queries = QueryCatalog::load(&QuerySource::Bundled).expect("Bundled queries should load");

    let repo = SqliteRepository::new(pool, Arc::new(queries));
    repo.ensure_schema()
        .await
        .expect("Failed to create pages schema");
    repo
}

// test the database's ability to save and retrieve pages
#[tokio::test]
async fn test_sqlite_create_and_fetch() {
    let repo = setup_test_db().await;

    repo.create_page(Some("Test"), Some("Some content"))
        .await
        .expect("Should create page");

    let lookup = repo.fetch_page(Some("Test")).await.expect("Should query");

    assert!(lookup.found);
    assert!(lookup.id.is_some());
    assert_eq!(lookup.raw_content.as_deref(), Some("Some content"));
}

#[tokio::test]
async fn test_sqlite_fetch_missing_page() {
    let repo = setup_test_db().await;

    let lookup = repo.fetch_page(Some("Nowhere")).await.expect("Should query");

    assert!(!lookup.found);
    assert_eq!(lookup.id, None);
    assert_eq!(lookup.raw_content, None);
}

// titles come back sorted, not in insertion order
#[tokio::test]
async fn test_sqlite_titles_are_sorted() {
    let repo = setup_test_db().await;

    for title in ["Zebra", "Apple", "Mango"] {
        repo.create_page(Some(title), Some("x")).await.unwrap();
    }

    let titles = repo.fetch_all_titles().await.unwrap();
    assert_eq!(titles, vec!["Apple", "Mango", "Zebra"]);
}

// test the database's ability to update a page
#[tokio::test]
async fn test_sqlite_save_updates_content() {
    let repo = setup_test_db().await;
    repo.create_page(Some("Test"), Some("Some content"))
        .await
        .unwrap();
    let id = repo.fetch_page(Some("Test")).await.unwrap().id.unwrap();

    repo.save_page(id, Some("Yo!")).await.unwrap();
    // saving the same content again changes nothing
    repo.save_page(id, Some("Yo!")).await.unwrap();

    let lookup = repo.fetch_page(Some("Test")).await.unwrap();
    assert_eq!(lookup.id, Some(id));
    assert_eq!(lookup.raw_content.as_deref(), Some("Yo!"));
    assert_eq!(repo.fetch_all_titles().await.unwrap(), vec!["Test"]);
}

// writes against ids that do not exist are still acknowledged
#[tokio::test]
async fn test_sqlite_missing_id_is_acknowledged() {
    let repo = setup_test_db().await;

    repo.save_page(4242, Some("ghost")).await.expect("Save should ack");
    repo.delete_page(4242).await.expect("Delete should ack");

    assert!(repo.fetch_all_titles().await.unwrap().is_empty());
}

// test that the database will delete pages properly
#[tokio::test]
async fn test_sqlite_delete() {
    let repo = setup_test_db().await;
    repo.create_page(Some("Keep"), Some("a")).await.unwrap();
    repo.create_page(Some("Drop"), Some("b")).await.unwrap();
    let id = repo.fetch_page(Some("Drop")).await.unwrap().id.unwrap();

    repo.delete_page(id).await.unwrap();

    let titles = repo.fetch_all_titles().await.unwrap();
    assert_eq!(titles, vec!["Keep"]);
    assert!(!repo.fetch_page(Some("Drop")).await.unwrap().found);
}

// titles are not unique, the oldest page wins a lookup
#[tokio::test]
async fn test_sqlite_duplicate_titles_return_first_row() {
    let repo = setup_test_db().await;
    repo.create_page(Some("Twin"), Some("first")).await.unwrap();
    repo.create_page(Some("Twin"), Some("second")).await.unwrap();

    let lookup = repo.fetch_page(Some("Twin")).await.unwrap();
    assert_eq!(lookup.raw_content.as_deref(), Some("first"));
    assert_eq!(repo.fetch_all_titles().await.unwrap(), vec!["Twin", "Twin"]);
}

// a missing title reaches the database as NULL and is rejected there
#[tokio::test]
async fn test_sqlite_create_without_title_fails() {
    let repo = setup_test_db().await;

    let result = repo.create_page(None, Some("orphan")).await;

    assert!(
        matches!(result, Err(WikiDbError::Database(_))),
        "Should fail on the NOT NULL constraint"
    );
    assert!(repo.fetch_all_titles().await.unwrap().is_empty());
}

// every acquired connection goes back, on success and on failure
#[tokio::test]
async fn test_sqlite_connections_are_released() {
    let repo = setup_test_db().await;

    repo.create_page(Some("A"), Some("a")).await.unwrap();
    repo.fetch_all_titles().await.unwrap();
    repo.fetch_page(Some("A")).await.unwrap();
    let _ = repo.create_page(None, None).await;

    let stats = repo.pool().stats();
    // ensure_schema plus the four calls above
    assert_eq!(stats.acquired, 5);
    assert_eq!(stats.released, 5);
    assert_eq!(stats.in_use(), 0);
}

// an exhausted pool is reported per request and recovers once a slot frees up
#[tokio::test]
async fn test_sqlite_pool_exhaustion_is_a_connection_error() {
    let repo = setup_test_db_with(WikiDbConfig {
        acquire_timeout: Duration::from_millis(100),
        ..WikiDbConfig::in_memory()
    })
    .await;

    let held = repo.pool().acquire().await.unwrap();

    let result = repo.fetch_all_titles().await;
    assert!(matches!(result, Err(WikiDbError::Connection(_))));

    drop(held);
    assert!(repo.fetch_all_titles().await.is_ok());
    assert_eq!(repo.pool().stats().in_use(), 0);
}

// dropping an unfinished operation still returns its connection
#[tokio::test]
async fn test_sqlite_cancelled_acquire_releases() {
    let repo = setup_test_db().await;

    {
        let _conn = repo.pool().acquire().await.unwrap();
        assert_eq!(repo.pool().stats().in_use(), 1);
    }

    let cancelled = tokio::time::timeout(Duration::from_millis(1), async {
        let _conn = repo.pool().acquire().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    })
    .await;

    assert!(cancelled.is_err());
    assert_eq!(repo.pool().stats().in_use(), 0);
}

#[tokio::test]
async fn test_sqlite_unsupported_driver_is_rejected() {
    let result = ConnectionPool::open(&WikiDbConfig {
        database_driver: "org.hsqldb.jdbcDriver".to_string(),
        ..WikiDbConfig::in_memory()
    })
    .await;

    assert!(matches!(result, Err(WikiDbError::Configuration(_))));
}

#[test]
fn test_pool_stats_in_use_never_underflows() {
    let stats = PoolStats {
        acquired: 3,
        released: 4,
    };
    assert_eq!(stats.in_use(), 0);
}

// snapshots taken while other threads churn connections stay consistent
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pool_stats_under_concurrent_churn() {
    let pool = ConnectionPool::open(&WikiDbConfig {
        max_pool_size: 4,
        ..WikiDbConfig::in_memory()
    })
    .await
    .unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let observer = {
        let pool = pool.clone();
        let done = done.clone();
        tokio::task::spawn_blocking(move || {
            let mut snapshots = 0u64;
            while !done.load(Ordering::SeqCst) {
                let stats = pool.stats();
                assert!(
                    stats.released <= stats.acquired,
                    "released ahead of acquired: {:?}",
                    stats
                );
                snapshots += 1;
            }
            snapshots
        })
    };

    let mut set = JoinSet::new();
    for _ in 0..3 {
        let pool = pool.clone();
        set.spawn(async move {
            for _ in 0..500 {
                let conn = pool.acquire().await.unwrap();
                drop(conn);
            }
        });
    }
    while let Some(result) = set.join_next().await {
        result.unwrap();
    }

    done.store(true, Ordering::SeqCst);
    assert!(observer.await.unwrap() > 0);
    assert_eq!(pool.stats().in_use(), 0);
    assert_eq!(pool.stats().acquired, 1500);
}
