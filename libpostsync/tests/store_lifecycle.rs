//! Store open/migrate/reopen behavior on disk

use libpostsync::migrations::{SchemaMigrator, STEPS};
use libpostsync::{Platform, Store, TokenStore};
use secrecy::ExposeSecret;
use tempfile::TempDir;

#[tokio::test]
async fn test_interrupted_upgrade_resumes_from_next_step() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("postsync.db");
    let db_path = db_path.to_str().unwrap();

    // an older build that only knew the first two steps
    let store = Store::open_with(db_path, SchemaMigrator::with_steps(&STEPS[..2]))
        .await
        .unwrap();
    assert_eq!(store.schema_version().await.unwrap(), 2);
    TokenStore::new(store.clone())
        .save(Platform::X, "alice", "kept")
        .await
        .unwrap();
    store.close().await;

    let store = Store::open(db_path).await.unwrap();
    assert_eq!(store.schema_version().await.unwrap(), STEPS.len() as u32);

    // data from before the upgrade survives
    let token = TokenStore::new(store.clone())
        .get_token(Platform::X)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(token.expose_secret(), "kept");

    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('posts')")
        .fetch_all(store.pool())
        .await
        .unwrap();
    assert!(columns.contains(&"tags".to_string()));
}

#[tokio::test]
async fn test_reopening_current_store_applies_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("postsync.db");
    let db_path = db_path.to_str().unwrap();

    Store::open(db_path).await.unwrap().close().await;

    let bus = libpostsync::EventBus::new(8);
    let mut rx = bus.subscribe();
    let store = Store::open_with_events(db_path, &bus).await.unwrap();

    assert_eq!(store.schema_version().await.unwrap(), STEPS.len() as u32);
    assert!(rx.try_recv().is_err());
}
