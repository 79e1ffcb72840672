//! Redis integration tests
//!
//! These tests use a shared Redis container for efficiency and flush the
//! database before each test. Run with:
//!
//! ```bash
//! cargo test -p kv-store --test redis_integration
//! ```

use std::sync::Arc;

use kv_store::{Batch, CommitOutcome, KvStore, KvStoreError, KvStoreExt, RedisKvStore, SCAN_START};
use serial_test::serial;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Redis>,
    url: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Redis::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(6379).await.unwrap();

            Arc::new(ContainerInfo {
                container,
                url: format!("redis://{host}:{port}"),
            })
        })
        .await
        .clone()
}

/// Get a fresh store on an empty database
async fn get_test_store() -> RedisKvStore {
    let info = get_container_info().await;

    let client = redis::Client::open(info.url.as_str()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await.unwrap();

    RedisKvStore::connect(&info.url).await.unwrap()
}

#[tokio::test]
#[serial]
async fn ping_round_trips() {
    let store = get_test_store().await;
    store.ping().await.unwrap();
}

#[tokio::test]
#[serial]
async fn dual_write_applies_both_ops() {
    let store = get_test_store().await;

    let outcome = store
        .commit(
            Batch::new()
                .set_if_absent("order:1", r#"{"order_id":1}"#)
                .set_add("orders", "order:1"),
        )
        .await
        .unwrap();

    assert_eq!(outcome, CommitOutcome::Applied);
    assert_eq!(
        store.get("order:1").await.unwrap().as_deref(),
        Some(r#"{"order_id":1}"#)
    );
    assert!(store.sismember("orders", "order:1").await.unwrap());
}

#[tokio::test]
#[serial]
async fn set_if_absent_on_existing_key_is_not_applied() {
    let store = get_test_store().await;
    store
        .commit(Batch::new().set_if_absent("order:1", "first"))
        .await
        .unwrap();

    let outcome = store
        .commit(
            Batch::new()
                .set_if_absent("order:1", "second")
                .set_add("orders", "order:1"),
        )
        .await
        .unwrap();

    assert_eq!(outcome, CommitOutcome::NotApplied { op: 0 });
    assert_eq!(store.get("order:1").await.unwrap().as_deref(), Some("first"));
    assert!(!store.sismember("orders", "order:1").await.unwrap());
}

#[tokio::test]
#[serial]
async fn delete_if_present_on_missing_key_is_not_applied() {
    let store = get_test_store().await;
    store
        .commit(Batch::new().set_add("orders", "order:9"))
        .await
        .unwrap();

    let outcome = store
        .commit(
            Batch::new()
                .delete_if_present("order:9")
                .set_remove("orders", "order:9"),
        )
        .await
        .unwrap();

    assert_eq!(outcome, CommitOutcome::NotApplied { op: 0 });
    // The set removal must not have run either
    assert!(store.sismember("orders", "order:9").await.unwrap());
}

#[tokio::test]
#[serial]
async fn set_if_present_overwrites() {
    let store = get_test_store().await;
    store
        .commit(Batch::new().set_if_absent("k", "v1"))
        .await
        .unwrap();

    let outcome = store
        .commit(Batch::new().set_if_present("k", "v2"))
        .await
        .unwrap();

    assert!(outcome.is_applied());
    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
}

#[tokio::test]
#[serial]
async fn wrong_type_aborts_before_any_write() {
    let store = get_test_store().await;
    store
        .commit(Batch::new().set_if_absent("plain", "v"))
        .await
        .unwrap();

    let result = store
        .commit(
            Batch::new()
                .set_if_absent("order:1", "v")
                .set_add("plain", "order:1"),
        )
        .await;

    assert!(matches!(result, Err(KvStoreError::Redis(_))));
    assert!(!store.exists("order:1").await.unwrap());
}

#[tokio::test]
#[serial]
async fn mget_keeps_request_order() {
    let store = get_test_store().await;
    store
        .commit(Batch::new().set_if_absent("a", "1").set_if_absent("c", "3"))
        .await
        .unwrap();

    let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let values = store.mget(&keys).await.unwrap();
    assert_eq!(values, vec![Some("1".to_string()), None, Some("3".to_string())]);

    assert!(store.mget(&[]).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn sscan_full_pass_returns_every_member() {
    let store = get_test_store().await;
    let mut batch = Batch::new();
    for i in 0..300 {
        batch = batch.set_add("orders", format!("order:{i}"));
    }
    store.commit(batch).await.unwrap();

    let mut members = store.scan_all("orders", 50).await.unwrap();
    members.sort();
    members.dedup();

    assert_eq!(members.len(), 300);
    assert_eq!(store.scard("orders").await.unwrap(), 300);
}

#[tokio::test]
#[serial]
async fn sscan_of_missing_set_finishes_immediately() {
    let store = get_test_store().await;
    let page = store.sscan("orders", SCAN_START, 10).await.unwrap();
    assert!(page.is_last());
    assert!(page.members.is_empty());
}
