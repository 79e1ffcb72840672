//! Repository tests against a real Redis server.
//!
//! Uses a shared Redis container and flushes the database before each test.
//! Run with:
//!
//! ```bash
//! cargo test -p domain --test redis_repository
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use common::{CustomerId, ItemId, OrderId};
use domain::{
    FindAllPage, LineItem, ORDER_INDEX, Order, OrderRepository, OrderService, RepositoryError,
};
use kv_store::{KvStore, RedisKvStore, SCAN_START};
use serial_test::serial;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Redis>,
    url: String,
}

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

async fn get_test_store() -> RedisKvStore {
    let info = get_container_info().await;

    let client = redis::Client::open(info.url.as_str()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await.unwrap();

    RedisKvStore::connect(&info.url).await.unwrap()
}

fn new_order(id: u64) -> Order {
    Order::new(
        OrderId::new(id),
        CustomerId::new(),
        vec![LineItem::new(ItemId::new(), 3, 250)],
        Utc::now(),
    )
}

#[tokio::test]
#[serial]
async fn insert_find_delete() {
    let repo = OrderRepository::new(get_test_store().await);
    let cancel = CancellationToken::new();
    let order = new_order(1);

    repo.insert(&cancel, &order).await.unwrap();
    assert_eq!(repo.find_by_id(&cancel, order.order_id).await.unwrap(), order);
    assert!(repo.store().sismember(ORDER_INDEX, "order:1").await.unwrap());

    let err = repo.insert(&cancel, &order).await.unwrap_err();
    assert!(matches!(err, RepositoryError::AlreadyExists(_)));

    repo.delete_by_id(&cancel, order.order_id).await.unwrap();
    assert!(matches!(
        repo.find_by_id(&cancel, order.order_id).await,
        Err(RepositoryError::NotFound(_))
    ));
    assert_eq!(repo.count(&cancel).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn cursor_walk_over_120_orders() {
    let repo = OrderRepository::new(get_test_store().await);
    let cancel = CancellationToken::new();
    for id in 1..=120 {
        repo.insert(&cancel, &new_order(id)).await.unwrap();
    }

    // SSCAN may return a member more than once across a pass; it never
    // skips one that was present throughout. COUNT is only a hint to the
    // server, so a page can hold more than 50 orders; a small set may even
    // come back whole in the first reply.
    let mut seen = HashSet::new();
    let mut cursor = SCAN_START;
    loop {
        let page = repo
            .find_all(&cancel, FindAllPage::new(cursor, 50))
            .await
            .unwrap();
        let last = page.is_last();
        cursor = page.cursor;
        seen.extend(page.orders.into_iter().map(|o| o.order_id));
        if last {
            break;
        }
    }

    assert_eq!(seen.len(), 120);
}

#[tokio::test]
#[serial]
async fn status_updates_persist() {
    let service = OrderService::new(get_test_store().await);
    let cancel = CancellationToken::new();

    let order = service
        .create_order(&cancel, CustomerId::new(), vec![])
        .await
        .unwrap();
    service
        .update_status(&cancel, order.order_id, "shipped")
        .await
        .unwrap();
    let completed = service
        .update_status(&cancel, order.order_id, "completed")
        .await
        .unwrap();

    let stored = service.get_order(&cancel, order.order_id).await.unwrap();
    assert_eq!(stored, completed);
}
