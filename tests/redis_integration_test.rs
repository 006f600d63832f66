use flowlock::participants::builtin::HoldParticipant;
use flowlock::runtime::blueprint::Tree;
use flowlock::runtime::engine::{Engine, EngineConfig};
use flowlock::runtime::nid::Nid;
use flowlock::runtime::redis_storage::{RedisExpressionStore, RedisMutexStore, RedisStateStore, RedisTaskQueue};
use flowlock::runtime::scope::MutexKey;
use flowlock::runtime::storage::TaskQueue;
use flowlock::runtime::workitem::Workitem;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use redis::Client;

fn get_redis_client() -> Client {
    let url = std::env::var("FLOWLOCK_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/6".to_string());
    redis::Client::open(url).expect("Invalid Redis URL")
}

fn redis_engine(client: &Client, queue_key: &str) -> Engine {
    Engine::new_with_storage(
        Arc::new(RedisStateStore::new(client.clone())),
        Arc::new(RedisMutexStore::new(client.clone())),
        Arc::new(RedisExpressionStore::new(client.clone())),
        Arc::new(RedisTaskQueue::new(client.clone(), queue_key.to_string())),
        EngineConfig {
            workers: 1,
            ..EngineConfig::default()
        },
    )
}

#[tokio::test]
#[ignore] // Ignored by default, run explicitly if redis is available
async fn test_redis_reserve_survives_restart() {
    let client = get_redis_client();
    let mut conn = client.get_multiplexed_async_connection().await.expect("Failed to connect to Redis");
    let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await.expect("Failed to flush db");

    let hold = Arc::new(HoldParticipant::new("hold"));
    let mut engine = redis_engine(&client, "flowlock:test:queue");
    engine.register_participant(hold.clone());
    let engine = Arc::new(engine);
    let handles = engine.spawn_workers();

    let tree = Tree::concurrence(vec![
        Tree::reserve("m0", Tree::participant("hold")),
        Tree::reserve("m0", Tree::participant("hold")),
    ]);
    let instance_id = engine.launch(tree, Workitem::new(), HashMap::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let held = hold.held();
    assert_eq!(held.len(), 1);
    let key = MutexKey::new("m0", &Nid::root(instance_id));
    assert_eq!(engine.mutex(&key).await.unwrap().unwrap().len(), 2);

    for h in handles {
        h.abort();
    }

    let resumed = Arc::new(HoldParticipant::new("hold"));
    let mut engine = redis_engine(&client, "flowlock:test:queue");
    engine.register_participant(resumed.clone());
    let engine = Arc::new(engine);
    let handles = engine.spawn_workers();

    engine.receive(held[0].clone(), hold.take(&held[0]).unwrap()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let next = resumed.held();
    assert_eq!(next.len(), 1);
    engine.receive(next[0].clone(), resumed.take(&next[0]).unwrap()).await.unwrap();

    engine.wait_for(instance_id, Duration::from_secs(5)).await.unwrap();
    assert!(engine.mutex(&key).await.unwrap().unwrap().is_empty());

    for h in handles {
        h.abort();
    }
}

#[tokio::test]
#[ignore] // Ignored by default, run explicitly if redis is available
async fn test_redis_queue_stops_when_idle() {
    let client = get_redis_client();
    let mut conn = client.get_multiplexed_async_connection().await.expect("Failed to connect to Redis");
    let _: () = redis::cmd("DEL").arg("flowlock:test:idle").query_async(&mut conn).await.expect("Failed to clear queue");

    let queue = RedisTaskQueue::new(client.clone(), "flowlock:test:idle".to_string())
        .with_idle_timeout(Duration::from_millis(500));
    assert!(queue.pop().await.unwrap().is_none());

    // A worker over an idle queue returns instead of polling forever.
    let engine = Engine::new_with_storage(
        Arc::new(RedisStateStore::new(client.clone())),
        Arc::new(RedisMutexStore::new(client.clone())),
        Arc::new(RedisExpressionStore::new(client.clone())),
        Arc::new(queue),
        EngineConfig::default(),
    );
    let worker = tokio::time::timeout(Duration::from_secs(5), engine.run_worker()).await;
    assert!(worker.is_ok());
}
