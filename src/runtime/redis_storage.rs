use async_trait::async_trait;
use serde_json::Value;
use crate::mutex::flow_mutex::FlowMutex;
use crate::nodes::expression::FlowExpression;
use crate::runtime::nid::Nid;
use crate::runtime::scope::{MutexKey, ScopeKey};
use crate::runtime::task::Task;
use crate::runtime::storage::{ExpressionStore, MutexStore, StateStore, TaskQueue};
use anyhow::Result;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const PREFIX: &str = "flowlock";
// Blocking pop window. Short so idle timeouts are checked often.
const POLL_SECONDS: f64 = 1.0;

pub struct RedisTaskQueue {
    client: redis::Client,
    queue_key: String,
    idle_timeout: Option<Duration>,
}

impl RedisTaskQueue {
    pub fn new(client: redis::Client, queue_key: String) -> Self {
        Self {
            client,
            queue_key,
            idle_timeout: None,
        }
    }

    /// `pop` returns `None` once the queue stayed empty for `limit`, which
    /// lets workers stop on their own.
    pub fn with_idle_timeout(mut self, limit: Duration) -> Self {
        self.idle_timeout = Some(limit);
        self
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn push(&self, task: Task) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(&task)?;
        let _: () = conn.lpush(&self.queue_key, serialized).await?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Task>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let started = Instant::now();
        loop {
            let result: Option<(String, String)> = conn.brpop(&self.queue_key, POLL_SECONDS).await?;
            if let Some((_, task_json)) = result {
                return Ok(Some(serde_json::from_str(&task_json)?));
            }
            if self.idle_timeout.is_some_and(|limit| started.elapsed() >= limit) {
                debug!(queue = %self.queue_key, "task queue idle, stopping");
                return Ok(None);
            }
        }
    }
}

pub struct RedisStateStore {
    client: redis::Client,
}

impl RedisStateStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn var_key(&self, scope: &ScopeKey) -> String {
        format!("{}:vars:{}", PREFIX, scope)
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(&self, scope: &ScopeKey, name: &str) -> Result<Option<Value>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let val_str: Option<String> = conn.hget(self.var_key(scope), name).await?;
        Ok(val_str.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    async fn set(&self, scope: &ScopeKey, name: &str, value: Value) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let val_str = serde_json::to_string(&value)?;
        let _: () = conn.hset(self.var_key(scope), name, val_str).await?;
        Ok(())
    }

    async fn unset(&self, scope: &ScopeKey, name: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.hdel(self.var_key(scope), name).await?;
        Ok(())
    }
}

/// Mutex records in one hash, one field per mutex key.
pub struct RedisMutexStore {
    client: redis::Client,
}

impl RedisMutexStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn table_key(&self) -> String {
        format!("{}:mutexes", PREFIX)
    }
}

#[async_trait]
impl MutexStore for RedisMutexStore {
    async fn load(&self, key: &MutexKey) -> Result<Option<FlowMutex>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.hget(self.table_key(), key.to_string()).await?;
        Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    async fn save(&self, key: &MutexKey, mutex: &FlowMutex) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw = serde_json::to_string(mutex)?;
        let _: () = conn.hset(self.table_key(), key.to_string(), raw).await?;
        Ok(())
    }
}

pub struct RedisExpressionStore {
    client: redis::Client,
}

impl RedisExpressionStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn instance_key(&self, nid: &Nid) -> String {
        format!("{}:inst:{}:expressions", PREFIX, nid.instance_id)
    }
}

#[async_trait]
impl ExpressionStore for RedisExpressionStore {
    async fn get(&self, nid: &Nid) -> Result<Option<FlowExpression>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.hget(self.instance_key(nid), &nid.expr_id).await?;
        Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    async fn put(&self, expression: &FlowExpression) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let nid = expression.nid();
        let raw = serde_json::to_string(expression)?;
        let _: () = conn.hset(self.instance_key(nid), &nid.expr_id, raw).await?;
        Ok(())
    }

    async fn remove(&self, nid: &Nid) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.hdel(self.instance_key(nid), &nid.expr_id).await?;
        Ok(())
    }
}
