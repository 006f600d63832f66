use async_trait::async_trait;
use serde_json::Value;
use crate::mutex::flow_mutex::FlowMutex;
use crate::nodes::expression::FlowExpression;
use crate::runtime::nid::Nid;
use crate::runtime::scope::{MutexKey, ScopeKey};
use crate::runtime::task::Task;
use anyhow::Result;
use dashmap::DashMap;
use tokio::sync::mpsc;

// --- Interfaces ---

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn push(&self, task: Task) -> Result<()>;
    async fn pop(&self) -> Result<Option<Task>>;
}

/// Scope-keyed process variables.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, scope: &ScopeKey, name: &str) -> Result<Option<Value>>;
    async fn set(&self, scope: &ScopeKey, name: &str, value: Value) -> Result<()>;
    async fn unset(&self, scope: &ScopeKey, name: &str) -> Result<()>;
}

/// Durable table of mutex records. Callers serialize access (see `MutexRegistry`).
#[async_trait]
pub trait MutexStore: Send + Sync {
    async fn load(&self, key: &MutexKey) -> Result<Option<FlowMutex>>;
    async fn save(&self, key: &MutexKey, mutex: &FlowMutex) -> Result<()>;
}

/// Live expressions, addressable by identity so suspended nodes can be resumed.
#[async_trait]
pub trait ExpressionStore: Send + Sync {
    async fn get(&self, nid: &Nid) -> Result<Option<FlowExpression>>;
    async fn put(&self, expression: &FlowExpression) -> Result<()>;
    async fn remove(&self, nid: &Nid) -> Result<()>;
}

// --- In-Memory Implementations ---

/// Unbounded so that workers scheduling follow-up tasks never block each other.
pub struct InMemoryTaskQueue {
    sender: mpsc::UnboundedSender<Task>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Task>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: tx,
            receiver: tokio::sync::Mutex::new(rx),
        }
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn push(&self, task: Task) -> Result<()> {
        self.sender.send(task).map_err(|e| anyhow::anyhow!("Task channel closed: {}", e))
    }

    async fn pop(&self) -> Result<Option<Task>> {
        let mut rx = self.receiver.lock().await;
        Ok(rx.recv().await)
    }
}

#[derive(Default)]
pub struct InMemoryStateStore {
    // Map<Scope, Map<VarName, Value>>
    vars: DashMap<ScopeKey, DashMap<String, Value>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, scope: &ScopeKey, name: &str) -> Result<Option<Value>> {
        Ok(self
            .vars
            .get(scope)
            .and_then(|frame| frame.get(name).map(|v| v.value().clone())))
    }

    async fn set(&self, scope: &ScopeKey, name: &str, value: Value) -> Result<()> {
        let frame = self.vars.entry(scope.clone()).or_default();
        frame.insert(name.to_string(), value);
        Ok(())
    }

    async fn unset(&self, scope: &ScopeKey, name: &str) -> Result<()> {
        if let Some(frame) = self.vars.get(scope) {
            frame.remove(name);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMutexStore {
    mutexes: DashMap<MutexKey, FlowMutex>,
}

impl InMemoryMutexStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MutexStore for InMemoryMutexStore {
    async fn load(&self, key: &MutexKey) -> Result<Option<FlowMutex>> {
        Ok(self.mutexes.get(key).map(|m| m.value().clone()))
    }

    async fn save(&self, key: &MutexKey, mutex: &FlowMutex) -> Result<()> {
        self.mutexes.insert(key.clone(), mutex.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryExpressionStore {
    expressions: DashMap<Nid, FlowExpression>,
}

impl InMemoryExpressionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }
}

#[async_trait]
impl ExpressionStore for InMemoryExpressionStore {
    async fn get(&self, nid: &Nid) -> Result<Option<FlowExpression>> {
        Ok(self.expressions.get(nid).map(|e| e.value().clone()))
    }

    async fn put(&self, expression: &FlowExpression) -> Result<()> {
        self.expressions.insert(expression.nid().clone(), expression.clone());
        Ok(())
    }

    async fn remove(&self, nid: &Nid) -> Result<()> {
        self.expressions.remove(nid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn variables_are_scoped() {
        let store = InMemoryStateStore::new();
        let a = ScopeKey::Process(Uuid::new_v4());
        let b = ScopeKey::Process(Uuid::new_v4());

        store.set(&a, "x", json!(1)).await.unwrap();
        assert_eq!(store.get(&a, "x").await.unwrap(), Some(json!(1)));
        assert_eq!(store.get(&b, "x").await.unwrap(), None);

        store.unset(&a, "x").await.unwrap();
        assert_eq!(store.get(&a, "x").await.unwrap(), None);
    }
}
