use std::sync::Arc;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;
use anyhow::{Result, anyhow};
use crate::error::ReserveError;
use crate::mutex::flow_mutex::FlowMutex;
use crate::mutex::registry::MutexRegistry;
use crate::nodes::expression::FlowExpression;
use crate::participants::Participant;
use crate::runtime::blueprint::Tree;
use crate::runtime::context::Context;
use crate::runtime::nid::Nid;
use crate::runtime::pool::{ExpressionHeader, ExpressionPool};
use crate::runtime::scope::{MutexKey, ScopeKey};
use crate::runtime::storage::{
    ExpressionStore, InMemoryExpressionStore, InMemoryMutexStore, InMemoryStateStore, InMemoryTaskQueue,
    MutexStore, StateStore, TaskQueue,
};
use crate::runtime::task::Task;
use crate::runtime::workitem::Workitem;
use std::collections::HashMap;
use serde_json::Value;
use tokio::time::timeout;
use std::time::Duration;
use tracing::{info, error, warn};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Workers started by `Engine::spawn_workers`.
    pub workers: usize,
    /// Upper bound for handling one task.
    pub task_timeout: Duration,
    /// Interval at which `wait_for` polls for completion.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            task_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Reference expression pool: runs process trees off a task queue.
///
/// Control-flow tasks of one process instance are handled one at a time,
/// participants run concurrently on their own tasks.
pub struct Engine {
    ctx: Context,
    expressions: Arc<dyn ExpressionStore>,
    queue: Arc<dyn TaskQueue>,
    participants: HashMap<String, Arc<dyn Participant>>,
    instance_locks: DashMap<Uuid, Arc<tokio::sync::Mutex<()>>>,
    finished: DashMap<Uuid, Workitem>,
    config: EngineConfig,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::new_with_storage(
            Arc::new(InMemoryStateStore::new()),
            Arc::new(InMemoryMutexStore::new()),
            Arc::new(InMemoryExpressionStore::new()),
            Arc::new(InMemoryTaskQueue::new()),
            config,
        )
    }

    pub fn new_with_storage(
        state: Arc<dyn StateStore>,
        mutexes: Arc<dyn MutexStore>,
        expressions: Arc<dyn ExpressionStore>,
        queue: Arc<dyn TaskQueue>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ctx: Context::new(state, Arc::new(MutexRegistry::new(mutexes))),
            expressions,
            queue,
            participants: HashMap::new(),
            instance_locks: DashMap::new(),
            finished: DashMap::new(),
            config,
        }
    }

    pub fn register_participant(&mut self, participant: Arc<dyn Participant>) {
        self.participants.insert(participant.name().to_string(), participant);
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Starts a process instance running `tree`.
    pub async fn launch(&self, tree: Tree, workitem: Workitem, variables: HashMap<String, Value>) -> Result<Uuid> {
        let instance_id = Uuid::new_v4();
        let root = Nid::root(instance_id);
        for (k, v) in variables {
            self.ctx.store.set(&ScopeKey::Process(instance_id), &k, v).await?;
        }

        let expression = FlowExpression::instantiate(ExpressionHeader::root(root.clone()), &tree);
        self.expressions.put(&expression).await?;
        self.queue.push(Task::Apply { nid: root, workitem }).await?;

        info!(instance_id = %instance_id, "process launched");
        Ok(instance_id)
    }

    /// Hands back a workitem a participant kept.
    pub async fn receive(&self, nid: Nid, workitem: Workitem) -> Result<()> {
        self.queue.push(Task::Receive { nid, workitem }).await
    }

    /// Cancels a reservation. A waiter leaves at once, a holder keeps the
    /// mutex until its reserved section replies.
    pub async fn cancel(&self, nid: &Nid) -> Result<()> {
        let lock = self.instance_lock(nid.instance_id);
        let _guard = lock.lock().await;

        let mut expression = self.fetch_required(nid).await?;
        expression.cancel(&self.ctx, self).await
    }

    pub async fn run_worker(&self) {
        info!("Worker started.");
        loop {
            let task = match self.queue.pop().await {
                Ok(Some(task)) => task,
                Ok(None) => break,
                Err(e) => {
                    error!(error = ?e, "Failed to pop task");
                    break;
                }
            };
            let target = task.target().clone();

            match timeout(self.config.task_timeout, self.handle(task)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(nid = %target, error = ?e, "Task failed");
                }
                Err(_) => {
                    error!(nid = %target, "Task timed out after {:?}", self.config.task_timeout);
                }
            }
        }
        info!("Worker stopped.");
    }

    /// Runs `config.workers` workers on the current runtime.
    pub fn spawn_workers(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        (0..self.config.workers.max(1))
            .map(|_| {
                let engine = self.clone();
                tokio::spawn(async move { engine.run_worker().await })
            })
            .collect()
    }

    async fn handle(&self, task: Task) -> Result<()> {
        let lock = self.instance_lock(task.target().instance_id);
        let _guard = lock.lock().await;

        match task {
            Task::Apply { nid, workitem } => {
                let mut expression = self.fetch_required(&nid).await?;
                expression.apply(&self.ctx, self, workitem).await
            }
            Task::Reply { to, from, workitem } => self.deliver(&to, &from, workitem).await,
            Task::Receive { nid, workitem } => self.deliver(&nid, &nid, workitem).await,
        }
    }

    async fn deliver(&self, to: &Nid, from: &Nid, workitem: Workitem) -> Result<()> {
        match self.expressions.get(to).await? {
            Some(mut expression) => expression.reply(&self.ctx, self, from, workitem).await,
            None => {
                warn!(to = %to, from = %from, "reply to a pruned expression dropped");
                Ok(())
            }
        }
    }

    async fn fetch_required(&self, nid: &Nid) -> Result<FlowExpression> {
        self.expressions
            .get(nid)
            .await?
            .ok_or_else(|| ReserveError::NodeNotFound(nid.clone()).into())
    }

    fn instance_lock(&self, instance_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.instance_locks.entry(instance_id).or_default().value().clone()
    }

    /// Final workitem of a finished process.
    pub fn result(&self, instance_id: Uuid) -> Option<Workitem> {
        self.finished.get(&instance_id).map(|w| w.value().clone())
    }

    pub async fn wait_for(&self, instance_id: Uuid, limit: Duration) -> Result<Workitem> {
        let poll = async {
            loop {
                if let Some(workitem) = self.result(instance_id) {
                    return workitem;
                }
                tokio::time::sleep(self.config.poll_interval).await;
            }
        };
        timeout(limit, poll)
            .await
            .map_err(|_| anyhow!("Process {} did not finish within {:?}", instance_id, limit))
    }

    /// Process-level variable, as seen from the root of `instance_id`.
    pub async fn variable(&self, instance_id: Uuid, raw_name: &str) -> Result<Option<Value>> {
        self.ctx.lookup_variable(raw_name, &Nid::root(instance_id)).await
    }

    pub async fn mutex(&self, key: &MutexKey) -> Result<Option<FlowMutex>> {
        self.ctx.mutexes.get(key).await
    }

    pub async fn expression(&self, nid: &Nid) -> Result<Option<FlowExpression>> {
        self.expressions.get(nid).await
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExpressionPool for Engine {
    async fn persist(&self, expression: &FlowExpression) -> Result<()> {
        self.expressions.put(expression).await
    }

    async fn fetch(&self, nid: &Nid) -> Result<Option<FlowExpression>> {
        self.expressions.get(nid).await
    }

    async fn apply_child(&self, child: ExpressionHeader, tree: &Tree, workitem: Workitem) -> Result<()> {
        let nid = child.nid.clone();
        self.expressions.put(&FlowExpression::instantiate(child, tree)).await?;
        self.queue.push(Task::Apply { nid, workitem }).await
    }

    async fn reply_to_parent(&self, header: &ExpressionHeader, workitem: Workitem) -> Result<()> {
        self.expressions.remove(&header.nid).await?;
        match &header.parent {
            Some(parent) => {
                self.queue
                    .push(Task::Reply {
                        to: parent.clone(),
                        from: header.nid.clone(),
                        workitem,
                    })
                    .await
            }
            None => {
                info!(instance_id = %header.nid.instance_id, "process finished");
                self.finished.insert(header.nid.instance_id, workitem);
                Ok(())
            }
        }
    }

    async fn prune(&self, nid: &Nid) -> Result<()> {
        self.expressions.remove(nid).await
    }

    async fn dispatch(&self, header: &ExpressionHeader, participant: &str, workitem: Workitem) -> Result<()> {
        let handler = self
            .participants
            .get(participant)
            .cloned()
            .ok_or_else(|| ReserveError::UnknownParticipant(participant.to_string()))?;
        let queue = self.queue.clone();
        let nid = header.nid.clone();

        // Participants may take long, they never block the worker.
        tokio::spawn(async move {
            match handler.consume(&nid, workitem).await {
                Ok(Some(workitem)) => {
                    if let Err(e) = queue.push(Task::Receive { nid: nid.clone(), workitem }).await {
                        error!(nid = %nid, "Failed to schedule reply (channel closed?): {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!(nid = %nid, participant = handler.name(), error = ?e, "Participant failed");
                }
            }
        });
        Ok(())
    }
}
