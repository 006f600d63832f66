use crate::error::ReserveError;
use crate::mutex::flow_mutex::Admission;
use crate::nodes::expression::FlowExpression;
use crate::runtime::blueprint::Tree;
use crate::runtime::context::Context;
use crate::runtime::nid::Nid;
use crate::runtime::pool::{ExpressionHeader, ExpressionPool};
use crate::runtime::scope::MutexKey;
use crate::runtime::workitem::Workitem;
use crate::template;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Runs its single child only while holding a named mutex.
///
/// ```text
/// concurrence
///   reserve mutex: "m0"
///     sequence [alpha, bravo]
///   reserve mutex: "m0"
///     charly
///   delta
/// ```
///
/// alpha/bravo and charly never run at the same time, delta is unaffected.
/// A `/` prefix shares the mutex across the process, `//` across the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveExpression {
    pub header: ExpressionHeader,
    /// Mutex attribute as written in the tree.
    pub mutex: String,
    pub child: Option<Box<Tree>>,
    /// Mutex name after substitution, bound on apply.
    pub mutex_name: Option<String>,
    /// Workitem kept while waiting for the mutex.
    pub applied_workitem: Option<Workitem>,
    /// Cancelled while holding. The mutex goes once the child replies.
    #[serde(default)]
    pub cancelled: bool,
}

impl ReserveExpression {
    pub fn new(header: ExpressionHeader, mutex: &str, child: Option<Box<Tree>>) -> Self {
        Self {
            header,
            mutex: mutex.to_string(),
            child,
            mutex_name: None,
            applied_workitem: None,
            cancelled: false,
        }
    }

    fn mutex_key(&self) -> Result<MutexKey> {
        let name = self
            .mutex_name
            .as_deref()
            .ok_or_else(|| ReserveError::UnboundMutex(self.header.nid.clone()))?;
        Ok(MutexKey::new(name, &self.header.env))
    }

    pub async fn apply(&mut self, ctx: &Context, pool: &dyn ExpressionPool, workitem: Workitem) -> Result<()> {
        if self.child.is_none() {
            return pool.reply_to_parent(&self.header, workitem).await;
        }

        let name = template::substitute(&self.mutex, &workitem, ctx, &self.header.env).await?;
        self.mutex_name = Some(name);
        self.applied_workitem = Some(workitem);
        // Persisted before registering so a waiter can always be resumed.
        pool.persist(&FlowExpression::Reserve(self.clone())).await?;

        let key = self.mutex_key()?;
        match ctx.mutexes.register(&key, &self.header.nid).await? {
            Admission::Acquired => {
                info!(nid = %self.header.nid, mutex = %key, "reserve acquired");
                let workitem = self.applied_workitem.clone();
                self.enter(pool, workitem).await
            }
            Admission::Queued { position } => {
                info!(nid = %self.header.nid, mutex = %key, position, "reserve waiting");
                Ok(())
            }
        }
    }

    /// Applies the child, with `workitem` or the one stored while waiting.
    pub async fn enter(&mut self, pool: &dyn ExpressionPool, workitem: Option<Workitem>) -> Result<()> {
        let workitem = workitem
            .or_else(|| self.applied_workitem.clone())
            .ok_or_else(|| ReserveError::NoPendingWorkitem(self.header.nid.clone()))?;
        let Some(child) = self.child.as_deref() else {
            return pool.reply_to_parent(&self.header, workitem).await;
        };
        debug!(nid = %self.header.nid, "entering reserved section");
        pool.apply_child(self.header.child(0), child, workitem).await
    }

    pub async fn reply(&mut self, ctx: &Context, pool: &dyn ExpressionPool, workitem: Workitem) -> Result<()> {
        let key = self.mutex_key()?;
        let next = ctx.mutexes.release(&key, &self.header.nid).await?;
        info!(nid = %self.header.nid, mutex = %key, "reserve released");

        let woken = wake_next(ctx, pool, &key, next).await;
        if self.cancelled {
            debug!(nid = %self.header.nid, "cancelled reserve pruned after its section");
            pool.prune(&self.header.nid).await?;
        } else {
            pool.reply_to_parent(&self.header, workitem).await?;
        }
        woken
    }

    /// Leaves the queue without replying to the parent. A waiter is withdrawn
    /// and pruned right away. A holder keeps the mutex until its child replies,
    /// so the next waiter never overlaps with the section still running.
    pub async fn cancel(&mut self, ctx: &Context, pool: &dyn ExpressionPool) -> Result<()> {
        if self.mutex_name.is_none() {
            return pool.prune(&self.header.nid).await;
        }
        let key = self.mutex_key()?;
        let withdrawal = ctx.mutexes.withdraw_waiter(&key, &self.header.nid).await?;

        if withdrawal.was_holder {
            info!(nid = %self.header.nid, mutex = %key, "holding reserve cancelled, release deferred");
            self.cancelled = true;
            return pool.persist(&FlowExpression::Reserve(self.clone())).await;
        }
        info!(nid = %self.header.nid, mutex = %key, "waiting reserve cancelled");
        pool.prune(&self.header.nid).await
    }
}

/// Enters the new holder. Entries whose node is gone, is not a reserve, or was
/// cancelled before getting in are dropped from the queue and the next one is tried.
async fn wake_next(ctx: &Context, pool: &dyn ExpressionPool, key: &MutexKey, mut next: Option<Nid>) -> Result<()> {
    while let Some(nid) = next {
        match pool.fetch(&nid).await? {
            Some(FlowExpression::Reserve(mut reserve)) if !reserve.cancelled => {
                return reserve.enter(pool, None).await;
            }
            Some(FlowExpression::Reserve(_)) => {
                debug!(nid = %nid, mutex = %key, "skipping cancelled reserve");
                pool.prune(&nid).await?;
            }
            Some(_) => warn!(nid = %nid, mutex = %key, "next holder cannot be resumed, skipping"),
            None => warn!(nid = %nid, mutex = %key, "next holder not found, skipping"),
        }
        next = ctx.mutexes.withdraw(key, &nid).await?.next;
    }
    Ok(())
}
