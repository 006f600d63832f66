use crate::error::ReserveError;
use crate::mutex::flow_mutex::{Admission, FlowMutex, Withdrawal};
use crate::runtime::nid::Nid;
use crate::runtime::scope::MutexKey;
use crate::runtime::storage::MutexStore;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Resolves mutex keys to durable `FlowMutex` records.
///
/// Every operation runs under one engine-wide lock, which covers record
/// creation as well as the queue update and its write-back. Callers act on the
/// returned outcome (entering, waking the next holder) after the lock is gone.
pub struct MutexRegistry {
    store: Arc<dyn MutexStore>,
    lock: Mutex<()>,
}

impl MutexRegistry {
    pub fn new(store: Arc<dyn MutexStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    // Must be called with `lock` held.
    async fn acquire_or_create(&self, key: &MutexKey) -> Result<FlowMutex> {
        if let Some(mutex) = self.store.load(key).await? {
            return Ok(mutex);
        }
        let mutex = FlowMutex::new(&key.name);
        self.store.save(key, &mutex).await?;
        debug!(mutex = %key, "created mutex");
        Ok(mutex)
    }

    pub async fn register(&self, key: &MutexKey, nid: &Nid) -> Result<Admission> {
        let _guard = self.lock.lock().await;
        let mut mutex = self.acquire_or_create(key).await?;
        let admission = mutex.register(nid.clone());
        self.store.save(key, &mutex).await?;
        debug!(mutex = %key, nid = %nid, ?admission, "registered");
        Ok(admission)
    }

    /// Pops the holder and returns the node that must be entered next.
    pub async fn release(&self, key: &MutexKey, releaser: &Nid) -> Result<Option<Nid>> {
        let _guard = self.lock.lock().await;
        let mut mutex = self
            .store
            .load(key)
            .await?
            .ok_or_else(|| ReserveError::MutexNotFound(key.clone()))?;
        let next = mutex.release(releaser);
        self.store.save(key, &mutex).await?;
        debug!(mutex = %key, releaser = %releaser, next = ?next.as_ref().map(|n| n.to_string()), "released");
        Ok(next)
    }

    /// Removes `nid` wherever it sits. A withdrawn holder hands over to `next`.
    pub async fn withdraw(&self, key: &MutexKey, nid: &Nid) -> Result<Withdrawal> {
        self.withdraw_with(key, nid, FlowMutex::withdraw).await
    }

    /// Removes `nid` only if it waits. A holder keeps the mutex.
    pub async fn withdraw_waiter(&self, key: &MutexKey, nid: &Nid) -> Result<Withdrawal> {
        self.withdraw_with(key, nid, FlowMutex::withdraw_waiter).await
    }

    async fn withdraw_with(
        &self,
        key: &MutexKey,
        nid: &Nid,
        op: fn(&mut FlowMutex, &Nid) -> Withdrawal,
    ) -> Result<Withdrawal> {
        let _guard = self.lock.lock().await;
        let Some(mut mutex) = self.store.load(key).await? else {
            return Ok(Withdrawal::default());
        };
        let before = mutex.len();
        let withdrawal = op(&mut mutex, nid);
        if mutex.len() != before {
            self.store.save(key, &mutex).await?;
            debug!(mutex = %key, nid = %nid, was_holder = withdrawal.was_holder, "withdrew");
        }
        Ok(withdrawal)
    }

    /// Snapshot of a record, for inspection.
    pub async fn get(&self, key: &MutexKey) -> Result<Option<FlowMutex>> {
        let _guard = self.lock.lock().await;
        self.store.load(key).await
    }
}
