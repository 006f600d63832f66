use std::sync::Arc;
use serde_json::Value;
use crate::mutex::registry::MutexRegistry;
use crate::runtime::nid::Nid;
use crate::runtime::scope::{self, Scope, ScopeKey};
use crate::runtime::storage::StateStore;
use anyhow::Result;

/// Engine-wide collaborators handed to every expression call.
#[derive(Clone)] // Context should be cheap to clone (just Arcs)
pub struct Context {
    pub store: Arc<dyn StateStore>,
    pub mutexes: Arc<MutexRegistry>,
}

impl Context {
    pub fn new(store: Arc<dyn StateStore>, mutexes: Arc<MutexRegistry>) -> Self {
        Self { store, mutexes }
    }

    /// Looks up a prefix-scoped variable as seen from `env`. Local names that
    /// are missing from the frame fall back to the process frame.
    pub async fn lookup_variable(&self, raw_name: &str, env: &Nid) -> Result<Option<Value>> {
        let (tier, name) = scope::resolve(raw_name);
        let key = ScopeKey::for_scope(tier, env);
        let value = self.store.get(&key, name).await?;
        if value.is_some() || tier != Scope::Local || env.is_root() {
            return Ok(value);
        }
        self.store.get(&ScopeKey::Process(env.instance_id), name).await
    }

    pub async fn set_variable(&self, raw_name: &str, env: &Nid, value: Value) -> Result<()> {
        let (tier, name) = scope::resolve(raw_name);
        self.store.set(&ScopeKey::for_scope(tier, env), name, value).await
    }

    pub async fn unset_variable(&self, raw_name: &str, env: &Nid) -> Result<()> {
        let (tier, name) = scope::resolve(raw_name);
        self.store.unset(&ScopeKey::for_scope(tier, env), name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::storage::{InMemoryMutexStore, InMemoryStateStore};
    use serde_json::json;
    use uuid::Uuid;

    fn context() -> Context {
        Context::new(
            Arc::new(InMemoryStateStore::new()),
            Arc::new(MutexRegistry::new(Arc::new(InMemoryMutexStore::new()))),
        )
    }

    #[tokio::test]
    async fn local_lookup_falls_back_to_process() {
        let ctx = context();
        let root = Nid::root(Uuid::new_v4());
        let frame = root.child(0);

        ctx.set_variable("/who", &frame, json!("process")).await.unwrap();
        assert_eq!(ctx.lookup_variable("who", &frame).await.unwrap(), Some(json!("process")));

        ctx.set_variable("who", &frame, json!("local")).await.unwrap();
        assert_eq!(ctx.lookup_variable("who", &frame).await.unwrap(), Some(json!("local")));
        assert_eq!(ctx.lookup_variable("/who", &frame).await.unwrap(), Some(json!("process")));

        ctx.unset_variable("who", &frame).await.unwrap();
        assert_eq!(ctx.lookup_variable("who", &frame).await.unwrap(), Some(json!("process")));
    }

    #[tokio::test]
    async fn engine_variables_cross_instances() {
        let ctx = context();
        let a = Nid::root(Uuid::new_v4());
        let b = Nid::root(Uuid::new_v4());

        ctx.set_variable("//shared", &a, json!(7)).await.unwrap();
        assert_eq!(ctx.lookup_variable("//shared", &b).await.unwrap(), Some(json!(7)));
        assert_eq!(ctx.lookup_variable("shared", &b).await.unwrap(), None);
    }
}
