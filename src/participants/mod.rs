use async_trait::async_trait;
use crate::runtime::nid::Nid;
use crate::runtime::workitem::Workitem;
use anyhow::Result;
use std::fmt::Debug;

pub mod builtin;

/// Receiver of workitems dispatched by participant expressions.
#[async_trait]
pub trait Participant: Send + Sync + Debug {
    fn name(&self) -> &str;
    /// Returns the workitem to hand back, or `None` when the participant keeps
    /// it and replies later through `Engine::receive`.
    async fn consume(&self, nid: &Nid, workitem: Workitem) -> Result<Option<Workitem>>;
}
