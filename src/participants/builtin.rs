use async_trait::async_trait;
use crate::participants::Participant;
use crate::runtime::nid::Nid;
use crate::runtime::workitem::Workitem;
use anyhow::Result;
use dashmap::DashMap;
use serde_json::json;
use std::time::Duration;
use tracing::info;

/// Logs the workitem and hands it straight back.
#[derive(Debug)]
pub struct EchoParticipant {
    name: String,
}

impl EchoParticipant {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

#[async_trait]
impl Participant for EchoParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    async fn consume(&self, nid: &Nid, workitem: Workitem) -> Result<Option<Workitem>> {
        info!(participant = %self.name, nid = %nid, fields = ?workitem.fields, "echo");
        Ok(Some(workitem))
    }
}

/// Holds the workitem for a while, then appends its name to the `visited` field.
#[derive(Debug)]
pub struct SleepParticipant {
    name: String,
    duration: Duration,
}

impl SleepParticipant {
    pub fn new(name: &str, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            duration,
        }
    }
}

#[async_trait]
impl Participant for SleepParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    async fn consume(&self, _nid: &Nid, mut workitem: Workitem) -> Result<Option<Workitem>> {
        tokio::time::sleep(self.duration).await;
        let mut visited = workitem
            .field("visited")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();
        visited.push(json!(self.name));
        workitem.set_field("visited", visited);
        Ok(Some(workitem))
    }
}

/// Keeps every workitem until someone takes it out and hands it back.
#[derive(Debug, Default)]
pub struct HoldParticipant {
    name: String,
    held: DashMap<Nid, Workitem>,
}

impl HoldParticipant {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            held: DashMap::new(),
        }
    }

    pub fn held(&self) -> Vec<Nid> {
        self.held.iter().map(|e| e.key().clone()).collect()
    }

    /// Workitem held for `nid`, if it is currently held.
    pub fn workitem(&self, nid: &Nid) -> Option<Workitem> {
        self.held.get(nid).map(|e| e.value().clone())
    }

    pub fn take(&self, nid: &Nid) -> Option<Workitem> {
        self.held.remove(nid).map(|(_, wi)| wi)
    }
}

#[async_trait]
impl Participant for HoldParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    async fn consume(&self, nid: &Nid, workitem: Workitem) -> Result<Option<Workitem>> {
        info!(participant = %self.name, nid = %nid, "holding workitem");
        self.held.insert(nid.clone(), workitem);
        Ok(None)
    }
}
