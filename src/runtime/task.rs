use serde::{Deserialize, Serialize};
use crate::runtime::nid::Nid;
use crate::runtime::workitem::Workitem;

/// Unit of work picked up by an engine worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Task {
    /// Apply a freshly instantiated expression.
    Apply { nid: Nid, workitem: Workitem },
    /// Hand a child's workitem back to its parent.
    Reply { to: Nid, from: Nid, workitem: Workitem },
    /// A participant is done with the workitem it was given.
    Receive { nid: Nid, workitem: Workitem },
}

impl Task {
    /// Expression this task operates on.
    pub fn target(&self) -> &Nid {
        match self {
            Task::Apply { nid, .. } | Task::Receive { nid, .. } => nid,
            Task::Reply { to, .. } => to,
        }
    }
}
