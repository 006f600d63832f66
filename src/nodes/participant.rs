use crate::runtime::pool::{ExpressionHeader, ExpressionPool};
use crate::runtime::workitem::Workitem;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Leaf handing its workitem to a named participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantExpression {
    pub header: ExpressionHeader,
    pub name: String,
}

impl ParticipantExpression {
    pub fn new(header: ExpressionHeader, name: &str) -> Self {
        Self {
            header,
            name: name.to_string(),
        }
    }

    pub async fn apply(&mut self, pool: &dyn ExpressionPool, workitem: Workitem) -> Result<()> {
        pool.dispatch(&self.header, &self.name, workitem).await
    }

    /// The participant is done with the workitem.
    pub async fn receive(&mut self, pool: &dyn ExpressionPool, workitem: Workitem) -> Result<()> {
        pool.reply_to_parent(&self.header, workitem).await
    }
}
