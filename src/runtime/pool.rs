use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::nodes::expression::FlowExpression;
use crate::runtime::blueprint::Tree;
use crate::runtime::nid::Nid;
use crate::runtime::workitem::Workitem;
use anyhow::Result;

/// Placement of an expression in its process tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionHeader {
    pub nid: Nid,
    pub parent: Option<Nid>,
    /// Variable frame the expression evaluates in.
    pub env: Nid,
}

impl ExpressionHeader {
    pub fn root(nid: Nid) -> Self {
        Self {
            env: nid.clone(),
            nid,
            parent: None,
        }
    }

    /// Header for child `index`, sharing this expression's frame.
    pub fn child(&self, index: usize) -> Self {
        Self {
            nid: self.nid.child(index),
            parent: Some(self.nid.clone()),
            env: self.env.clone(),
        }
    }

    /// Header for child `index`, evaluating in the frame this expression opens.
    pub fn scoped_child(&self, index: usize) -> Self {
        Self {
            env: self.nid.clone(),
            ..self.child(index)
        }
    }
}

/// Dispatcher interface expressions use to drive the rest of the tree.
#[async_trait]
pub trait ExpressionPool: Send + Sync {
    /// Durably records the expression's current fields.
    async fn persist(&self, expression: &FlowExpression) -> Result<()>;

    /// Resolves an identity back to a live expression.
    async fn fetch(&self, nid: &Nid) -> Result<Option<FlowExpression>>;

    /// Instantiates `tree` under `child` and applies it.
    async fn apply_child(&self, child: ExpressionHeader, tree: &Tree, workitem: Workitem) -> Result<()>;

    /// Hands the workitem to the parent and prunes the expression.
    async fn reply_to_parent(&self, header: &ExpressionHeader, workitem: Workitem) -> Result<()>;

    /// Drops the expression without replying to its parent.
    async fn prune(&self, nid: &Nid) -> Result<()>;

    /// Gives the workitem to a participant.
    async fn dispatch(&self, header: &ExpressionHeader, participant: &str, workitem: Workitem) -> Result<()>;
}
