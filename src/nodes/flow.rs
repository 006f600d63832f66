use crate::nodes::expression::FlowExpression;
use crate::runtime::blueprint::Tree;
use crate::runtime::nid::Nid;
use crate::runtime::pool::{ExpressionHeader, ExpressionPool};
use crate::runtime::workitem::Workitem;
use anyhow::Result;
use serde::{Deserialize, Serialize};

// --- SEQUENCE ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceExpression {
    pub header: ExpressionHeader,
    pub children: Vec<Tree>,
    /// Children evaluate in a frame of their own.
    pub scope: bool,
}

impl SequenceExpression {
    pub fn new(header: ExpressionHeader, children: Vec<Tree>, scope: bool) -> Self {
        Self { header, children, scope }
    }

    fn child_header(&self, index: usize) -> ExpressionHeader {
        if self.scope {
            self.header.scoped_child(index)
        } else {
            self.header.child(index)
        }
    }

    async fn apply_from(&self, pool: &dyn ExpressionPool, index: usize, workitem: Workitem) -> Result<()> {
        match self.children.get(index) {
            Some(tree) => pool.apply_child(self.child_header(index), tree, workitem).await,
            None => pool.reply_to_parent(&self.header, workitem).await,
        }
    }

    pub async fn apply(&mut self, pool: &dyn ExpressionPool, workitem: Workitem) -> Result<()> {
        self.apply_from(pool, 0, workitem).await
    }

    pub async fn reply(&mut self, pool: &dyn ExpressionPool, from: &Nid, workitem: Workitem) -> Result<()> {
        let next = from.child_index().map_or(self.children.len(), |i| i + 1);
        self.apply_from(pool, next, workitem).await
    }
}

// --- CONCURRENCE ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrenceExpression {
    pub header: ExpressionHeader,
    pub children: Vec<Tree>,
    pub remaining: usize,
    /// Fields of the replies received so far, later replies win.
    pub merged: Option<Workitem>,
}

impl ConcurrenceExpression {
    pub fn new(header: ExpressionHeader, children: Vec<Tree>) -> Self {
        Self {
            header,
            children,
            remaining: 0,
            merged: None,
        }
    }

    pub async fn apply(&mut self, pool: &dyn ExpressionPool, workitem: Workitem) -> Result<()> {
        if self.children.is_empty() {
            return pool.reply_to_parent(&self.header, workitem).await;
        }
        self.remaining = self.children.len();
        pool.persist(&FlowExpression::Concurrence(self.clone())).await?;

        for (index, tree) in self.children.iter().enumerate() {
            pool.apply_child(self.header.child(index), tree, workitem.clone()).await?;
        }
        Ok(())
    }

    pub async fn reply(&mut self, pool: &dyn ExpressionPool, workitem: Workitem) -> Result<()> {
        match self.merged.as_mut() {
            Some(merged) => merged.merge(workitem),
            None => self.merged = Some(workitem),
        }
        self.remaining = self.remaining.saturating_sub(1);

        if self.remaining > 0 {
            return pool.persist(&FlowExpression::Concurrence(self.clone())).await;
        }
        let merged = self.merged.take().unwrap_or_default();
        pool.reply_to_parent(&self.header, merged).await
    }
}
