use crate::error::ReserveError;
use crate::nodes::flow::{ConcurrenceExpression, SequenceExpression};
use crate::nodes::participant::ParticipantExpression;
use crate::nodes::reserve::ReserveExpression;
use crate::runtime::blueprint::Tree;
use crate::runtime::context::Context;
use crate::runtime::nid::Nid;
use crate::runtime::pool::{ExpressionHeader, ExpressionPool};
use crate::runtime::workitem::Workitem;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A live node of a process tree, as stored by the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowExpression {
    Sequence(SequenceExpression),
    Concurrence(ConcurrenceExpression),
    Reserve(ReserveExpression),
    Participant(ParticipantExpression),
}

impl FlowExpression {
    pub fn instantiate(header: ExpressionHeader, tree: &Tree) -> Self {
        match tree {
            Tree::Sequence { children, scope } => {
                FlowExpression::Sequence(SequenceExpression::new(header, children.clone(), *scope))
            }
            Tree::Concurrence { children } => {
                FlowExpression::Concurrence(ConcurrenceExpression::new(header, children.clone()))
            }
            Tree::Reserve { mutex, child } => {
                FlowExpression::Reserve(ReserveExpression::new(header, mutex, child.clone()))
            }
            Tree::Participant { name } => {
                FlowExpression::Participant(ParticipantExpression::new(header, name))
            }
        }
    }

    pub fn header(&self) -> &ExpressionHeader {
        match self {
            FlowExpression::Sequence(e) => &e.header,
            FlowExpression::Concurrence(e) => &e.header,
            FlowExpression::Reserve(e) => &e.header,
            FlowExpression::Participant(e) => &e.header,
        }
    }

    pub fn nid(&self) -> &Nid {
        &self.header().nid
    }

    pub async fn apply(&mut self, ctx: &Context, pool: &dyn ExpressionPool, workitem: Workitem) -> Result<()> {
        match self {
            FlowExpression::Sequence(e) => e.apply(pool, workitem).await,
            FlowExpression::Concurrence(e) => e.apply(pool, workitem).await,
            FlowExpression::Reserve(e) => e.apply(ctx, pool, workitem).await,
            FlowExpression::Participant(e) => e.apply(pool, workitem).await,
        }
    }

    /// Called when the child `from` hands its workitem back.
    pub async fn reply(
        &mut self,
        ctx: &Context,
        pool: &dyn ExpressionPool,
        from: &Nid,
        workitem: Workitem,
    ) -> Result<()> {
        match self {
            FlowExpression::Sequence(e) => e.reply(pool, from, workitem).await,
            FlowExpression::Concurrence(e) => e.reply(pool, workitem).await,
            FlowExpression::Reserve(e) => e.reply(ctx, pool, workitem).await,
            FlowExpression::Participant(e) => e.receive(pool, workitem).await,
        }
    }

    /// Resumes a node that was parked waiting for a mutex.
    pub async fn enter(&mut self, pool: &dyn ExpressionPool, workitem: Option<Workitem>) -> Result<()> {
        match self {
            FlowExpression::Reserve(e) => e.enter(pool, workitem).await,
            other => Err(ReserveError::NotResumable(other.nid().clone()).into()),
        }
    }

    pub async fn cancel(&mut self, ctx: &Context, pool: &dyn ExpressionPool) -> Result<()> {
        match self {
            FlowExpression::Reserve(e) => e.cancel(ctx, pool).await,
            other => Err(ReserveError::NotCancellable(other.nid().clone()).into()),
        }
    }
}
