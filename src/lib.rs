//! Named, FIFO, crash-recoverable mutual exclusion for tree-structured
//! workflow processes.
//!
//! A `reserve` expression runs its child only while it holds a named mutex.
//! Contending reservations queue up in a durable [`mutex::flow_mutex::FlowMutex`]
//! and are resumed, in arrival order, as holders reply.

pub mod error;
pub mod mutex;
pub mod nodes;
pub mod participants;
pub mod runtime;
pub mod template;
