use crate::runtime::nid::Nid;
use crate::runtime::scope::MutexKey;
use thiserror::Error;

/// Consistency faults raised by reservations and their mutex queues.
#[derive(Debug, Error)]
pub enum ReserveError {
    #[error("mutex not found: {0}")]
    MutexNotFound(MutexKey),
    #[error("expression not found: {0}")]
    NodeNotFound(Nid),
    #[error("expression {0} cannot be resumed")]
    NotResumable(Nid),
    #[error("expression {0} cannot be cancelled")]
    NotCancellable(Nid),
    #[error("reserve {0} has no bound mutex")]
    UnboundMutex(Nid),
    #[error("reserve {0} entered without a pending workitem")]
    NoPendingWorkitem(Nid),
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),
}
