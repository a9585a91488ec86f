//! Message types for actor communication.

use ractor::RpcReplyPort;
use sim_core::AlphaSpec;

use crate::SliceSummary;

/// How one alpha of a slice ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlphaOutcome {
    Succeeded,
    Failed,
    /// Execution panicked; carries the panic message.
    Panicked(String),
}

/// Messages for the SliceActor.
#[derive(Debug)]
pub enum SliceMessage {
    /// Hand the next queued alpha to a worker, `None` once drained.
    RequestAlpha {
        worker_id: String,
        reply: RpcReplyPort<Option<AlphaSpec>>,
    },

    /// Report the outcome of an alpha handed out earlier.
    AlphaFinished {
        fingerprint: String,
        outcome: AlphaOutcome,
    },

    /// Answered once every alpha of the slice has reported.
    AwaitCompletion { reply: RpcReplyPort<SliceSummary> },
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Pull and execute the next alpha of the slice.
    PullNext,
}
