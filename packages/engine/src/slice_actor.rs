//! Slice actor owning one slice's queue and completion barrier.

use std::collections::VecDeque;

use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sim_core::{AlphaSpec, BatchId, SimulationEvent};
use tokio::sync::broadcast;

use crate::SliceSummary;
use crate::messages::{AlphaOutcome, SliceMessage};

/// State for the slice actor.
pub struct SliceActorState {
    /// Position of this slice within the dispatch.
    pub index: usize,
    /// Batch the slice belongs to, for events.
    pub batch_id: Option<BatchId>,
    /// Alphas not yet handed to a worker.
    queue: VecDeque<AlphaSpec>,
    /// Outcome counters.
    summary: SliceSummary,
    /// Dispatcher waiting for the slice to finish.
    waiter: Option<RpcReplyPort<SliceSummary>>,
    /// Event broadcaster.
    event_tx: Option<broadcast::Sender<SimulationEvent>>,
}

impl SliceActorState {
    pub fn new(index: usize, batch_id: Option<BatchId>, alphas: Vec<AlphaSpec>) -> Self {
        Self {
            index,
            batch_id,
            summary: SliceSummary::new(index, alphas.len()),
            queue: alphas.into(),
            waiter: None,
            event_tx: None,
        }
    }

    /// Set the event broadcaster.
    pub fn with_event_tx(mut self, tx: broadcast::Sender<SimulationEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn broadcast(&self, event: SimulationEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn record(&mut self, fingerprint: String, outcome: AlphaOutcome) {
        let timestamp = Utc::now();
        let event = match outcome {
            AlphaOutcome::Succeeded => {
                self.summary.succeeded += 1;
                SimulationEvent::AlphaSucceeded {
                    fingerprint,
                    timestamp,
                }
            }
            AlphaOutcome::Failed => {
                self.summary.failed += 1;
                SimulationEvent::AlphaFailed {
                    fingerprint,
                    timestamp,
                }
            }
            AlphaOutcome::Panicked(message) => {
                self.summary.panicked += 1;
                SimulationEvent::AlphaPanicked {
                    fingerprint,
                    message,
                    timestamp,
                }
            }
        };
        self.broadcast(event);
    }

    /// Answer the waiter if every alpha has reported. Returns whether it did.
    fn try_complete(&mut self) -> bool {
        if self.summary.processed() < self.summary.size {
            return false;
        }
        let Some(waiter) = self.waiter.take() else {
            return false;
        };

        self.broadcast(SimulationEvent::SliceCompleted {
            batch_id: self.batch_id.clone(),
            slice: self.index,
            processed: self.summary.processed(),
            total: self.summary.size,
            succeeded: self.summary.succeeded,
            timestamp: Utc::now(),
        });
        let _ = waiter.send(self.summary.clone());
        true
    }
}

/// Slice actor that hands alphas to workers one at a time.
pub struct SliceActor;

impl Actor for SliceActor {
    type Msg = SliceMessage;
    type State = SliceActorState;
    type Arguments = SliceActorState;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::debug!(slice = args.index, size = args.summary.size, "Starting slice actor");
        Ok(args)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SliceMessage::RequestAlpha { worker_id, reply } => {
                let next = state.queue.pop_front();
                if let Some(ref alpha) = next {
                    tracing::debug!(worker_id, fingerprint = %alpha.fingerprint, "Alpha handed out");
                }
                let _ = reply.send(next);
            }

            SliceMessage::AlphaFinished {
                fingerprint,
                outcome,
            } => {
                state.record(fingerprint, outcome);
                if state.try_complete() {
                    myself.stop(None);
                }
            }

            SliceMessage::AwaitCompletion { reply } => {
                state.waiter = Some(reply);
                if state.try_complete() {
                    myself.stop(None);
                }
            }
        }

        Ok(())
    }
}
