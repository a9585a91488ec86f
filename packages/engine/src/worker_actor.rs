//! Worker actor that executes alphas pulled from a slice.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::executor::AlphaExecutor;
use crate::messages::{AlphaOutcome, SliceMessage, WorkerMessage};

/// State for the worker actor.
pub struct WorkerActorState {
    /// Unique worker ID within the slice.
    pub worker_id: String,
    /// Slice this worker pulls from.
    pub slice: ActorRef<SliceMessage>,
    /// Executes one alpha.
    pub executor: Arc<dyn AlphaExecutor>,
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub slice: ActorRef<SliceMessage>,
    pub executor: Arc<dyn AlphaExecutor>,
}

/// Worker actor that runs one alpha at a time until its slice drains.
pub struct WorkerActor;

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::debug!("Starting worker: {}", args.worker_id);

        myself.send_message(WorkerMessage::PullNext)?;

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            slice: args.slice,
            executor: args.executor,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::PullNext => {
                let result = ractor::rpc::call(
                    &state.slice,
                    |reply| SliceMessage::RequestAlpha {
                        worker_id: state.worker_id.clone(),
                        reply,
                    },
                    None,
                )
                .await;

                let alpha = match result {
                    Ok(ractor::rpc::CallResult::Success(Some(alpha))) => alpha,
                    // Drained, or the slice is gone
                    _ => {
                        tracing::debug!("Worker {} done", state.worker_id);
                        myself.stop(None);
                        return Ok(());
                    }
                };

                let outcome = match AssertUnwindSafe(state.executor.run(&alpha))
                    .catch_unwind()
                    .await
                {
                    Ok(true) => AlphaOutcome::Succeeded,
                    Ok(false) => AlphaOutcome::Failed,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        tracing::error!(
                            fingerprint = %alpha.fingerprint,
                            worker_id = %state.worker_id,
                            "Alpha execution panicked: {}",
                            message
                        );
                        AlphaOutcome::Panicked(message)
                    }
                };

                state.slice.send_message(SliceMessage::AlphaFinished {
                    fingerprint: alpha.fingerprint,
                    outcome,
                })?;
                myself.send_message(WorkerMessage::PullNext)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_rendered() {
        let from_str: Box<dyn Any + Send> = Box::new("boom");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        let opaque: Box<dyn Any + Send> = Box::new(42_u8);

        assert_eq!(panic_message(from_str.as_ref()), "boom");
        assert_eq!(panic_message(from_string.as_ref()), "kaboom");
        assert_eq!(panic_message(opaque.as_ref()), "unknown panic");
    }
}
