//! Bounded-concurrency dispatch of alphas in fixed-size slices.

use std::sync::Arc;

use chrono::Utc;
use ractor::Actor;
use serde::Serialize;
use sim_core::{AlphaSpec, BatchId, SimulationEvent};
use tokio::sync::broadcast;

use crate::executor::AlphaExecutor;
use crate::messages::SliceMessage;
use crate::slice_actor::{SliceActor, SliceActorState};
use crate::worker_actor::{WorkerActor, WorkerArgs};
use crate::{DispatchConfig, EngineError};

/// Outcome counts for one slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SliceSummary {
    pub index: usize,
    pub size: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub panicked: usize,
}

impl SliceSummary {
    pub fn new(index: usize, size: usize) -> Self {
        Self {
            index,
            size,
            ..Default::default()
        }
    }

    /// Alphas that reported an outcome.
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.panicked
    }

    /// Percentage of the slice that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.size == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.size as f64 * 100.0
        }
    }
}

/// Outcome counts for a whole dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub total: usize,
    pub slices: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub panicked: usize,
    /// Alphas of slices whose actors could not be started.
    pub skipped: usize,
}

impl DispatchSummary {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.panicked
    }

    fn absorb(&mut self, slice: &SliceSummary) {
        self.slices += 1;
        self.succeeded += slice.succeeded;
        self.failed += slice.failed;
        self.panicked += slice.panicked;
    }
}

/// Drives alphas through an executor, one slice at a time.
pub struct BatchDispatcher {
    executor: Arc<dyn AlphaExecutor>,
    config: DispatchConfig,
    event_tx: Option<broadcast::Sender<SimulationEvent>>,
}

impl BatchDispatcher {
    pub fn new(executor: Arc<dyn AlphaExecutor>, config: DispatchConfig) -> Self {
        Self {
            executor,
            config: DispatchConfig::new(config.batch_size, config.max_workers, config.batch_pause),
            event_tx: None,
        }
    }

    /// Publish progress events on the given channel.
    pub fn with_event_tx(mut self, tx: broadcast::Sender<SimulationEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Run every alpha to an outcome. Never fails; problems are logged and
    /// reflected in the summary.
    pub async fn dispatch(&self, alphas: Vec<AlphaSpec>, batch_id: Option<&BatchId>) -> DispatchSummary {
        let total = alphas.len();
        let mut summary = DispatchSummary {
            total,
            ..Default::default()
        };
        if total == 0 {
            return summary;
        }

        let slice_count = total.div_ceil(self.config.batch_size);
        tracing::info!(
            batch_id = batch_id.map(BatchId::as_str),
            total,
            slices = slice_count,
            max_workers = self.config.max_workers,
            "Dispatching alphas"
        );

        let mut remaining = alphas.into_iter();
        for index in 0..slice_count {
            let slice: Vec<AlphaSpec> = remaining.by_ref().take(self.config.batch_size).collect();
            let size = slice.len();

            match self.run_slice(index, slice, batch_id).await {
                Ok(slice_summary) => {
                    summary.absorb(&slice_summary);
                    let done = summary.processed() + summary.skipped;
                    tracing::info!(
                        batch_id = batch_id.map(BatchId::as_str),
                        slice = index + 1,
                        "Progress: {}/{} ({:.2}%), slice success rate {:.2}%",
                        done,
                        total,
                        done as f64 / total as f64 * 100.0,
                        slice_summary.success_rate()
                    );
                }
                Err(e) => {
                    summary.skipped += size;
                    tracing::error!(slice = index + 1, size, error = %e, "Slice skipped");
                }
            }

            if index + 1 < slice_count {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(SimulationEvent::BatchCompleted {
                batch_id: batch_id.cloned(),
                processed: summary.processed(),
                succeeded: summary.succeeded,
                timestamp: Utc::now(),
            });
        }

        summary
    }

    async fn run_slice(
        &self,
        index: usize,
        alphas: Vec<AlphaSpec>,
        batch_id: Option<&BatchId>,
    ) -> Result<SliceSummary, EngineError> {
        let workers = self.config.max_workers.min(alphas.len());

        let mut slice_state = SliceActorState::new(index, batch_id.cloned(), alphas);
        if let Some(ref tx) = self.event_tx {
            slice_state = slice_state.with_event_tx(tx.clone());
        }

        let (slice, slice_handle) = Actor::spawn(None, SliceActor, slice_state)
            .await
            .map_err(|e| EngineError::Actor(format!("Failed to spawn slice: {}", e)))?;

        let mut worker_handles = Vec::with_capacity(workers);
        for n in 0..workers {
            let args = WorkerArgs {
                worker_id: format!("slice-{}-worker-{}", index + 1, n + 1),
                slice: slice.clone(),
                executor: Arc::clone(&self.executor),
            };
            match Actor::spawn(None, WorkerActor, args).await {
                Ok((_worker, handle)) => worker_handles.push(handle),
                Err(e) => tracing::warn!(slice = index + 1, "Failed to spawn worker: {}", e),
            }
        }

        if worker_handles.is_empty() {
            slice.stop(None);
            let _ = slice_handle.await;
            return Err(EngineError::Actor("no worker could be started".into()));
        }

        let result = ractor::rpc::call(
            &slice,
            |reply| SliceMessage::AwaitCompletion { reply },
            None,
        )
        .await;

        for handle in worker_handles {
            let _ = handle.await;
        }
        let _ = slice_handle.await;

        match result {
            Ok(ractor::rpc::CallResult::Success(summary)) => Ok(summary),
            Ok(_) => Err(EngineError::Actor("slice stopped before completing".into())),
            Err(e) => Err(EngineError::Actor(format!("slice unreachable: {}", e))),
        }
    }
}
