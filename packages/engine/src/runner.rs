//! Batch lifecycle entry points: run a new batch, rerun by status.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use sim_core::{AlphaRecord, AlphaSpec, AlphaStatus, BatchId, BatchStats, JobStore};

use crate::{BatchDispatcher, DispatchSummary, EngineError};

/// Result of one lifecycle operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRun {
    pub batch_id: BatchId,
    /// Records newly inserted by this run.
    pub inserted: usize,
    /// Alphas handed to the dispatcher.
    pub dispatched: usize,
    pub summary: DispatchSummary,
    /// Store statistics for the batch after the dispatch.
    pub stats: BatchStats,
}

/// Connects the job store to the dispatcher.
pub struct BatchRunner<S: JobStore> {
    store: Arc<S>,
    dispatcher: BatchDispatcher,
}

impl<S: JobStore> BatchRunner<S> {
    pub fn new(store: Arc<S>, dispatcher: BatchDispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Persist `specs` into a fresh batch and dispatch everything still
    /// pending in it.
    ///
    /// Known fingerprints that are still pending are moved into the new
    /// batch; terminal ones are left alone and not resubmitted.
    pub async fn run_new_batch(&self, specs: &[AlphaSpec]) -> Result<BatchRun, EngineError> {
        let batch_id = BatchId::generate();
        tracing::info!(batch_id = %batch_id, alphas = specs.len(), "Starting new batch");

        let inserted = self.store.enqueue(specs, Some(&batch_id)).await?;

        let mut seen = HashSet::new();
        let fingerprints: Vec<String> = specs
            .iter()
            .filter(|spec| seen.insert(spec.fingerprint.as_str()))
            .map(|spec| spec.fingerprint.clone())
            .collect();
        let reassigned = self
            .store
            .reassign_pending_to_batch(&fingerprints, &batch_id)
            .await?;
        tracing::info!(batch_id = %batch_id, inserted, reassigned, "Batch prepared");

        let mut pending: HashMap<String, AlphaRecord> = self
            .store
            .fetch_by_status(AlphaStatus::Pending, false)
            .await?
            .into_iter()
            .filter(|record| record.batch_id.as_ref() == Some(&batch_id))
            .map(|record| (record.fingerprint.clone(), record))
            .collect();
        let alphas: Vec<AlphaSpec> = fingerprints
            .iter()
            .filter_map(|fingerprint| pending.remove(fingerprint))
            .map(|record| record.spec())
            .collect();

        let mut run = self.dispatch(batch_id, alphas).await?;
        run.inserted = inserted;
        Ok(run)
    }

    /// Collect records by status into a new batch and dispatch them again.
    ///
    /// `Pending` first clears stale batch assignments left by an interrupted
    /// run. `Failed` puts failed records back to pending. `Success` is refused.
    pub async fn rerun_by_status(&self, status: AlphaStatus) -> Result<BatchRun, EngineError> {
        let batch_id = BatchId::generate();

        let records = match status {
            AlphaStatus::Pending => {
                let cleaned = self.store.clean_pending().await?;
                let records = self.store.fetch_by_status(AlphaStatus::Pending, true).await?;
                let moved = self
                    .store
                    .reassign_pending_to_batch(&fingerprints_of(&records), &batch_id)
                    .await?;
                tracing::info!(batch_id = %batch_id, cleaned, moved, "Collected pending alphas");
                records
            }
            AlphaStatus::Failed => {
                let records = self.store.fetch_by_status(AlphaStatus::Failed, false).await?;
                let requeued = self
                    .store
                    .requeue_failed(&fingerprints_of(&records), &batch_id)
                    .await?;
                tracing::info!(batch_id = %batch_id, requeued, "Requeued failed alphas");
                records
            }
            AlphaStatus::Success => return Err(EngineError::InvalidRerunStatus(status)),
        };

        let alphas = records.iter().map(AlphaRecord::spec).collect();
        self.dispatch(batch_id, alphas).await
    }

    async fn dispatch(&self, batch_id: BatchId, alphas: Vec<AlphaSpec>) -> Result<BatchRun, EngineError> {
        let dispatched = alphas.len();

        let summary = if dispatched == 0 {
            tracing::info!(batch_id = %batch_id, "Nothing to dispatch");
            DispatchSummary::default()
        } else {
            self.dispatcher.dispatch(alphas, Some(&batch_id)).await
        };

        let stats = self.store.batch_statistics(&batch_id).await?;
        tracing::info!(
            batch_id = %batch_id,
            total = stats.total,
            success = stats.success,
            failed = stats.failed,
            pending = stats.pending,
            "Batch finished"
        );

        Ok(BatchRun {
            batch_id,
            inserted: 0,
            dispatched,
            summary,
            stats,
        })
    }
}

fn fingerprints_of(records: &[AlphaRecord]) -> Vec<String> {
    records.iter().map(|r| r.fingerprint.clone()).collect()
}
