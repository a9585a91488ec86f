//! Persistence contract for alpha records.

use std::collections::BTreeMap;
use std::future::Future;

use thiserror::Error;

use crate::{AlphaRecord, AlphaSpec, AlphaStatus, BatchId, BatchStats};

/// Errors surfaced by a [`JobStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("alpha not found: {0}")]
    NotFound(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Durable table of alpha records keyed by fingerprint.
///
/// The store is the only writer of persisted state. Every method is a single
/// atomic operation per record; counters are incremented by the store itself
/// rather than read, modified and written back by the caller.
pub trait JobStore: Send + Sync + 'static {
    /// Insert pending records, returning how many were inserted.
    ///
    /// Fingerprints that already exist are skipped individually.
    fn enqueue(
        &self,
        alphas: &[AlphaSpec],
        batch_id: Option<&BatchId>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Look up a single record.
    fn get(
        &self,
        fingerprint: &str,
    ) -> impl Future<Output = Result<Option<AlphaRecord>, StoreError>> + Send;

    /// Record a successful submission that took `attempts` tries.
    fn mark_success(
        &self,
        fingerprint: &str,
        remote_id: Option<&str>,
        attempts: u32,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Record an exhausted attempt sequence of `attempts` tries.
    fn mark_failed(
        &self,
        fingerprint: &str,
        error_message: &str,
        attempts: u32,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Move pending records among `fingerprints` into `batch_id`.
    fn reassign_pending_to_batch(
        &self,
        fingerprints: &[String],
        batch_id: &BatchId,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Put failed records among `fingerprints` back to pending in `batch_id`.
    ///
    /// Attempt counts and the last error message are kept.
    fn requeue_failed(
        &self,
        fingerprints: &[String],
        batch_id: &BatchId,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Detach every pending record from its batch and reset its attempt count.
    ///
    /// Returns the number of records that changed.
    fn clean_pending(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Records in `status`, oldest first.
    fn fetch_by_status(
        &self,
        status: AlphaStatus,
        unassigned_only: bool,
    ) -> impl Future<Output = Result<Vec<AlphaRecord>, StoreError>> + Send;

    /// Counts for one batch. Unknown batches yield all zeros.
    fn batch_statistics(
        &self,
        batch_id: &BatchId,
    ) -> impl Future<Output = Result<BatchStats, StoreError>> + Send;

    /// Counts for every batch id observed, `None` grouping unassigned records.
    fn all_statistics(
        &self,
    ) -> impl Future<Output = Result<BTreeMap<Option<BatchId>, BatchStats>, StoreError>> + Send;
}
