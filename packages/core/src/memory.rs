//! In-memory [`JobStore`] for tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::{AlphaRecord, AlphaSpec, AlphaStatus, BatchId, BatchStats, JobStore, StoreError};

#[derive(Default)]
struct MemoryState {
    /// Records by fingerprint, with their insertion sequence.
    records: HashMap<String, (u64, AlphaRecord)>,
    next_seq: u64,
}

/// Job store backed by a mutex-guarded map.
///
/// Applies the same rules as the database-backed store, including
/// fingerprint uniqueness and oldest-first ordering.
#[derive(Default)]
pub struct MemoryJobStore {
    state: Mutex<MemoryState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F>(&self, fingerprint: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut AlphaRecord),
    {
        let mut state = self.lock();
        let (_, record) = state
            .records
            .get_mut(fingerprint)
            .ok_or_else(|| StoreError::NotFound(fingerprint.to_string()))?;
        apply(record);
        record.updated_at = Utc::now();
        Ok(())
    }

    fn update_matching<P, F>(&self, fingerprints: &[String], predicate: P, apply: F) -> usize
    where
        P: Fn(&AlphaRecord) -> bool,
        F: Fn(&mut AlphaRecord),
    {
        let mut state = self.lock();
        let now = Utc::now();
        let mut changed = 0;
        for fingerprint in fingerprints {
            if let Some((_, record)) = state.records.get_mut(fingerprint)
                && predicate(record)
            {
                apply(record);
                record.updated_at = now;
                changed += 1;
            }
        }
        changed
    }
}

impl JobStore for MemoryJobStore {
    async fn enqueue(
        &self,
        alphas: &[AlphaSpec],
        batch_id: Option<&BatchId>,
    ) -> Result<usize, StoreError> {
        let mut state = self.lock();
        let mut inserted = 0;
        for alpha in alphas {
            if state.records.contains_key(&alpha.fingerprint) {
                continue;
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.records.insert(
                alpha.fingerprint.clone(),
                (seq, AlphaRecord::pending(alpha, batch_id.cloned())),
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<AlphaRecord>, StoreError> {
        Ok(self
            .lock()
            .records
            .get(fingerprint)
            .map(|(_, record)| record.clone()))
    }

    async fn mark_success(
        &self,
        fingerprint: &str,
        remote_id: Option<&str>,
        attempts: u32,
    ) -> Result<(), StoreError> {
        self.update(fingerprint, |record| {
            record.status = AlphaStatus::Success;
            if let Some(remote_id) = remote_id {
                record.remote_id = Some(remote_id.to_string());
            }
            record.attempt_count = record.attempt_count.saturating_add(attempts);
        })
    }

    async fn mark_failed(
        &self,
        fingerprint: &str,
        error_message: &str,
        attempts: u32,
    ) -> Result<(), StoreError> {
        self.update(fingerprint, |record| {
            record.status = AlphaStatus::Failed;
            record.error_message = Some(error_message.to_string());
            record.attempt_count = record.attempt_count.saturating_add(attempts);
        })
    }

    async fn reassign_pending_to_batch(
        &self,
        fingerprints: &[String],
        batch_id: &BatchId,
    ) -> Result<usize, StoreError> {
        Ok(self.update_matching(
            fingerprints,
            |record| record.status == AlphaStatus::Pending,
            |record| record.batch_id = Some(batch_id.clone()),
        ))
    }

    async fn requeue_failed(
        &self,
        fingerprints: &[String],
        batch_id: &BatchId,
    ) -> Result<usize, StoreError> {
        Ok(self.update_matching(
            fingerprints,
            |record| record.status == AlphaStatus::Failed,
            |record| {
                record.status = AlphaStatus::Pending;
                record.batch_id = Some(batch_id.clone());
            },
        ))
    }

    async fn clean_pending(&self) -> Result<usize, StoreError> {
        let mut state = self.lock();
        let now = Utc::now();
        let mut changed = 0;
        for (_, record) in state.records.values_mut() {
            if record.status == AlphaStatus::Pending
                && (record.batch_id.is_some() || record.attempt_count != 0)
            {
                record.batch_id = None;
                record.attempt_count = 0;
                record.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn fetch_by_status(
        &self,
        status: AlphaStatus,
        unassigned_only: bool,
    ) -> Result<Vec<AlphaRecord>, StoreError> {
        let state = self.lock();
        let mut matching: Vec<&(u64, AlphaRecord)> = state
            .records
            .values()
            .filter(|(_, record)| {
                record.status == status && (!unassigned_only || record.batch_id.is_none())
            })
            .collect();
        matching.sort_by(|(a_seq, a), (b_seq, b)| {
            a.created_at.cmp(&b.created_at).then(a_seq.cmp(b_seq))
        });
        Ok(matching.into_iter().map(|(_, record)| record.clone()).collect())
    }

    async fn batch_statistics(&self, batch_id: &BatchId) -> Result<BatchStats, StoreError> {
        let state = self.lock();
        let mut stats = BatchStats::default();
        for (_, record) in state.records.values() {
            if record.batch_id.as_ref() == Some(batch_id) {
                stats.record(record.status, 1);
            }
        }
        Ok(stats)
    }

    async fn all_statistics(&self) -> Result<BTreeMap<Option<BatchId>, BatchStats>, StoreError> {
        let state = self.lock();
        let mut all: BTreeMap<Option<BatchId>, BatchStats> = BTreeMap::new();
        for (_, record) in state.records.values() {
            all.entry(record.batch_id.clone())
                .or_default()
                .record(record.status, 1);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(fingerprints: &[&str]) -> Vec<AlphaSpec> {
        fingerprints.iter().map(|f| AlphaSpec::regular(*f)).collect()
    }

    #[tokio::test]
    async fn duplicate_fingerprints_are_rejected_not_overwritten() -> Result<(), StoreError> {
        let store = MemoryJobStore::new();
        let b1 = BatchId::new("b1");
        let b2 = BatchId::new("b2");

        let first = store.enqueue(&specs(&["a", "b", "a"]), Some(&b1)).await?;
        let second = store.enqueue(&specs(&["b", "c"]), Some(&b2)).await?;

        assert_eq!(first, 2);
        assert_eq!(second, 1);
        assert_eq!(store.len(), 3);
        let b = store.get("b").await?.ok_or(StoreError::NotFound("b".into()))?;
        assert_eq!(b.batch_id, Some(b1));
        Ok(())
    }

    #[tokio::test]
    async fn clean_pending_is_idempotent() -> Result<(), StoreError> {
        let store = MemoryJobStore::new();
        let batch = BatchId::new("b1");
        store.enqueue(&specs(&["a", "b", "c"]), Some(&batch)).await?;
        store.mark_success("a", Some("sim-a"), 1).await?;

        assert_eq!(store.clean_pending().await?, 2);
        assert_eq!(store.clean_pending().await?, 0);

        let a = store.get("a").await?.ok_or(StoreError::NotFound("a".into()))?;
        assert_eq!(a.batch_id, Some(batch), "terminal records keep their batch");
        Ok(())
    }

    #[tokio::test]
    async fn clean_pending_resets_requeued_attempts() -> Result<(), StoreError> {
        let store = MemoryJobStore::new();
        let batch = BatchId::new("b1");
        store.enqueue(&specs(&["d"]), Some(&batch)).await?;
        store.mark_failed("d", "boom", 3).await?;
        assert_eq!(store.requeue_failed(&["d".to_string()], &batch).await?, 1);

        let requeued = store.get("d").await?.ok_or(StoreError::NotFound("d".into()))?;
        assert_eq!(requeued.status, AlphaStatus::Pending);
        assert_eq!(requeued.attempt_count, 3);
        assert_eq!(requeued.error_message.as_deref(), Some("boom"));

        store.clean_pending().await?;
        let cleaned = store.get("d").await?.ok_or(StoreError::NotFound("d".into()))?;
        assert_eq!(cleaned.attempt_count, 0);
        assert_eq!(cleaned.batch_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn terminal_writes_only_touch_existing_records() {
        let store = MemoryJobStore::new();

        let missing = store.mark_success("ghost", None, 1).await;

        assert!(matches!(missing, Err(StoreError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn reassign_skips_terminal_records() -> Result<(), StoreError> {
        let store = MemoryJobStore::new();
        store.enqueue(&specs(&["a", "b"]), None).await?;
        store.mark_failed("b", "rejected", 2).await?;

        let fingerprints = vec!["a".to_string(), "b".to_string(), "zzz".to_string()];
        let moved = store
            .reassign_pending_to_batch(&fingerprints, &BatchId::new("b9"))
            .await?;

        assert_eq!(moved, 1);
        assert_eq!(store.fetch_by_status(AlphaStatus::Pending, true).await?.len(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn fetch_by_status_is_oldest_first() -> Result<(), StoreError> {
        let store = MemoryJobStore::new();
        store.enqueue(&specs(&["first", "second"]), None).await?;
        store.enqueue(&specs(&["third"]), Some(&BatchId::new("b1"))).await?;

        let all: Vec<String> = store
            .fetch_by_status(AlphaStatus::Pending, false)
            .await?
            .into_iter()
            .map(|r| r.fingerprint)
            .collect();
        let unassigned = store.fetch_by_status(AlphaStatus::Pending, true).await?;

        assert_eq!(all, vec!["first", "second", "third"]);
        assert_eq!(unassigned.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn statistics_group_by_batch() -> Result<(), StoreError> {
        let store = MemoryJobStore::new();
        let b1 = BatchId::new("b1");
        store.enqueue(&specs(&["a", "b", "c"]), Some(&b1)).await?;
        store.enqueue(&specs(&["loose"]), None).await?;
        store.mark_success("a", Some("1"), 1).await?;
        store.mark_failed("b", "nope", 6).await?;

        let stats = store.batch_statistics(&b1).await?;
        assert_eq!(
            stats,
            BatchStats {
                total: 3,
                pending: 1,
                success: 1,
                failed: 1
            }
        );
        assert_eq!(
            store.batch_statistics(&BatchId::new("missing")).await?,
            BatchStats::default()
        );

        let all = store.all_statistics().await?;
        assert_eq!(all.len(), 2);
        assert_eq!(all.get(&None).map(|s| s.pending), Some(1));
        assert_eq!(all.get(&Some(b1)), Some(&stats));
        Ok(())
    }
}
