//! Read-only progress views over store statistics.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use sim_core::{BatchId, BatchStats, JobStore};

use crate::EngineError;

/// Statistics for one batch, or for unassigned records when `batch_id` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub batch_id: Option<BatchId>,
    pub stats: BatchStats,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let batch = self.batch_id.as_ref().map_or("unassigned", BatchId::as_str);
        write!(
            f,
            "Batch {}: total={} success={} failed={} pending={}",
            batch, self.stats.total, self.stats.success, self.stats.failed, self.stats.pending
        )?;
        if let Some(rate) = self.stats.success_rate() {
            write!(f, " success_rate={:.2}%", rate)?;
        }
        Ok(())
    }
}

/// Reports batch progress without mutating anything.
pub struct ProgressReporter<S: JobStore> {
    store: Arc<S>,
}

impl<S: JobStore> ProgressReporter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn batch(&self, batch_id: &BatchId) -> Result<BatchReport, EngineError> {
        let stats = self.store.batch_statistics(batch_id).await?;
        Ok(BatchReport {
            batch_id: Some(batch_id.clone()),
            stats,
        })
    }

    /// One report per batch, oldest batch first, unassigned records first of all.
    pub async fn all(&self) -> Result<Vec<BatchReport>, EngineError> {
        let all = self.store.all_statistics().await?;
        Ok(all
            .into_iter()
            .map(|(batch_id, stats)| BatchReport { batch_id, stats })
            .collect())
    }

    pub async fn log_batch(&self, batch_id: &BatchId) -> Result<BatchReport, EngineError> {
        let report = self.batch(batch_id).await?;
        tracing::info!("{}", report);
        Ok(report)
    }

    pub async fn log_all(&self) -> Result<Vec<BatchReport>, EngineError> {
        let reports = self.all().await?;
        for report in &reports {
            tracing::info!("{}", report);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_shows_rate_with_two_decimals() {
        let report = BatchReport {
            batch_id: Some(BatchId::new("b1")),
            stats: BatchStats {
                total: 3,
                pending: 0,
                success: 2,
                failed: 1,
            },
        };

        assert_eq!(
            report.to_string(),
            "Batch b1: total=3 success=2 failed=1 pending=0 success_rate=66.67%"
        );
    }

    #[test]
    fn empty_report_omits_rate() {
        let report = BatchReport {
            batch_id: None,
            stats: BatchStats::default(),
        };

        assert_eq!(
            report.to_string(),
            "Batch unassigned: total=0 success=0 failed=0 pending=0"
        );
    }
}
