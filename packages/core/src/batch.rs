//! Batch identifiers and per-batch statistics.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::AlphaStatus;

/// Last timestamp handed out by [`BatchId::generate`], in microseconds.
static LAST_GENERATED_MICROS: AtomicI64 = AtomicI64::new(0);

/// Name of a group of alphas dispatched together.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a timestamp-derived id such as `20240131_154502.123456`.
    ///
    /// Ids generated by one process are strictly increasing.
    pub fn generate() -> Self {
        let now = Local::now();
        let now_micros = now.timestamp_micros();
        let micros = match LAST_GENERATED_MICROS.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |last| Some(now_micros.max(last + 1)),
        ) {
            Ok(last) | Err(last) => now_micros.max(last + 1),
        };

        let stamp = DateTime::from_timestamp_micros(micros)
            .map(|utc| utc.with_timezone(&Local))
            .unwrap_or(now);

        Self(stamp.format("%Y%m%d_%H%M%S%.6f").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BatchId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Counts per status for one batch.
///
/// `total` always equals `pending + success + failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchStats {
    pub total: u64,
    pub pending: u64,
    pub success: u64,
    pub failed: u64,
}

impl BatchStats {
    /// Add `count` records in `status`.
    pub fn record(&mut self, status: AlphaStatus, count: u64) {
        match status {
            AlphaStatus::Pending => self.pending += count,
            AlphaStatus::Success => self.success += count,
            AlphaStatus::Failed => self.failed += count,
        }
        self.total += count;
    }

    /// Count for a single status.
    pub fn count(&self, status: AlphaStatus) -> u64 {
        match status {
            AlphaStatus::Pending => self.pending,
            AlphaStatus::Success => self.success,
            AlphaStatus::Failed => self.failed,
        }
    }

    /// Success rate as a percentage of all records in the batch.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some((self.success as f64 / self.total as f64) * 100.0)
        }
    }
}
