//! Alpha repository implementing the job store contract.

use std::collections::BTreeMap;
use std::sync::{LazyLock, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use ulid::{Generator, Ulid};
use sim_core::{AlphaRecord, AlphaSpec, AlphaStatus, BatchId, BatchStats, JobStore, StoreError};

use crate::{Database, DbError};

/// Repository for alpha persistence operations.
#[derive(Clone)]
pub struct AlphaRepository {
    db: Database,
}

/// Internal record type for SurrealDB reads.
#[derive(Debug, Deserialize)]
struct AlphaRow {
    fingerprint: String,
    alpha_type: String,
    settings: serde_json::Value,
    status: AlphaStatus,
    remote_id: Option<String>,
    attempt_count: u32,
    batch_id: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AlphaRow> for AlphaRecord {
    fn from(row: AlphaRow) -> Self {
        AlphaRecord {
            fingerprint: row.fingerprint,
            alpha_type: row.alpha_type,
            settings: row.settings,
            status: row.status,
            remote_id: row.remote_id,
            attempt_count: row.attempt_count,
            batch_id: row.batch_id.map(BatchId::from),
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusCount {
    batch_id: Option<String>,
    status: String,
    count: i64,
}

const INSERT_IN_BATCH: &str = r#"
CREATE type::thing('alpha', $id) SET
    fingerprint = $fingerprint,
    alpha_type = $alpha_type,
    settings = $settings,
    status = "pending",
    attempt_count = 0,
    batch_id = $batch_id,
    created_at = time::now(),
    updated_at = time::now()
"#;

const INSERT_UNASSIGNED: &str = r#"
CREATE type::thing('alpha', $id) SET
    fingerprint = $fingerprint,
    alpha_type = $alpha_type,
    settings = $settings,
    status = "pending",
    attempt_count = 0,
    created_at = time::now(),
    updated_at = time::now()
"#;

/// Attempts for one insert that keeps losing commit races.
const MAX_CONFLICT_RETRIES: u32 = 32;

/// Record ids increase with insertion order within the process, so they
/// break `created_at` ties the same way insertion order does.
static RECORD_IDS: LazyLock<Mutex<Generator>> = LazyLock::new(|| Mutex::new(Generator::new()));

fn next_record_id() -> String {
    let mut generator = RECORD_IDS.lock().unwrap_or_else(PoisonError::into_inner);
    generator
        .generate()
        .unwrap_or_else(|_| Ulid::new())
        .to_string()
}

/// SurrealDB reports unique index violations as "... already contains ...".
fn is_duplicate(err: &surrealdb::Error) -> bool {
    err.to_string().contains("already contains")
}

/// Optimistic transactions that lost a race report themselves as retryable.
fn is_conflict(err: &surrealdb::Error) -> bool {
    let message = err.to_string();
    message.contains("can be retried") || message.contains("read or write conflict")
}

/// Short randomized backoff so racing inserts do not collide again in lockstep.
fn conflict_backoff(attempt: u32) -> Duration {
    let jitter = (Ulid::new().random() % 4) as u64;
    Duration::from_millis(u64::from(attempt.min(10)) * 2 + jitter)
}

impl AlphaRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert one pending alpha. Returns `false` when the fingerprint exists.
    ///
    /// Commit conflicts with a concurrent insert are retried; the retry then
    /// sees the winner's record as a duplicate when both carried the same
    /// fingerprint.
    async fn insert(&self, alpha: &AlphaSpec, batch_id: Option<&BatchId>) -> Result<bool, DbError> {
        let id = next_record_id();
        let mut attempt = 1;

        loop {
            match self.try_insert(&id, alpha, batch_id).await {
                Ok(()) => return Ok(true),
                Err(e) if is_duplicate(&e) => {
                    tracing::debug!(fingerprint = %alpha.fingerprint, "Skipping duplicate alpha");
                    return Ok(false);
                }
                Err(e) if is_conflict(&e) && attempt < MAX_CONFLICT_RETRIES => {
                    tracing::debug!(fingerprint = %alpha.fingerprint, attempt, "Retrying conflicted insert");
                    tokio::time::sleep(conflict_backoff(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn try_insert(
        &self,
        id: &str,
        alpha: &AlphaSpec,
        batch_id: Option<&BatchId>,
    ) -> Result<(), surrealdb::Error> {
        let query = match batch_id {
            Some(_) => INSERT_IN_BATCH,
            None => INSERT_UNASSIGNED,
        };

        let mut request = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("fingerprint", alpha.fingerprint.clone()))
            .bind(("alpha_type", alpha.alpha_type.clone()))
            .bind(("settings", alpha.settings.clone()));
        if let Some(batch_id) = batch_id {
            request = request.bind(("batch_id", batch_id.to_string()));
        }

        request.await?.check()?;
        Ok(())
    }

    /// Apply a terminal-state update to one record by fingerprint.
    async fn update_one(
        &self,
        query: &str,
        fingerprint: &str,
        bindings: Vec<(&'static str, serde_json::Value)>,
    ) -> Result<(), DbError> {
        let mut request = self
            .db
            .query(query)
            .bind(("fingerprint", fingerprint.to_string()));
        for binding in bindings {
            request = request.bind(binding);
        }

        let mut response = request.await?;
        let rows: Vec<AlphaRow> = response.take(0)?;

        if rows.is_empty() {
            Err(DbError::NotFound(fingerprint.to_string()))
        } else {
            Ok(())
        }
    }

    /// Run an update returning changed rows, and count them.
    async fn update_many(
        &self,
        query: &str,
        bindings: Vec<(&'static str, serde_json::Value)>,
    ) -> Result<usize, DbError> {
        let mut request = self.db.query(query);
        for binding in bindings {
            request = request.bind(binding);
        }

        let mut response = request.await?;
        let rows: Vec<AlphaRow> = response.take(0)?;

        Ok(rows.len())
    }

    async fn count_by_batch_and_status(
        &self,
        batch_id: Option<&BatchId>,
    ) -> Result<Vec<StatusCount>, DbError> {
        let mut response = match batch_id {
            Some(batch_id) => {
                self.db
                    .query(
                        r#"
                        SELECT batch_id, status, count() AS count
                        FROM alpha
                        WHERE batch_id = $batch_id
                        GROUP BY batch_id, status
                        "#,
                    )
                    .bind(("batch_id", batch_id.to_string()))
                    .await?
            }
            None => {
                self.db
                    .query(
                        r#"
                        SELECT batch_id, status, count() AS count
                        FROM alpha
                        GROUP BY batch_id, status
                        "#,
                    )
                    .await?
            }
        };

        Ok(response.take(0)?)
    }
}

fn accumulate(stats: &mut BatchStats, count: &StatusCount) {
    match count.status.parse::<AlphaStatus>() {
        Ok(status) => stats.record(status, count.count.max(0) as u64),
        Err(e) => tracing::warn!("Ignoring stored alpha status: {}", e),
    }
}

fn fingerprint_list(fingerprints: &[String]) -> serde_json::Value {
    serde_json::json!(fingerprints)
}

impl JobStore for AlphaRepository {
    async fn enqueue(
        &self,
        alphas: &[AlphaSpec],
        batch_id: Option<&BatchId>,
    ) -> Result<usize, StoreError> {
        let mut inserted = 0;
        let mut duplicates = 0;
        let mut errors = Vec::new();
        for alpha in alphas {
            match self.insert(alpha, batch_id).await {
                Ok(true) => inserted += 1,
                Ok(false) => duplicates += 1,
                Err(e) => {
                    tracing::error!(fingerprint = %alpha.fingerprint, error = %e, "Failed to store alpha");
                    errors.push(e);
                }
            }
        }

        if duplicates > 0 {
            tracing::info!("Skipped {} alphas that were already stored", duplicates);
        }

        // Nothing could be written at all: surface the backend failure.
        if inserted == 0 && duplicates == 0 && let Some(first) = errors.into_iter().next() {
            return Err(first.into());
        }

        Ok(inserted)
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<AlphaRecord>, StoreError> {
        let mut response = self
            .db
            .query("SELECT * FROM alpha WHERE fingerprint = $fingerprint LIMIT 1")
            .bind(("fingerprint", fingerprint.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AlphaRow> = response.take(0).map_err(DbError::from)?;

        Ok(rows.into_iter().next().map(AlphaRecord::from))
    }

    async fn mark_success(
        &self,
        fingerprint: &str,
        remote_id: Option<&str>,
        attempts: u32,
    ) -> Result<(), StoreError> {
        let attempts = serde_json::json!(attempts);
        let result = match remote_id {
            Some(remote_id) => {
                self.update_one(
                    r#"
                    UPDATE alpha SET
                        status = "success",
                        remote_id = $remote_id,
                        attempt_count += $attempts,
                        updated_at = time::now()
                    WHERE fingerprint = $fingerprint
                    RETURN AFTER
                    "#,
                    fingerprint,
                    vec![
                        ("remote_id", serde_json::json!(remote_id)),
                        ("attempts", attempts),
                    ],
                )
                .await
            }
            None => {
                self.update_one(
                    r#"
                    UPDATE alpha SET
                        status = "success",
                        attempt_count += $attempts,
                        updated_at = time::now()
                    WHERE fingerprint = $fingerprint
                    RETURN AFTER
                    "#,
                    fingerprint,
                    vec![("attempts", attempts)],
                )
                .await
            }
        };

        Ok(result?)
    }

    async fn mark_failed(
        &self,
        fingerprint: &str,
        error_message: &str,
        attempts: u32,
    ) -> Result<(), StoreError> {
        self.update_one(
            r#"
            UPDATE alpha SET
                status = "failed",
                error_message = $error_message,
                attempt_count += $attempts,
                updated_at = time::now()
            WHERE fingerprint = $fingerprint
            RETURN AFTER
            "#,
            fingerprint,
            vec![
                ("error_message", serde_json::json!(error_message)),
                ("attempts", serde_json::json!(attempts)),
            ],
        )
        .await?;

        Ok(())
    }

    async fn reassign_pending_to_batch(
        &self,
        fingerprints: &[String],
        batch_id: &BatchId,
    ) -> Result<usize, StoreError> {
        if fingerprints.is_empty() {
            return Ok(0);
        }

        let moved = self
            .update_many(
                r#"
                UPDATE alpha SET
                    batch_id = $batch_id,
                    updated_at = time::now()
                WHERE status = "pending" AND fingerprint IN $fingerprints
                RETURN AFTER
                "#,
                vec![
                    ("batch_id", serde_json::json!(batch_id.as_str())),
                    ("fingerprints", fingerprint_list(fingerprints)),
                ],
            )
            .await?;

        Ok(moved)
    }

    async fn requeue_failed(
        &self,
        fingerprints: &[String],
        batch_id: &BatchId,
    ) -> Result<usize, StoreError> {
        if fingerprints.is_empty() {
            return Ok(0);
        }

        let requeued = self
            .update_many(
                r#"
                UPDATE alpha SET
                    status = "pending",
                    batch_id = $batch_id,
                    updated_at = time::now()
                WHERE status = "failed" AND fingerprint IN $fingerprints
                RETURN AFTER
                "#,
                vec![
                    ("batch_id", serde_json::json!(batch_id.as_str())),
                    ("fingerprints", fingerprint_list(fingerprints)),
                ],
            )
            .await?;

        Ok(requeued)
    }

    async fn clean_pending(&self) -> Result<usize, StoreError> {
        let cleaned = self
            .update_many(
                r#"
                UPDATE alpha SET
                    batch_id = NONE,
                    attempt_count = 0,
                    updated_at = time::now()
                WHERE status = "pending" AND (batch_id != NONE OR attempt_count != 0)
                RETURN AFTER
                "#,
                Vec::new(),
            )
            .await?;

        tracing::info!("Cleaned batch_id for {} pending alphas", cleaned);

        Ok(cleaned)
    }

    async fn fetch_by_status(
        &self,
        status: AlphaStatus,
        unassigned_only: bool,
    ) -> Result<Vec<AlphaRecord>, StoreError> {
        let query = if unassigned_only {
            "SELECT * FROM alpha WHERE status = $status AND batch_id = NONE ORDER BY created_at ASC, id ASC"
        } else {
            "SELECT * FROM alpha WHERE status = $status ORDER BY created_at ASC, id ASC"
        };

        let mut response = self
            .db
            .query(query)
            .bind(("status", status.as_str()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AlphaRow> = response.take(0).map_err(DbError::from)?;

        Ok(rows.into_iter().map(AlphaRecord::from).collect())
    }

    async fn batch_statistics(&self, batch_id: &BatchId) -> Result<BatchStats, StoreError> {
        let counts = self.count_by_batch_and_status(Some(batch_id)).await?;

        let mut stats = BatchStats::default();
        for count in &counts {
            accumulate(&mut stats, count);
        }

        Ok(stats)
    }

    async fn all_statistics(&self) -> Result<BTreeMap<Option<BatchId>, BatchStats>, StoreError> {
        let counts = self.count_by_batch_and_status(None).await?;

        let mut all: BTreeMap<Option<BatchId>, BatchStats> = BTreeMap::new();
        for count in &counts {
            let key = count.batch_id.clone().map(BatchId::from);
            accumulate(all.entry(key).or_default(), count);
        }

        Ok(all)
    }
}
