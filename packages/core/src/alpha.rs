//! Alpha domain types: the submitted job specification and its persisted record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::BatchId;

/// Job type used for plain fast-expression alphas.
pub const REGULAR_TYPE: &str = "REGULAR";

/// Default settings template for `REGULAR` alphas.
pub fn default_settings() -> Value {
    serde_json::json!({
        "instrumentType": "EQUITY",
        "region": "USA",
        "universe": "TOP3000",
        "delay": 1,
        "decay": 0,
        "neutralization": "SUBINDUSTRY",
        "truncation": 0.01,
        "pasteurization": "ON",
        "unitHandling": "VERIFY",
        "nanHandling": "ON",
        "language": "FASTEXPR",
        "visualization": false,
    })
}

/// Specification of one alpha, sent verbatim as the simulation request body.
///
/// The `regular` expression doubles as the fingerprint: two specs with the
/// same expression are the same job as far as the store is concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaSpec {
    #[serde(rename = "type")]
    pub alpha_type: String,
    pub settings: Value,
    #[serde(rename = "regular")]
    pub fingerprint: String,
}

impl AlphaSpec {
    pub fn new(
        alpha_type: impl Into<String>,
        settings: Value,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            alpha_type: alpha_type.into(),
            settings,
            fingerprint: fingerprint.into(),
        }
    }

    /// Build a `REGULAR` alpha using the default settings template.
    pub fn regular(expression: impl Into<String>) -> Self {
        Self::new(REGULAR_TYPE, default_settings(), expression)
    }

    /// Override a single settings key.
    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        match self.settings.as_object_mut() {
            Some(settings) => {
                settings.insert(key.into(), value);
            }
            None => {
                let mut settings = Map::new();
                settings.insert(key.into(), value);
                self.settings = Value::Object(settings);
            }
        }
        self
    }
}

/// Lifecycle status of a stored alpha.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlphaStatus {
    /// Enqueued and waiting for a (re)run.
    #[default]
    Pending,
    /// The remote service accepted the simulation.
    Success,
    /// Every attempt was used up.
    Failed,
}

impl AlphaStatus {
    /// Check if the engine is done with records in this status.
    pub fn is_terminal(self) -> bool {
        match self {
            AlphaStatus::Pending => false,
            AlphaStatus::Success | AlphaStatus::Failed => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlphaStatus::Pending => "pending",
            AlphaStatus::Success => "success",
            AlphaStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AlphaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown alpha status: {0}")]
pub struct ParseStatusError(pub String);

impl std::str::FromStr for AlphaStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AlphaStatus::Pending),
            "success" => Ok(AlphaStatus::Success),
            "failed" => Ok(AlphaStatus::Failed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Persisted state of one alpha.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaRecord {
    /// Canonical expression, unique across the store.
    pub fingerprint: String,
    pub alpha_type: String,
    pub settings: Value,
    pub status: AlphaStatus,
    /// Simulation id assigned by the remote service on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Attempts consumed by terminal writes so far.
    #[serde(default)]
    pub attempt_count: u32,
    /// `None` means the record is not part of any active batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
    /// Last failure reason, kept across reruns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlphaRecord {
    /// Create a fresh pending record for a spec.
    pub fn pending(spec: &AlphaSpec, batch_id: Option<BatchId>) -> Self {
        let now = Utc::now();
        Self {
            fingerprint: spec.fingerprint.clone(),
            alpha_type: spec.alpha_type.clone(),
            settings: spec.settings.clone(),
            status: AlphaStatus::Pending,
            remote_id: None,
            attempt_count: 0,
            batch_id,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Re-derive the original job specification.
    pub fn spec(&self) -> AlphaSpec {
        AlphaSpec::new(&self.alpha_type, self.settings.clone(), &self.fingerprint)
    }
}
