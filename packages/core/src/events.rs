//! Event types for dispatch progress updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::BatchId;

/// Events emitted while a batch is being dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimulationEvent {
    /// An alpha reached `success`.
    AlphaSucceeded {
        fingerprint: String,
        timestamp: DateTime<Utc>,
    },
    /// An alpha reached `failed`.
    AlphaFailed {
        fingerprint: String,
        timestamp: DateTime<Utc>,
    },
    /// Executing an alpha panicked; it stays incomplete for this pass.
    AlphaPanicked {
        fingerprint: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// Every alpha of a slice reached an outcome.
    SliceCompleted {
        batch_id: Option<BatchId>,
        slice: usize,
        processed: usize,
        total: usize,
        succeeded: usize,
        timestamp: DateTime<Utc>,
    },
    /// Every slice of a dispatch finished.
    BatchCompleted {
        batch_id: Option<BatchId>,
        processed: usize,
        succeeded: usize,
        timestamp: DateTime<Utc>,
    },
}

impl SimulationEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SimulationEvent::AlphaSucceeded { timestamp, .. } => *timestamp,
            SimulationEvent::AlphaFailed { timestamp, .. } => *timestamp,
            SimulationEvent::AlphaPanicked { timestamp, .. } => *timestamp,
            SimulationEvent::SliceCompleted { timestamp, .. } => *timestamp,
            SimulationEvent::BatchCompleted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the fingerprint associated with this event, if any.
    pub fn fingerprint(&self) -> Option<&str> {
        match self {
            SimulationEvent::AlphaSucceeded { fingerprint, .. }
            | SimulationEvent::AlphaFailed { fingerprint, .. }
            | SimulationEvent::AlphaPanicked { fingerprint, .. } => Some(fingerprint),
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            SimulationEvent::AlphaSucceeded { fingerprint, .. } => {
                format!("Alpha {} succeeded", fingerprint)
            }
            SimulationEvent::AlphaFailed { fingerprint, .. } => {
                format!("Alpha {} failed", fingerprint)
            }
            SimulationEvent::AlphaPanicked {
                fingerprint,
                message,
                ..
            } => format!("Alpha {} panicked: {}", fingerprint, message),
            SimulationEvent::SliceCompleted {
                slice,
                processed,
                total,
                ..
            } => format!("Slice {} done ({}/{})", slice, processed, total),
            SimulationEvent::BatchCompleted {
                batch_id,
                processed,
                succeeded,
                ..
            } => {
                let batch = batch_id.as_ref().map_or("-", |b| b.as_str());
                format!("Batch {} done: {}/{} succeeded", batch, succeeded, processed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_alpha_events_carry_a_fingerprint() {
        let at = Utc::now();
        let failed = SimulationEvent::AlphaFailed {
            fingerprint: "rank(close)".into(),
            timestamp: at,
        };
        let done = SimulationEvent::BatchCompleted {
            batch_id: None,
            processed: 3,
            succeeded: 2,
            timestamp: at,
        };

        assert_eq!(failed.fingerprint(), Some("rank(close)"));
        assert_eq!(done.fingerprint(), None);
        assert_eq!(done.timestamp(), at);
        assert_eq!(done.description(), "Batch - done: 2/3 succeeded");
    }
}
