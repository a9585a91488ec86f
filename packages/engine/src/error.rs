use sim_core::{AlphaStatus, AuthError, StoreError};
use thiserror::Error;

/// Errors surfaced by batch lifecycle operations.
///
/// Per-alpha failures never appear here; they end as `failed` records.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("cannot rerun alphas with status {0}")]
    InvalidRerunStatus(AlphaStatus),

    #[error("invalid engine configuration: {0}")]
    Config(String),

    #[error("actor error: {0}")]
    Actor(String),
}
