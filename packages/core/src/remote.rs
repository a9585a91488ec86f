//! Contracts for the remote simulation service.

use std::future::Future;

use thiserror::Error;

use crate::AlphaSpec;

/// Why a submission attempt did not produce a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The session is no longer accepted (401/403).
    #[error("authentication rejected with status {0}")]
    Unauthorized(u16),
    /// The service refused the simulation.
    #[error("simulation failed with status {0}")]
    Rejected(u16),
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SubmitError {
    /// Classify a non-created HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => SubmitError::Unauthorized(status),
            other => SubmitError::Rejected(other),
        }
    }

    /// Whether a fresh session is needed before the next attempt.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, SubmitError::Unauthorized(_))
    }
}

/// Why a login handshake failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authentication failed with status code: {0}")]
    Rejected(u16),
    #[error("authentication transport error: {0}")]
    Transport(String),
}

/// Acknowledgment of an accepted simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    /// Id parsed from the response location; `None` when it was unusable.
    pub remote_id: Option<String>,
}

impl Submission {
    pub fn new(remote_id: Option<String>) -> Self {
        Self { remote_id }
    }
}

/// Supplies authenticated sessions, logging in on every call.
pub trait CredentialProvider: Send + Sync + 'static {
    type Session: Send + Sync + 'static;

    fn get_session(&self) -> impl Future<Output = Result<Self::Session, AuthError>> + Send;
}

/// Performs the single remote call that submits one alpha.
pub trait AlphaSubmitter<S>: Send + Sync + 'static {
    fn submit(
        &self,
        session: &S,
        alpha: &AlphaSpec,
    ) -> impl Future<Output = Result<Submission, SubmitError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_are_classified_separately() {
        assert!(SubmitError::from_status(401).is_auth_failure());
        assert!(SubmitError::from_status(403).is_auth_failure());
        assert_eq!(SubmitError::from_status(429), SubmitError::Rejected(429));
        assert!(!SubmitError::Transport("reset".into()).is_auth_failure());
    }
}
