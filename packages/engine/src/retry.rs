//! Drives one alpha to a terminal outcome.

use std::sync::Arc;

use sim_core::{AlphaSpec, AlphaSubmitter, CredentialProvider, JobStore, SubmitError};

use crate::{RetryConfig, SessionHandle};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the delay, refreshing the session first if asked.
    Retry { reauthenticate: bool },
    /// Attempts are exhausted.
    GiveUp,
}

/// Decide the next step after `attempt` failed attempts.
pub fn next_step(attempt: u32, max_retries: u32, error: &SubmitError) -> RetryDecision {
    if attempt >= max_retries {
        RetryDecision::GiveUp
    } else {
        RetryDecision::Retry {
            reauthenticate: error.is_auth_failure(),
        }
    }
}

/// Message stored on a record that exhausted its attempts.
pub fn failure_message(error: &SubmitError, attempts: u32) -> String {
    format!("{error} (attempts: {attempts})")
}

/// Submits an alpha with bounded, fixed-delay retries and persists the
/// terminal outcome.
pub struct RetryController<P, T, S>
where
    P: CredentialProvider,
{
    session: Arc<SessionHandle<P>>,
    submitter: T,
    store: Arc<S>,
    config: RetryConfig,
}

impl<P, T, S> RetryController<P, T, S>
where
    P: CredentialProvider,
    T: AlphaSubmitter<P::Session>,
    S: JobStore,
{
    pub fn new(
        session: Arc<SessionHandle<P>>,
        submitter: T,
        store: Arc<S>,
        config: RetryConfig,
    ) -> Self {
        Self {
            session,
            submitter,
            store,
            config: RetryConfig::new(config.max_retries, config.retry_delay),
        }
    }

    /// Run the alpha to `success` or `failed`. Returns whether it succeeded.
    pub async fn execute(&self, alpha: &AlphaSpec) -> bool {
        let fingerprint = alpha.fingerprint.as_str();
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            let (session, generation) = self.session.snapshot();
            let result = self.submitter.submit(&session, alpha).await;
            attempt += 1;

            let error = match result {
                Ok(submission) => {
                    tracing::info!(
                        fingerprint,
                        attempt,
                        remote_id = submission.remote_id.as_deref().unwrap_or_default(),
                        "Simulation created"
                    );
                    if let Err(e) = self
                        .store
                        .mark_success(fingerprint, submission.remote_id.as_deref(), attempt)
                        .await
                    {
                        tracing::warn!(fingerprint, error = %e, "Could not record success");
                    }
                    return true;
                }
                Err(error) => error,
            };

            tracing::warn!(fingerprint, attempt, max_retries, error = %error, "Attempt failed");

            match next_step(attempt, max_retries, &error) {
                RetryDecision::GiveUp => {
                    let message = failure_message(&error, attempt);
                    tracing::error!(fingerprint, attempt, error = %message, "Alpha failed");
                    if let Err(e) = self.store.mark_failed(fingerprint, &message, attempt).await {
                        tracing::warn!(fingerprint, error = %e, "Could not record failure");
                    }
                    return false;
                }
                RetryDecision::Retry { reauthenticate } => {
                    if reauthenticate
                        && let Err(e) = self.session.refresh(generation).await
                    {
                        tracing::warn!(fingerprint, attempt, error = %e, "Re-authentication failed");
                    }
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }
}
