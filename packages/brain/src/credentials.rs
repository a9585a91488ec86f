//! Login handshake that yields authenticated sessions.

use reqwest::StatusCode;
use sim_core::{AuthError, CredentialProvider};

use crate::{BrainConfig, BrainError, Credentials};

/// An authenticated HTTP client bound to one BRAIN login.
///
/// The session cookie lives in the client's cookie store, so every request
/// made through [`BrainSession::client`] is authenticated.
#[derive(Debug, Clone)]
pub struct BrainSession {
    client: reqwest::Client,
    config: BrainConfig,
}

impl BrainSession {
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Absolute URL for a path on the service.
    pub fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }
}

/// Credential provider that logs in with basic auth on every call.
#[derive(Debug, Clone)]
pub struct BrainCredentials {
    config: BrainConfig,
    credentials: Credentials,
}

impl BrainCredentials {
    /// Resolve credentials up front so a missing file fails at startup.
    pub fn new(config: BrainConfig) -> Result<Self, BrainError> {
        let credentials = config.resolve_credentials()?;
        Ok(Self {
            config,
            credentials,
        })
    }

    fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(timeout) = self.config.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }
}

impl CredentialProvider for BrainCredentials {
    type Session = BrainSession;

    async fn get_session(&self) -> Result<BrainSession, AuthError> {
        let client = self
            .build_client()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let response = client
            .post(self.config.endpoint("/authentication"))
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::CREATED {
            tracing::warn!(status = status.as_u16(), "Authentication rejected");
            return Err(AuthError::Rejected(status.as_u16()));
        }

        tracing::info!(username = %self.credentials.username, "Authenticated with BRAIN");

        Ok(BrainSession {
            client,
            config: self.config.clone(),
        })
    }
}
