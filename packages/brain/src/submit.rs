//! The single remote call that starts one simulation.

use reqwest::StatusCode;
use reqwest::header::LOCATION;
use sim_core::{AlphaSpec, AlphaSubmitter, SubmitError, Submission};

use crate::{BrainError, BrainSession};

/// Submits alphas with `POST /simulations`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrainSubmitter;

impl BrainSubmitter {
    pub fn new() -> Self {
        Self
    }

    /// Submit a simulated alpha for review with `GET /alphas/{id}/submit`.
    ///
    /// Returns the response document as-is.
    pub async fn submit_alpha(
        &self,
        session: &BrainSession,
        alpha_id: &str,
    ) -> Result<serde_json::Value, BrainError> {
        let alpha_id = alpha_id.trim();
        if alpha_id.is_empty() || alpha_id.contains('/') {
            return Err(BrainError::Config(format!("invalid alpha id: {alpha_id:?}")));
        }

        let response = session
            .client()
            .get(session.url(&format!("/alphas/{alpha_id}/submit")))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

impl AlphaSubmitter<BrainSession> for BrainSubmitter {
    async fn submit(
        &self,
        session: &BrainSession,
        alpha: &AlphaSpec,
    ) -> Result<Submission, SubmitError> {
        let response = session
            .client()
            .post(session.url("/simulations"))
            .json(alpha)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(SubmitError::from_status(status.as_u16()));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok());
        let remote_id = location.and_then(remote_id_from_location);
        if remote_id.is_none() {
            tracing::warn!(
                fingerprint = %alpha.fingerprint,
                location = location.unwrap_or_default(),
                "Simulation created without a usable location"
            );
        }

        Ok(Submission::new(remote_id))
    }
}

/// Last non-empty path segment of a location header value.
///
/// Accepts absolute URLs and bare paths; query and fragment are ignored.
pub fn remote_id_from_location(location: &str) -> Option<String> {
    let location = location.trim();
    let without_suffix = location.split(['?', '#']).next().unwrap_or_default();
    let path = match without_suffix.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |at| &rest[at..]),
        None => without_suffix,
    };

    path.split('/')
        .rev()
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_id_is_last_path_segment() {
        assert_eq!(
            remote_id_from_location("https://api.worldquantbrain.com/simulations/3Xx9aB"),
            Some("3Xx9aB".to_string())
        );
        assert_eq!(
            remote_id_from_location("/simulations/abc/"),
            Some("abc".to_string())
        );
        assert_eq!(
            remote_id_from_location("https://h/simulations/q1?retry=1"),
            Some("q1".to_string())
        );
    }

    #[test]
    fn unusable_locations_yield_none() {
        assert_eq!(remote_id_from_location(""), None);
        assert_eq!(remote_id_from_location("///"), None);
        assert_eq!(remote_id_from_location("https://api.worldquantbrain.com"), None);
    }
}
