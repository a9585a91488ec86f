use thiserror::Error;

/// Errors raised while configuring the BRAIN client.
#[derive(Debug, Error)]
pub enum BrainError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read credentials file {path}: {source}")]
    CredentialsFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid credentials format: {0}")]
    CredentialsFormat(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
