//! Environment-driven configuration for the BRAIN client.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::BrainError;

pub const DEFAULT_API_URL: &str = "https://api.worldquantbrain.com";
pub const DEFAULT_CREDENTIALS_FILE: &str = "./account.txt";

/// Username and password used for the login handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse the credentials file body, a JSON array `["username", "password"]`.
    pub fn parse(contents: &str) -> Result<Self, BrainError> {
        let (username, password): (String, String) = serde_json::from_str(contents)?;
        Ok(Self { username, password })
    }

    /// Read and parse a credentials file.
    pub fn from_file(path: &Path) -> Result<Self, BrainError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| BrainError::CredentialsFile {
                path: path.display().to_string(),
                source,
            })?;
        Self::parse(&contents)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// BRAIN client configuration.
#[derive(Debug, Clone)]
pub struct BrainConfig {
    /// Base URL of the service, without trailing slash.
    pub api_url: String,
    /// Credentials file consulted when no inline credentials are set.
    pub credentials_file: PathBuf,
    /// Inline credentials; take precedence over the file.
    pub credentials: Option<Credentials>,
    /// Transport timeout for every request. `None` leaves it to the transport.
    pub request_timeout: Option<Duration>,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            credentials_file: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            credentials: None,
            request_timeout: None,
        }
    }
}

impl BrainConfig {
    /// Build a config from environment variables.
    ///
    /// - `BRAIN_API_URL` (default: `https://api.worldquantbrain.com`)
    /// - `BRAIN_CREDENTIALS_FILE` (default: `./account.txt`)
    /// - `BRAIN_USERNAME` / `BRAIN_PASSWORD` (optional, both or neither)
    /// - `BRAIN_REQUEST_TIMEOUT_SECS` (optional)
    pub fn from_env() -> Result<Self, BrainError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, BrainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let credentials = match (value("BRAIN_USERNAME"), value("BRAIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            (None, None) => None,
            _ => {
                return Err(BrainError::Config(
                    "BRAIN_USERNAME and BRAIN_PASSWORD must be set together".into(),
                ));
            }
        };

        let request_timeout = value("BRAIN_REQUEST_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                    BrainError::Config(format!("BRAIN_REQUEST_TIMEOUT_SECS is not a number: {raw}"))
                })
            })
            .transpose()?;

        Ok(Self {
            api_url: value("BRAIN_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            credentials_file: value("BRAIN_CREDENTIALS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_file),
            credentials,
            request_timeout,
        })
    }

    /// Point the client at another base URL.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Resolve the credentials to log in with.
    pub fn resolve_credentials(&self) -> Result<Credentials, BrainError> {
        match &self.credentials {
            Some(credentials) => Ok(credentials.clone()),
            None => Credentials::from_file(&self.credentials_file),
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}
