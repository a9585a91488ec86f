//! Client glue for the BRAIN simulation service.
//!
//! [`BrainCredentials`] performs the login handshake and hands out
//! [`BrainSession`]s; [`BrainSubmitter`] performs the single
//! `POST /simulations` call for one alpha.

mod config;
mod credentials;
mod error;
mod submit;

pub use config::{BrainConfig, Credentials, DEFAULT_API_URL, DEFAULT_CREDENTIALS_FILE};
pub use credentials::{BrainCredentials, BrainSession};
pub use error::BrainError;
pub use submit::{BrainSubmitter, remote_id_from_location};
