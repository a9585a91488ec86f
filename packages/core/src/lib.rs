//! Core domain types for the alpha simulation engine.
//!
//! This crate contains shared types used across all packages:
//! - AlphaSpec, AlphaRecord and AlphaStatus for submitted work
//! - BatchId and BatchStats for batch grouping and progress
//! - The JobStore persistence contract and an in-memory implementation
//! - Remote service contracts (credentials and submission)
//! - Events for dispatch progress

mod alpha;
mod batch;
mod events;
mod memory;
mod remote;
mod store;

pub use alpha::{AlphaRecord, AlphaSpec, AlphaStatus, ParseStatusError, REGULAR_TYPE, default_settings};
pub use batch::{BatchId, BatchStats};
pub use events::SimulationEvent;
pub use memory::MemoryJobStore;
pub use remote::{AlphaSubmitter, AuthError, CredentialProvider, SubmitError, Submission};
pub use store::{JobStore, StoreError};
