//! Simulation engine.
//!
//! This crate drives alphas from the job store to the remote service.
//!
//! # Architecture
//!
//! - `SessionHandle` - Shared authenticated session, replaced under a lock
//! - `RetryController` - Runs one alpha to `success` or `failed`
//! - `BatchDispatcher` - Slices alphas and runs each slice on a pool of
//!   worker actors pulling from a slice actor
//! - `BatchRunner` - Run-new-batch and rerun-by-status entry points
//! - `ProgressReporter` - Read-only statistics views
//!
//! # Usage
//!
//! ```ignore
//! let session = Arc::new(SessionHandle::connect(provider).await?);
//! let controller = RetryController::new(session, submitter, store.clone(), RetryConfig::default());
//! let dispatcher = BatchDispatcher::new(Arc::new(controller), DispatchConfig::default());
//! let run = BatchRunner::new(store, dispatcher).run_new_batch(&specs).await?;
//! ```

mod config;
mod dispatcher;
mod error;
mod executor;
mod messages;
mod progress;
mod retry;
mod runner;
mod session;
mod slice_actor;
mod worker_actor;

pub use config::{DispatchConfig, EngineConfig, RetryConfig};
pub use dispatcher::{BatchDispatcher, DispatchSummary, SliceSummary};
pub use error::EngineError;
pub use executor::{AlphaExecutor, ExecutorFuture, FnExecutor};
pub use progress::{BatchReport, ProgressReporter};
pub use retry::{RetryController, RetryDecision, failure_message, next_step};
pub use runner::{BatchRun, BatchRunner};
pub use session::SessionHandle;
