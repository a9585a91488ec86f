#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use engine::{
    AlphaExecutor, BatchDispatcher, BatchRunner, DispatchConfig, RetryConfig, RetryController,
    SessionHandle,
};
use sim_core::{
    AlphaSpec, AlphaSubmitter, AuthError, CredentialProvider, MemoryJobStore, SubmitError,
    Submission,
};

/// Provider whose session is the login number, starting at 1.
#[derive(Clone, Default)]
pub struct CountingProvider {
    pub logins: Arc<AtomicU64>,
    pub reject: Arc<AtomicBool>,
}

impl CredentialProvider for CountingProvider {
    type Session = u64;

    async fn get_session(&self) -> Result<u64, AuthError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(AuthError::Rejected(503));
        }
        Ok(self.logins.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub fingerprint: String,
    pub session: u64,
}

type Script = dyn Fn(&str, u64) -> Result<Submission, SubmitError> + Send + Sync;

/// Submitter answering from a script of `(fingerprint, session) -> result`.
#[derive(Clone)]
pub struct ScriptedSubmitter {
    script: Arc<Script>,
    latency: Duration,
    pub calls: Arc<Mutex<Vec<Call>>>,
}

impl ScriptedSubmitter {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str, u64) -> Result<Submission, SubmitError> + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(script),
            latency: Duration::ZERO,
            calls: Arc::default(),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl AlphaSubmitter<u64> for ScriptedSubmitter {
    async fn submit(&self, session: &u64, alpha: &AlphaSpec) -> Result<Submission, SubmitError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call {
                fingerprint: alpha.fingerprint.clone(),
                session: *session,
            });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.script)(&alpha.fingerprint, *session)
    }
}

pub fn created(remote_id: &str) -> Result<Submission, SubmitError> {
    Ok(Submission::new(Some(remote_id.to_string())))
}

pub fn specs(expressions: &[&str]) -> Vec<AlphaSpec> {
    expressions.iter().map(|e| AlphaSpec::regular(*e)).collect()
}

pub type Controller = RetryController<CountingProvider, ScriptedSubmitter, MemoryJobStore>;

/// Everything a test needs to drive and inspect one engine.
pub struct Fixture {
    pub store: Arc<MemoryJobStore>,
    pub provider: CountingProvider,
    pub session: Arc<SessionHandle<CountingProvider>>,
    pub calls: Arc<Mutex<Vec<Call>>>,
    pub controller: Arc<Controller>,
}

impl Fixture {
    pub async fn new(submitter: ScriptedSubmitter, retry: RetryConfig) -> Result<Self, AuthError> {
        let provider = CountingProvider::default();
        let session = Arc::new(SessionHandle::connect(provider.clone()).await?);
        let store = Arc::new(MemoryJobStore::new());
        let calls = Arc::clone(&submitter.calls);
        let controller = Arc::new(RetryController::new(
            Arc::clone(&session),
            submitter,
            Arc::clone(&store),
            retry,
        ));

        Ok(Self {
            store,
            provider,
            session,
            calls,
            controller,
        })
    }

    pub fn dispatcher(&self, config: DispatchConfig) -> BatchDispatcher {
        let executor: Arc<dyn AlphaExecutor> = self.controller.clone();
        BatchDispatcher::new(executor, config)
    }

    pub fn runner(&self, config: DispatchConfig) -> BatchRunner<MemoryJobStore> {
        BatchRunner::new(Arc::clone(&self.store), self.dispatcher(config))
    }

    pub fn logins(&self) -> u64 {
        self.provider.logins.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls_for(&self, fingerprint: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.fingerprint == fingerprint)
            .count()
    }
}

pub fn retry(max_retries: u32) -> RetryConfig {
    RetryConfig::new(max_retries, Duration::from_secs(10))
}

pub fn dispatch(batch_size: usize, max_workers: usize) -> DispatchConfig {
    DispatchConfig::new(batch_size, max_workers, Duration::from_secs(5))
}
