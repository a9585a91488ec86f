//! Object-safe seam between the dispatcher and alpha execution.

use std::future::Future;
use std::pin::Pin;

use sim_core::{AlphaSpec, AlphaSubmitter, CredentialProvider, JobStore};

use crate::RetryController;

/// Future returned by an executor; resolves to whether the alpha succeeded.
pub type ExecutorFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Runs one alpha to a terminal outcome.
pub trait AlphaExecutor: Send + Sync + 'static {
    fn run<'a>(&'a self, alpha: &'a AlphaSpec) -> ExecutorFuture<'a>;
}

impl<P, T, S> AlphaExecutor for RetryController<P, T, S>
where
    P: CredentialProvider,
    T: AlphaSubmitter<P::Session>,
    S: JobStore,
{
    fn run<'a>(&'a self, alpha: &'a AlphaSpec) -> ExecutorFuture<'a> {
        Box::pin(self.execute(alpha))
    }
}

/// A simple function-based executor.
pub struct FnExecutor<F>
where
    F: Fn(&AlphaSpec) -> ExecutorFuture<'static> + Send + Sync + 'static,
{
    executor: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&AlphaSpec) -> ExecutorFuture<'static> + Send + Sync + 'static,
{
    pub fn new(executor: F) -> Self {
        Self { executor }
    }
}

impl<F> AlphaExecutor for FnExecutor<F>
where
    F: Fn(&AlphaSpec) -> ExecutorFuture<'static> + Send + Sync + 'static,
{
    fn run<'a>(&'a self, alpha: &'a AlphaSpec) -> ExecutorFuture<'a> {
        (self.executor)(alpha)
    }
}
