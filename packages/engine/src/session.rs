//! Shared, replaceable authenticated session.

use std::sync::{Arc, PoisonError, RwLock};

use sim_core::{AuthError, CredentialProvider};
use tokio::sync::Mutex;

struct Current<S> {
    session: Arc<S>,
    generation: u64,
}

/// Session shared by every worker of a dispatch.
///
/// Readers take a consistent `(session, generation)` snapshot. Replacement
/// is serialized by an async mutex so concurrent auth failures against the
/// same generation cause a single login.
pub struct SessionHandle<P: CredentialProvider> {
    provider: P,
    current: RwLock<Current<P::Session>>,
    refresh_lock: Mutex<()>,
}

impl<P: CredentialProvider> SessionHandle<P> {
    /// Log in once and wrap the resulting session.
    pub async fn connect(provider: P) -> Result<Self, AuthError> {
        let session = provider.get_session().await?;
        Ok(Self {
            provider,
            current: RwLock::new(Current {
                session: Arc::new(session),
                generation: 0,
            }),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Current session and the generation it belongs to.
    pub fn snapshot(&self) -> (Arc<P::Session>, u64) {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        (Arc::clone(&current.session), current.generation)
    }

    /// Number of times the session has been replaced.
    pub fn generation(&self) -> u64 {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Replace the session observed as `stale_generation`.
    ///
    /// If another caller already replaced it, the newer session is returned
    /// without logging in again. On login failure the old session stays.
    pub async fn refresh(&self, stale_generation: u64) -> Result<(Arc<P::Session>, u64), AuthError> {
        let _guard = self.refresh_lock.lock().await;

        let (session, generation) = self.snapshot();
        if generation != stale_generation {
            tracing::debug!(generation, "Session already refreshed");
            return Ok((session, generation));
        }

        let fresh = Arc::new(self.provider.get_session().await?);

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.session = Arc::clone(&fresh);
        current.generation += 1;
        let generation = current.generation;
        drop(current);

        tracing::info!(generation, "Session refreshed");
        Ok((fresh, generation))
    }
}
