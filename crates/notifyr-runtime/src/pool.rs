//! Bounded pool for blocking I/O
//!
//! Client libraries without an async API (SMTP, some SDKs) run their calls
//! here so the cooperative scheduler never stalls.

use crate::error_ext::join_error;
use notifyr_domain::error::Result;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Semaphore-bounded `spawn_blocking`
#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    max_threads: usize,
}

impl BlockingPool {
    /// Allow at most `max_threads` jobs at once
    pub fn new(max_threads: usize) -> Self {
        let max_threads = max_threads.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_threads)),
            max_threads,
        }
    }

    /// Run `job` on the blocking thread pool, waiting for a free slot first
    pub async fn run<F, T>(&self, component: &str, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| notifyr_domain::Error::internal("blocking pool closed"))?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| join_error(component, e))
    }

    /// Configured upper bound
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for BlockingPool {
    fn default() -> Self {
        Self::new(crate::constants::BLOCKING_POOL_MAX_THREADS)
    }
}
