//! Bounded fan-out of independent tasks.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinError;

/// Runs a batch of independent tasks with at most `concurrency` in flight.
///
/// One fetcher is created per page. It keeps no state between runs beyond
/// the cap itself; pacing against the upstream's request rate is left to
/// the clients' [`ApiRateLimiter`](crate::source::ApiRateLimiter).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitedFetcher {
    concurrency: usize,
}

impl RateLimitedFetcher {
    /// Create a fetcher. A cap of zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `f` over every task and collect the results in task order.
    ///
    /// A task that fails, or panics, only fills its own slot; the siblings
    /// still run to completion.
    pub async fn run<T, R, E, F, Fut>(&self, tasks: Vec<T>, f: F) -> Vec<Result<R, E>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: From<JoinError> + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        if tasks.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency.min(tasks.len())));
        let f = Arc::new(f);
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let semaphore = Arc::clone(&semaphore);
            let f = Arc::clone(&f);

            handles.push(tokio::spawn(async move {
                // The semaphore is never closed, so this only waits for a permit.
                let _permit = semaphore.acquire_owned().await.ok();
                f(task).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(E::from(e)),
            });
        }
        results
    }
}
