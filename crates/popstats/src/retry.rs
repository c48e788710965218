//! Backoff configuration and retry helpers for upstream calls.
//!
//! Rate-limited listing requests are retried in place with [`with_retry`].
//! Store transactions that lose a write race run again through
//! [`with_store_retry`]. Chain steps that fail transiently are redelivered by
//! the scheduler after [`redelivery_delay`].

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder, Retryable};

use crate::store::StoreError;
use crate::sync::{
    INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_LISTING_RETRIES, ProgressCallback, SyncProgress, emit,
};

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: MAX_LISTING_RETRIES,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// The default backoff: 1s doubling up to 60s, 5 retries, with jitter.
#[must_use]
pub fn default_backoff() -> ExponentialBuilder {
    RetryConfig::default().into_backoff()
}

/// First delay before a contended store transaction runs again.
const CONTENTION_MIN_DELAY: Duration = Duration::from_millis(5);

const CONTENTION_MAX_DELAY: Duration = Duration::from_millis(250);

const MAX_CONTENTION_RETRIES: usize = 24;

/// Backoff for store transactions. Jitter spreads writers that collided.
fn contention_backoff() -> ExponentialBuilder {
    RetryConfig::new(CONTENTION_MIN_DELAY, CONTENTION_MAX_DELAY, MAX_CONTENTION_RETRIES)
        .into_backoff()
}

/// Run a store transaction, running it again while it loses write races.
///
/// `operation` must open and commit its own transaction so every attempt
/// reads fresh state. Errors other than [`StoreError::is_contention`] are
/// returned immediately.
pub async fn with_store_retry<T, F, Fut>(operation: F, label: &str) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    operation
        .retry(contention_backoff())
        .notify(|err, dur| {
            tracing::debug!(label, retry_in = ?dur, error = %err, "Store write contended, retrying");
        })
        .when(StoreError::is_contention)
        .await
}

/// Delay before delivering a failed chain step again.
///
/// `delivery` is the 1-based number of the delivery that just failed. The
/// schedule follows [`RetryConfig`] without jitter and stays at the maximum
/// delay once the exponential sequence is exhausted.
#[must_use]
pub fn redelivery_delay(config: &RetryConfig, delivery: u32) -> Duration {
    let index = delivery.saturating_sub(1) as usize;
    RetryConfig {
        max_retries: index + 1,
        with_jitter: false,
        ..config.clone()
    }
    .into_backoff()
    .build()
    .nth(index)
    .unwrap_or(config.max_delay)
}

/// Execute an operation, retrying while it fails with a rate limit error.
///
/// Each backoff is reported as [`SyncProgress::RateLimitBackoff`] and logged
/// at debug level. Errors for which `is_rate_limit` returns false are
/// returned immediately.
pub async fn with_retry<T, E, F, Fut, IsRateLimit, ShortMsg>(
    mut operation: F,
    is_rate_limit: IsRateLimit,
    short_message: ShortMsg,
    owner: &str,
    name: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
    IsRateLimit: Fn(&E) -> bool + Send + Sync + 'static,
    ShortMsg: Fn(&E) -> String + Send + Sync + 'static,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(default_backoff())
        .notify(|err, dur| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            emit(
                on_progress,
                SyncProgress::RateLimitBackoff {
                    owner: owner.to_string(),
                    name: name.to_string(),
                    retry_after_ms: dur.as_millis() as u64,
                    attempt: current_attempt,
                },
            );
            tracing::debug!(
                owner,
                name,
                attempt = current_attempt,
                retry_in = ?dur,
                error = %short_message(err),
                "Rate limited, backing off"
            );
        })
        .when(is_rate_limit)
        .await
}
