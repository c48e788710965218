//! Deferred, at-least-once delivery of chain steps.
//!
//! [`TaskScheduler`] is the seam the driver schedules continuations through.
//! [`LocalScheduler`] implements it in-process on a tokio channel; its
//! [`StepQueue`] runs delivered steps one at a time and redelivers the ones
//! that failed transiently.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::entity::owner::Model as OwnerModel;
use crate::retry::{RetryConfig, redelivery_delay};

use super::driver::{ChainStep, SyncContext, run_step};
use super::progress::{SyncProgress, emit};
use super::types::{DEFAULT_MAX_DELIVERIES, StepOutcome};

/// How often a draining queue checks for cancellation while idle.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The receiving queue was dropped.
    #[error("scheduler queue is closed")]
    Closed,
}

/// Accepts "run this step after this delay".
///
/// Delivery is at least once and unordered relative to other steps.
pub trait TaskScheduler: Send + Sync {
    fn schedule(&self, step: ChainStep, delay: Duration) -> Result<(), SchedulerError>;
}

#[derive(Debug)]
struct Delivery {
    step: ChainStep,
    /// 1-based delivery number of this step.
    attempt: u32,
}

/// In-process scheduler backed by an unbounded channel.
///
/// Delayed steps are held by a sleeping tokio task until due. Clones share
/// the channel and the count of undelivered steps.
#[derive(Clone)]
pub struct LocalScheduler {
    tx: mpsc::UnboundedSender<Delivery>,
    pending: Arc<AtomicUsize>,
}

impl LocalScheduler {
    /// Create a scheduler and the queue that runs what it schedules.
    pub fn new() -> (Self, StepQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            tx,
            pending: Arc::new(AtomicUsize::new(0)),
        };
        let queue = StepQueue {
            rx,
            scheduler: scheduler.clone(),
            max_deliveries: DEFAULT_MAX_DELIVERIES,
            retry: RetryConfig::default(),
        };
        (scheduler, queue)
    }

    /// Steps scheduled but not yet finished.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn dispatch(&self, delivery: Delivery, delay: Duration) -> Result<(), SchedulerError> {
        if self.tx.is_closed() {
            return Err(SchedulerError::Closed);
        }
        self.pending.fetch_add(1, Ordering::AcqRel);

        if delay.is_zero() {
            return self.tx.send(delivery).map_err(|_| {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                SchedulerError::Closed
            });
        }

        let tx = self.tx.clone();
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(delivery).is_err() {
                pending.fetch_sub(1, Ordering::AcqRel);
            }
        });
        Ok(())
    }
}

impl TaskScheduler for LocalScheduler {
    fn schedule(&self, step: ChainStep, delay: Duration) -> Result<(), SchedulerError> {
        self.dispatch(Delivery { step, attempt: 1 }, delay)
    }
}

/// What a drain accomplished.
#[derive(Debug, Default)]
pub struct DrainSummary {
    /// Steps that completed.
    pub steps_run: usize,
    /// Failed deliveries that were scheduled again.
    pub redeliveries: usize,
    /// Owners whose chain reached its final page.
    pub finalized: Vec<OwnerModel>,
    /// Steps that failed fatally.
    pub fatal: Vec<(ChainStep, String)>,
    /// Steps that kept failing transiently until deliveries ran out.
    pub dropped: Vec<(ChainStep, String)>,
    /// The drain stopped on request with steps still pending.
    pub cancelled: bool,
}

impl DrainSummary {
    pub fn is_clean(&self) -> bool {
        self.fatal.is_empty() && self.dropped.is_empty() && !self.cancelled
    }
}

/// Receiving end of a [`LocalScheduler`].
pub struct StepQueue {
    rx: mpsc::UnboundedReceiver<Delivery>,
    scheduler: LocalScheduler,
    max_deliveries: u32,
    retry: RetryConfig,
}

impl StepQueue {
    /// Cap deliveries of a single step, the first one included.
    #[must_use]
    pub fn with_max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries.max(1);
        self
    }

    /// Backoff between deliveries of a failed step.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run delivered steps until nothing is pending or `is_cancelled` is set.
    ///
    /// Steps run one at a time. A transient failure is delivered again after
    /// [`redelivery_delay`]; a fatal one ends that owner's chain and the
    /// queue carries on with the others.
    pub async fn drain(
        &mut self,
        ctx: &SyncContext,
        is_cancelled: &(dyn Fn() -> bool + Send + Sync),
    ) -> DrainSummary {
        let mut summary = DrainSummary::default();

        loop {
            if self.scheduler.pending() == 0 {
                break;
            }
            if is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let delivery = match tokio::time::timeout(CANCEL_POLL_INTERVAL, self.rx.recv()).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => break,
                Err(_) => continue,
            };

            self.process(ctx, delivery, &mut summary).await;
            self.scheduler.pending.fetch_sub(1, Ordering::AcqRel);
        }

        info!(
            steps = summary.steps_run,
            redeliveries = summary.redeliveries,
            finalized = summary.finalized.len(),
            fatal = summary.fatal.len(),
            dropped = summary.dropped.len(),
            "drain finished"
        );
        summary
    }

    async fn process(&self, ctx: &SyncContext, delivery: Delivery, summary: &mut DrainSummary) {
        let Delivery { step, attempt } = delivery;

        let err = match run_step(ctx, &step).await {
            Ok(report) => {
                summary.steps_run += 1;
                if let StepOutcome::Finalized { owner } = report.outcome {
                    summary.finalized.push(owner);
                }
                return;
            }
            Err(err) => err,
        };

        let fatal = err.is_fatal();
        emit(
            ctx.progress(),
            SyncProgress::StepFailed {
                source: step.source(),
                owner: step.owner().to_string(),
                page: step.page(),
                error: err.to_string(),
                fatal,
            },
        );

        if fatal {
            error!(%step, error = %err, "chain step failed fatally");
            summary.fatal.push((step, err.to_string()));
            return;
        }

        if attempt >= self.max_deliveries {
            error!(%step, attempt, error = %err, "chain step out of deliveries");
            summary.dropped.push((step, err.to_string()));
            return;
        }

        let delay = redelivery_delay(&self.retry, attempt);
        warn!(%step, attempt, delay_ms = delay.as_millis() as u64, error = %err, "redelivering chain step");
        emit(
            ctx.progress(),
            SyncProgress::StepRedelivered {
                source: step.source(),
                owner: step.owner().to_string(),
                page: step.page(),
                delivery: attempt + 1,
                retry_after_ms: delay.as_millis() as u64,
            },
        );

        let redelivery = Delivery {
            step: step.clone(),
            attempt: attempt + 1,
        };
        match self.scheduler.dispatch(redelivery, delay) {
            Ok(()) => summary.redeliveries += 1,
            Err(e) => summary.dropped.push((step, e.to_string())),
        }
    }
}

#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
mod tests {
    use super::*;
    use crate::connect_and_migrate;
    use crate::github::{GitHubClient, RepoListing};
    use crate::http::{HttpResponse, MockTransport};
    use crate::sync::SyncOptions;

    const API: &str = "https://api.github.test";
    const WEB: &str = "https://github.test";

    fn fast_retry() -> RetryConfig {
        RetryConfig::new(Duration::from_millis(1), Duration::from_millis(5), 10)
    }

    async fn setup(transport: &MockTransport) -> (SyncContext, StepQueue) {
        let db = connect_and_migrate("sqlite::memory:")
            .await
            .expect("test db should migrate");
        let (scheduler, queue) = LocalScheduler::new();
        let github =
            GitHubClient::new_with_transport(API, WEB, None, None, Arc::new(transport.clone()));
        let ctx = SyncContext::new(db, Arc::new(scheduler), SyncOptions::default()).with_github(github);
        (ctx, queue.with_retry(fast_retry()))
    }

    fn step(page: u32) -> ChainStep {
        ChainStep::GitHubRepos {
            owner: "octocat".to_string(),
            listing: RepoListing::User,
            page,
        }
    }

    fn repos_url(page: u32) -> String {
        format!("{API}/users/octocat/repos?per_page=100&page={page}")
    }

    fn server_error() -> HttpResponse {
        HttpResponse {
            status: 502,
            headers: Vec::new(),
            body: b"bad gateway".to_vec(),
        }
    }

    #[tokio::test]
    async fn drains_a_two_page_chain() {
        let transport = MockTransport::new();
        transport.push_json(
            repos_url(1),
            200,
            serde_json::json!([{"name": "hello-world", "stargazers_count": 3}]),
        );
        transport.push_json(repos_url(2), 200, serde_json::json!([]));
        let (ctx, mut queue) = setup(&transport).await;

        ctx.scheduler().schedule(step(1), Duration::ZERO).expect("schedule");
        let summary = queue.drain(&ctx, &|| false).await;

        assert!(summary.is_clean());
        assert_eq!(summary.steps_run, 2);
        assert_eq!(summary.finalized.len(), 1);
        assert_eq!(summary.finalized[0].metrics().star_count, 3);
    }

    #[tokio::test]
    async fn transient_failure_is_redelivered() {
        let transport = MockTransport::new();
        transport.push_response(crate::http::HttpMethod::Get, repos_url(1), server_error());
        transport.push_json(repos_url(1), 200, serde_json::json!([]));
        let (ctx, mut queue) = setup(&transport).await;

        ctx.scheduler().schedule(step(1), Duration::ZERO).expect("schedule");
        let summary = queue.drain(&ctx, &|| false).await;

        assert_eq!(summary.redeliveries, 1);
        assert_eq!(summary.finalized.len(), 1);
        assert!(summary.is_clean());
        assert_eq!(transport.request_count(&repos_url(1)), 2);
    }

    #[tokio::test]
    async fn fatal_failure_is_not_redelivered() {
        let transport = MockTransport::new();
        transport.push_json(repos_url(1), 404, serde_json::json!({"message": "Not Found"}));
        let (ctx, mut queue) = setup(&transport).await;

        ctx.scheduler().schedule(step(1), Duration::ZERO).expect("schedule");
        let summary = queue.drain(&ctx, &|| false).await;

        assert_eq!(summary.redeliveries, 0);
        assert_eq!(summary.fatal.len(), 1);
        assert!(summary.finalized.is_empty());
        assert_eq!(transport.request_count(&repos_url(1)), 1);
    }

    #[tokio::test]
    async fn persistent_transient_failure_runs_out_of_deliveries() {
        let transport = MockTransport::new();
        transport.set_fallback(repos_url(1), server_error());
        let (ctx, queue) = setup(&transport).await;
        let mut queue = queue.with_max_deliveries(3);

        ctx.scheduler().schedule(step(1), Duration::ZERO).expect("schedule");
        let summary = queue.drain(&ctx, &|| false).await;

        assert_eq!(summary.redeliveries, 2);
        assert_eq!(summary.dropped.len(), 1);
        assert_eq!(transport.request_count(&repos_url(1)), 3);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_step() {
        let transport = MockTransport::new();
        let (ctx, mut queue) = setup(&transport).await;

        ctx.scheduler().schedule(step(1), Duration::ZERO).expect("schedule");
        let summary = queue.drain(&ctx, &|| true).await;

        assert!(summary.cancelled);
        assert_eq!(summary.steps_run, 0);
        assert!(transport.requests().is_empty());
    }
}
