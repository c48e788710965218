use popstats::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::ChainStarted { source, owner } => {
                tracing::info!(%source, owner = %owner, "Chain started");
            }

            SyncProgress::FetchingPage { source, owner, page } => {
                tracing::debug!(%source, owner = %owner, page, "Fetching page");
            }

            SyncProgress::FetchedPage {
                source,
                owner,
                page,
                count,
                has_more,
            } => {
                tracing::info!(%source, owner = %owner, page, count, has_more, "Fetched page");
            }

            SyncProgress::ResolvedDetail { owner, name } => {
                tracing::debug!(item = %format!("{}/{}", owner, name), "Resolved");
            }

            SyncProgress::DetailError { owner, name, error } => {
                tracing::warn!(item = %format!("{}/{}", owner, name), error = %error, "Failed to resolve");
            }

            SyncProgress::ScrapeRetry {
                owner,
                name,
                attempt,
            } => {
                tracing::debug!(repo = %format!("{}/{}", owner, name), attempt, "Counters incomplete, scraping again");
            }

            SyncProgress::ScrapeDegraded {
                owner,
                name,
                attempts,
            } => {
                tracing::warn!(repo = %format!("{}/{}", owner, name), attempts, "Counters unresolved, keeping stored values");
            }

            SyncProgress::Merged {
                source,
                owner,
                page,
                inserted,
                patched,
                unchanged,
                errors,
            } => {
                tracing::info!(%source, owner = %owner, page, inserted, patched, unchanged, errors, "Merged page");
            }

            SyncProgress::ContinuationScheduled {
                source,
                owner,
                next_page,
            } => {
                tracing::debug!(%source, owner = %owner, next_page, "Next page scheduled");
            }

            SyncProgress::Finalized {
                source,
                owner,
                details,
                star_count,
                download_count,
            } => {
                tracing::info!(%source, owner = %owner, details, star_count, download_count, "Aggregate recomputed");
            }

            SyncProgress::StepFailed {
                source,
                owner,
                page,
                error,
                fatal,
            } => {
                if fatal {
                    tracing::error!(%source, owner = %owner, page, error = %error, "Step failed");
                } else {
                    tracing::warn!(%source, owner = %owner, page, error = %error, "Step failed, will retry");
                }
            }

            SyncProgress::StepRedelivered {
                source,
                owner,
                page,
                delivery,
                retry_after_ms,
            } => {
                tracing::info!(%source, owner = %owner, page, delivery, retry_after_ms, "Step redelivery scheduled");
            }

            SyncProgress::RateLimitBackoff {
                owner,
                name,
                retry_after_ms,
                attempt,
            } => {
                tracing::warn!(
                    target_name = %format!("{}/{}", owner, name),
                    retry_after_ms,
                    attempt,
                    "Rate limited, backing off"
                );
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
