use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default request rates per upstream (requests per second).
pub mod rate_limits {
    /// GitHub: 5000 authenticated requests/hour, markup pages share the budget loosely.
    pub const GITHUB_DEFAULT_RPS: u32 = 10;
    /// npm website and downloads API: undocumented, stay conservative.
    pub const NPM_DEFAULT_RPS: u32 = 5;
}

/// Proactive request pacing shared by clones of a client.
///
/// This complements the per-page concurrency cap: the cap bounds how many
/// requests are in flight, the limiter bounds how fast new ones start.
///
/// # Example
///
/// ```ignore
/// use popstats::source::ApiRateLimiter;
///
/// let limiter = ApiRateLimiter::new(10);
/// limiter.wait().await;
/// client.list_repos(owner, listing, 1).await?;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a limiter allowing `requests_per_second` (0 is treated as 1).
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        }
    }

    /// Wait until a request is allowed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}
