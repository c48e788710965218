//! End-to-end tests for chained synchronization.
//!
//! Each test wires real clients to an in-memory route table, starts chains
//! through the public API and drains the local scheduler against an
//! in-memory SQLite database.
//!
//! Key scenarios tested:
//! - Owners with zero, one and more than one page of items sum correctly
//! - Re-running a step leaves the store unchanged
//! - Fatal listing errors end a chain without a continuation
//! - Unresolved scraped counters keep stored values
//! - Detail lookups within a page stay under the concurrency cap

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use popstats::github::GitHubClient;
use popstats::http::{HttpError, HttpRequest, HttpResponse, HttpTransport};
use popstats::npm::NpmClient;
use popstats::retry::RetryConfig;
use popstats::store::{detail, owner};
use popstats::sync::{
    DrainSummary, LocalScheduler, StarCountChanged, StepOutcome, StepQueue, SyncContext,
    SyncOptions, apply_star_change, run_step, start_github_chain, start_npm_chain,
};
use popstats::{SourceKind, connect_and_migrate};

const API: &str = "https://api.github.test";
const WEB: &str = "https://github.test";
const NPM_WEB: &str = "https://www.npmjs.test";
const NPM_DOWNLOADS: &str = "https://api.npmjs.test";

/// Maximum time a drain should take. Exceeding it means a chain hung.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct Routes {
    queued: HashMap<String, VecDeque<HttpResponse>>,
    exact: HashMap<String, HttpResponse>,
    prefixed: Vec<(String, HttpResponse)>,
    hits: HashMap<String, usize>,
    in_flight: usize,
    peak: usize,
}

/// Route table transport shared by every client in a test.
///
/// Queued responses are served first, then exact routes, then the longest
/// matching prefix route.
#[derive(Clone, Default)]
struct RouteTransport {
    routes: Arc<Mutex<Routes>>,
    latency: Option<Duration>,
}

impl RouteTransport {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    fn routes(&self) -> std::sync::MutexGuard<'_, Routes> {
        self.routes.lock().expect("routes lock")
    }

    fn json(&self, url: impl Into<String>, status: u16, body: serde_json::Value) {
        self.routes().exact.insert(url.into(), json_response(status, body));
    }

    fn json_once(&self, url: impl Into<String>, status: u16, body: serde_json::Value) {
        self.routes()
            .queued
            .entry(url.into())
            .or_default()
            .push_back(json_response(status, body));
    }

    fn html_prefix(&self, prefix: impl Into<String>, markup: String) {
        let mut routes = self.routes();
        let prefix = prefix.into();
        routes.prefixed.retain(|(p, _)| *p != prefix);
        routes.prefixed.push((
            prefix,
            HttpResponse {
                status: 200,
                headers: vec![("Content-Type".to_string(), "text/html".to_string())],
                body: markup.into_bytes(),
            },
        ));
    }

    fn hits(&self, url: &str) -> usize {
        self.routes().hits.get(url).copied().unwrap_or(0)
    }

    fn hits_with_prefix(&self, prefix: &str) -> usize {
        self.routes()
            .hits
            .iter()
            .filter(|(url, _)| url.starts_with(prefix))
            .map(|(_, n)| n)
            .sum()
    }

    fn peak_in_flight(&self) -> usize {
        self.routes().peak
    }

    fn lookup(routes: &mut Routes, url: &str) -> Option<HttpResponse> {
        if let Some(queue) = routes.queued.get_mut(url)
            && let Some(response) = queue.pop_front()
        {
            return Some(response);
        }
        if let Some(response) = routes.exact.get(url) {
            return Some(response.clone());
        }
        routes
            .prefixed
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, response)| response.clone())
    }
}

#[async_trait]
impl HttpTransport for RouteTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let response = {
            let mut routes = self.routes();
            *routes.hits.entry(request.url.clone()).or_default() += 1;
            routes.in_flight += 1;
            routes.peak = routes.peak.max(routes.in_flight);
            Self::lookup(&mut routes, &request.url)
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.routes().in_flight -= 1;

        response.ok_or_else(|| HttpError::NoMockResponse {
            method: request.method.as_str().to_string(),
            url: request.url,
        })
    }
}

fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: serde_json::to_vec(&body).expect("serialize body"),
    }
}

fn repo_markup(contributors: Option<u64>, dependents: Option<u64>) -> String {
    let badge = |href: &str, count: Option<u64>| match count {
        Some(count) => format!(
            r#"<a href="{href}">Label <span title="{count}" class="Counter">{count}</span></a>"#
        ),
        None => format!(r#"<a href="{href}">Label</a>"#),
    };
    format!(
        "<html><body>{}{}</body></html>",
        badge("/o/r/graphs/contributors", contributors),
        badge("/o/r/network/dependents", dependents)
    )
}

fn listing_url(owner: &str, page: u32) -> String {
    format!("{API}/orgs/{owner}/repos?per_page=100&page={page}")
}

fn repos(range: std::ops::Range<u64>) -> serde_json::Value {
    serde_json::Value::Array(
        range
            .map(|i| serde_json::json!({"name": format!("repo-{i:03}"), "stargazers_count": i}))
            .collect(),
    )
}

fn github_org(transport: &RouteTransport, owner: &str) {
    transport.json(
        format!("{API}/users/{owner}"),
        200,
        serde_json::json!({"login": owner, "type": "Organization"}),
    );
}

async fn setup(
    transport: &RouteTransport,
    options: SyncOptions,
) -> (SyncContext, StepQueue) {
    let db = connect_and_migrate("sqlite::memory:")
        .await
        .expect("test db should migrate");
    let (scheduler, queue) = LocalScheduler::new();
    let github = GitHubClient::new_with_transport(API, WEB, None, None, Arc::new(transport.clone()));
    let npm =
        NpmClient::new_with_transport(NPM_WEB, NPM_DOWNLOADS, None, Arc::new(transport.clone()));

    let ctx = SyncContext::new(db, Arc::new(scheduler), options)
        .with_github(github)
        .with_npm(npm)
        .with_as_of(NaiveDate::from_ymd_opt(2024, 6, 10).expect("date"));
    let queue = queue.with_max_deliveries(3).with_retry(RetryConfig::new(
        Duration::from_millis(1),
        Duration::from_millis(5),
        10,
    ));
    (ctx, queue)
}

async fn drain(ctx: &SyncContext, queue: &mut StepQueue) -> DrainSummary {
    tokio::time::timeout(DRAIN_TIMEOUT, queue.drain(ctx, &|| false))
        .await
        .expect("drain should finish")
}

#[tokio::test]
async fn owner_spanning_several_pages_sums_every_repository() {
    let transport = RouteTransport::default();
    github_org(&transport, "TanStack");
    transport.json(listing_url("TanStack", 1), 200, repos(0..100));
    transport.json(listing_url("TanStack", 2), 200, repos(100..120));
    transport.json(listing_url("TanStack", 3), 200, serde_json::json!([]));
    transport.html_prefix(format!("{WEB}/TanStack/"), repo_markup(Some(2), Some(3)));

    let (ctx, mut queue) = setup(&transport, SyncOptions::default()).await;
    start_github_chain(&ctx, "TanStack").await.expect("start");
    let summary = drain(&ctx, &mut queue).await;

    assert!(summary.is_clean(), "unexpected failures: {summary:?}");
    assert_eq!(summary.steps_run, 3);
    assert_eq!(summary.finalized.len(), 1);

    let row = owner::find(ctx.db(), SourceKind::GitHub, "tanstack")
        .await
        .expect("query")
        .expect("owner row");
    let metrics = row.metrics();
    assert_eq!(metrics.star_count, (0..120).sum::<u64>());
    assert_eq!(metrics.contributor_count, 240);
    assert_eq!(metrics.dependent_count, 360);

    let details = detail::list_for_owner(ctx.db(), SourceKind::GitHub, "TanStack")
        .await
        .expect("details");
    assert_eq!(details.len(), 120);
    for page in 1..=3 {
        assert_eq!(transport.hits(&listing_url("TanStack", page)), 1);
    }
    assert_eq!(transport.hits(&listing_url("TanStack", 4)), 0);
}

#[tokio::test]
async fn user_with_single_repository_uses_user_listing() {
    let transport = RouteTransport::default();
    transport.json(
        format!("{API}/users/tannerlinsley"),
        200,
        serde_json::json!({"login": "tannerlinsley", "type": "User"}),
    );
    let user_listing = |page: u32| format!("{API}/users/tannerlinsley/repos?per_page=100&page={page}");
    transport.json(
        user_listing(1),
        200,
        serde_json::json!([{"name": "dotfiles", "stargazers_count": 7}]),
    );
    transport.json(user_listing(2), 200, serde_json::json!([]));
    transport.html_prefix(format!("{WEB}/tannerlinsley/"), repo_markup(Some(1), Some(4)));

    let (ctx, mut queue) = setup(&transport, SyncOptions::default()).await;
    start_github_chain(&ctx, "TannerLinsley").await.expect("start");
    let summary = drain(&ctx, &mut queue).await;

    assert!(summary.is_clean());
    let metrics = summary.finalized[0].metrics();
    assert_eq!(metrics.star_count, 7);
    assert_eq!(metrics.contributor_count, 1);
    assert_eq!(metrics.dependent_count, 4);
    assert_eq!(transport.hits_with_prefix(&format!("{API}/orgs/")), 0);
}

#[tokio::test]
async fn empty_first_page_finalizes_zero_owner() {
    let transport = RouteTransport::default();
    github_org(&transport, "empty-org");
    transport.json(listing_url("empty-org", 1), 200, serde_json::json!([]));

    let (ctx, mut queue) = setup(&transport, SyncOptions::default()).await;
    start_github_chain(&ctx, "empty-org").await.expect("start");
    let summary = drain(&ctx, &mut queue).await;

    assert!(summary.is_clean());
    assert_eq!(summary.steps_run, 1);
    let row = owner::find(ctx.db(), SourceKind::GitHub, "empty-org")
        .await
        .expect("query")
        .expect("owner row");
    assert_eq!(row.metrics(), popstats::Metrics::default());
    assert_eq!(transport.hits(&listing_url("empty-org", 2)), 0);
}

#[tokio::test]
async fn rerunning_a_step_leaves_store_unchanged() {
    let transport = RouteTransport::default();
    github_org(&transport, "TanStack");
    transport.json(listing_url("TanStack", 1), 200, repos(0..2));
    transport.json(listing_url("TanStack", 2), 200, serde_json::json!([]));
    transport.html_prefix(format!("{WEB}/TanStack/"), repo_markup(Some(2), Some(3)));

    let (ctx, mut queue) = setup(&transport, SyncOptions::default()).await;
    let first = start_github_chain(&ctx, "TanStack").await.expect("start");
    drain(&ctx, &mut queue).await;

    let before = owner::find(ctx.db(), SourceKind::GitHub, "TanStack")
        .await
        .expect("query")
        .expect("owner row");

    // A duplicate delivery of page 1 followed by the continuation it schedules.
    let report = run_step(&ctx, &first).await.expect("rerun");
    assert_eq!(report.merge.unchanged, 2);
    assert_eq!(report.merge.written(), 0);
    assert_eq!(report.outcome, StepOutcome::Continued { next_page: 2 });

    let summary = drain(&ctx, &mut queue).await;
    assert!(summary.is_clean());

    let after = owner::find(ctx.db(), SourceKind::GitHub, "TanStack")
        .await
        .expect("query")
        .expect("owner row");
    assert_eq!(after.metrics(), before.metrics());
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(
        detail::list_for_owner(ctx.db(), SourceKind::GitHub, "TanStack")
            .await
            .expect("details")
            .len(),
        2
    );
}

#[tokio::test]
async fn fatal_listing_error_ends_chain_without_continuation() {
    let transport = RouteTransport::default();
    github_org(&transport, "gone");
    transport.json(
        listing_url("gone", 1),
        404,
        serde_json::json!({"message": "Not Found"}),
    );

    let (ctx, mut queue) = setup(&transport, SyncOptions::default()).await;
    start_github_chain(&ctx, "gone").await.expect("start");
    let summary = drain(&ctx, &mut queue).await;

    assert_eq!(summary.fatal.len(), 1);
    assert_eq!(summary.redeliveries, 0);
    assert!(summary.finalized.is_empty());
    assert_eq!(transport.hits(&listing_url("gone", 1)), 1);
    assert_eq!(transport.hits(&listing_url("gone", 2)), 0);
    assert!(
        owner::find(ctx.db(), SourceKind::GitHub, "gone")
            .await
            .expect("query")
            .is_none()
    );
}

#[tokio::test]
async fn transient_listing_error_is_redelivered() {
    let transport = RouteTransport::default();
    github_org(&transport, "TanStack");
    transport.json_once(
        listing_url("TanStack", 1),
        502,
        serde_json::json!({"message": "Bad Gateway"}),
    );
    transport.json(listing_url("TanStack", 1), 200, repos(0..1));
    transport.json(listing_url("TanStack", 2), 200, serde_json::json!([]));
    transport.html_prefix(format!("{WEB}/TanStack/"), repo_markup(Some(1), Some(1)));

    let (ctx, mut queue) = setup(&transport, SyncOptions::default()).await;
    start_github_chain(&ctx, "TanStack").await.expect("start");
    let summary = drain(&ctx, &mut queue).await;

    assert!(summary.is_clean());
    assert_eq!(summary.redeliveries, 1);
    assert_eq!(transport.hits(&listing_url("TanStack", 1)), 2);
    assert_eq!(summary.finalized.len(), 1);
}

#[tokio::test]
async fn unresolved_counters_keep_stored_values() {
    let transport = RouteTransport::default();
    github_org(&transport, "TanStack");
    transport.json(listing_url("TanStack", 1), 200, repos(10..11));
    transport.json(listing_url("TanStack", 2), 200, serde_json::json!([]));
    transport.html_prefix(format!("{WEB}/TanStack/"), repo_markup(Some(5), Some(9)));

    let options = SyncOptions {
        scrape_attempts: 3,
        ..SyncOptions::default()
    };
    let (ctx, mut queue) = setup(&transport, options).await;
    start_github_chain(&ctx, "TanStack").await.expect("start");
    drain(&ctx, &mut queue).await;

    let markup_url = format!("{WEB}/TanStack/repo-010");
    assert_eq!(transport.hits(&markup_url), 1);

    // Badges missing on every rendering: three attempts, then stored values win.
    transport.html_prefix(format!("{WEB}/TanStack/"), repo_markup(None, None));
    transport.json(
        listing_url("TanStack", 1),
        200,
        serde_json::json!([{"name": "repo-010", "stargazers_count": 11}]),
    );
    start_github_chain(&ctx, "TanStack").await.expect("restart");
    let summary = drain(&ctx, &mut queue).await;
    assert!(summary.is_clean());
    assert_eq!(transport.hits(&markup_url), 1 + 3);

    let row = detail::find(ctx.db(), SourceKind::GitHub, "TanStack", "repo-010")
        .await
        .expect("query")
        .expect("detail row");
    let metrics = row.metrics();
    assert_eq!(metrics.star_count, 11);
    assert_eq!(metrics.contributor_count, 5);
    assert_eq!(metrics.dependent_count, 9);
}

#[tokio::test]
async fn detail_lookups_stay_under_concurrency_cap() {
    let transport = RouteTransport::with_latency(Duration::from_millis(20));
    github_org(&transport, "TanStack");
    transport.json(listing_url("TanStack", 1), 200, repos(0..6));
    transport.json(listing_url("TanStack", 2), 200, serde_json::json!([]));
    transport.html_prefix(format!("{WEB}/TanStack/"), repo_markup(Some(1), Some(1)));

    let options = SyncOptions {
        concurrency: 2,
        ..SyncOptions::default()
    };
    let (ctx, mut queue) = setup(&transport, options).await;
    start_github_chain(&ctx, "TanStack").await.expect("start");
    let summary = drain(&ctx, &mut queue).await;

    assert!(summary.is_clean());
    assert_eq!(transport.hits_with_prefix(&format!("{WEB}/TanStack/")), 6);
    let peak = transport.peak_in_flight();
    assert!(peak <= 2, "peak in-flight requests was {peak}");
    assert_eq!(summary.finalized[0].metrics().star_count, 15);
}

#[tokio::test]
async fn npm_chain_follows_next_links_and_sums_downloads() {
    let transport = RouteTransport::default();
    let created_ms = 1_717_200_000_000i64; // 2024-06-01
    transport.json(
        format!("{NPM_WEB}/org/tanstack?page=0"),
        200,
        serde_json::json!({
            "scope": {"type": "org"},
            "packages": {
                "objects": [{"name": "@tanstack/query", "created": {"ts": created_ms}}],
                "urls": {"next": "/org/tanstack?page=1"}
            }
        }),
    );
    transport.json(
        format!("{NPM_WEB}/org/tanstack?page=1"),
        200,
        serde_json::json!({
            "scope": {"type": "org"},
            "packages": {
                "objects": [{"name": "@tanstack/table", "created": {"ts": created_ms}}],
                "urls": {"next": ""}
            }
        }),
    );
    for (package, per_day) in [("@tanstack/query", 40u64), ("@tanstack/table", 20)] {
        let range = serde_json::json!({
            "start": "2024-06-01",
            "end": "2024-06-10",
            "downloads": [
                {"day": "2024-06-09", "downloads": per_day},
                {"day": "2024-06-10", "downloads": per_day}
            ]
        });
        transport.json(
            format!("{NPM_DOWNLOADS}/downloads/range/2024-06-01:2024-06-10/{package}"),
            200,
            range.clone(),
        );
        transport.json(
            format!("{NPM_DOWNLOADS}/downloads/range/2024-05-11:2024-06-10/{package}"),
            200,
            range,
        );
    }

    let (ctx, mut queue) = setup(&transport, SyncOptions::default()).await;
    start_npm_chain(&ctx, "tanstack").expect("start");
    let summary = drain(&ctx, &mut queue).await;

    assert!(summary.is_clean(), "unexpected failures: {summary:?}");
    assert_eq!(summary.steps_run, 2);
    let metrics = summary.finalized[0].metrics();
    assert_eq!(metrics.download_count, 120);
    // Sunday: (40 + 2) / 4 + (20 + 2) / 4, Monday likewise.
    assert_eq!(metrics.day_of_week_averages.for_weekday(0), 10 + 5);
    assert_eq!(metrics.day_of_week_averages.for_weekday(1), 10 + 5);
    assert_eq!(transport.hits(&format!("{NPM_WEB}/org/tanstack?page=2")), 0);
}

#[tokio::test]
async fn npm_unknown_scope_is_fatal() {
    let transport = RouteTransport::default();
    transport.json(
        format!("{NPM_WEB}/org/nope?page=0"),
        404,
        serde_json::json!({"message": "NotFoundError: Scope not found"}),
    );

    let (ctx, mut queue) = setup(&transport, SyncOptions::default()).await;
    start_npm_chain(&ctx, "nope").expect("start");
    let summary = drain(&ctx, &mut queue).await;

    assert_eq!(summary.fatal.len(), 1);
    assert_eq!(summary.redeliveries, 0);
    assert_eq!(transport.hits(&format!("{NPM_WEB}/org/nope?page=0")), 1);
    assert!(
        owner::find(ctx.db(), SourceKind::Npm, "nope")
            .await
            .expect("query")
            .is_none()
    );
}

#[tokio::test]
async fn star_event_after_sync_updates_owner_total() {
    let transport = RouteTransport::default();
    github_org(&transport, "TanStack");
    transport.json(listing_url("TanStack", 1), 200, repos(1..3));
    transport.json(listing_url("TanStack", 2), 200, serde_json::json!([]));
    transport.html_prefix(format!("{WEB}/TanStack/"), repo_markup(Some(4), Some(6)));

    let (ctx, mut queue) = setup(&transport, SyncOptions::default()).await;
    start_github_chain(&ctx, "TanStack").await.expect("start");
    drain(&ctx, &mut queue).await;

    let event = StarCountChanged {
        owner: "tanstack".to_string(),
        item: "repo-001".to_string(),
        star_count: 100,
    };
    let applied = apply_star_change(ctx.db(), &event, Utc::now())
        .await
        .expect("apply");

    let metrics = applied.aggregate.owner.metrics();
    assert_eq!(metrics.star_count, 100 + 2);
    assert_eq!(metrics.contributor_count, 8);
    assert_eq!(metrics.dependent_count, 12);
}
