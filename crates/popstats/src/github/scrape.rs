//! Contributor and dependent counts scraped from a repository page.
//!
//! GitHub renders both counters as badges next to links ending in
//! `graphs/contributors` and `network/dependents`. The badges are filled in
//! asynchronously and are sometimes missing from the served HTML, so a page
//! is fetched up to a fixed number of times until both are present.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::client::GitHubClient;
use super::error::short_error_message;
use crate::sync::{ProgressCallback, SyncProgress, emit};

static CONTRIBUTORS_BADGE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[href$="graphs/contributors"] > span.Counter"#)
        .expect("selector should parse")
});

static DEPENDENTS_BADGE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[href$="network/dependents"] > span.Counter"#)
        .expect("selector should parse")
});

/// Counters found on one rendering of a repository page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoCounters {
    pub contributors: Option<u64>,
    pub dependents: Option<u64>,
}

impl RepoCounters {
    pub fn is_complete(&self) -> bool {
        self.contributors.is_some() && self.dependents.is_some()
    }

    /// Take every counter resolved in `latest`, keeping the rest.
    fn absorb(&mut self, latest: RepoCounters) {
        if latest.contributors.is_some() {
            self.contributors = latest.contributors;
        }
        if latest.dependents.is_some() {
            self.dependents = latest.dependents;
        }
    }
}

/// Outcome of [`scrape_repo_counters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeResult {
    pub contributor_count: u64,
    pub dependent_count: u64,
    /// Page fetches performed.
    pub attempts: u32,
    /// Whether both counters were resolved.
    pub complete: bool,
}

/// Read the first badge whose `title` is a non-zero number.
///
/// Titles carry the exact value with thousands separators (`"1,234"`),
/// while the visible text is abbreviated (`"1.2k"`).
fn badge_count(document: &Html, selector: &Selector) -> Option<u64> {
    document.select(selector).find_map(|badge| {
        let title = badge.value().attr("title")?.trim().replace(',', "");
        title.parse::<u64>().ok().filter(|count| *count > 0)
    })
}

/// Extract both counters from repository page markup.
pub fn parse_repo_counters(markup: &str) -> RepoCounters {
    let document = Html::parse_document(markup);
    RepoCounters {
        contributors: badge_count(&document, &CONTRIBUTORS_BADGE),
        dependents: badge_count(&document, &DEPENDENTS_BADGE),
    }
}

/// Scrape a repository's contributor and dependent counts.
///
/// Fetches the page up to `max_attempts` times (at least once) with no
/// delay in between, stopping as soon as both counters are resolved. A
/// failed fetch counts as an attempt that resolved nothing. Counters still
/// unresolved at the end are reported as zero. This never fails.
pub async fn scrape_repo_counters(
    client: &GitHubClient,
    owner: &str,
    name: &str,
    max_attempts: u32,
    on_progress: Option<&ProgressCallback>,
) -> ScrapeResult {
    let max_attempts = max_attempts.max(1);
    let mut counters = RepoCounters::default();
    let mut attempts = 0;

    while attempts < max_attempts {
        attempts += 1;

        match client.fetch_repo_markup(owner, name).await {
            Ok(markup) => counters.absorb(parse_repo_counters(&markup)),
            Err(e) => {
                tracing::debug!(
                    owner,
                    name,
                    attempt = attempts,
                    error = %short_error_message(&e),
                    "Repository page fetch failed"
                );
            }
        }

        if counters.is_complete() {
            break;
        }
        if attempts < max_attempts {
            emit(
                on_progress,
                SyncProgress::ScrapeRetry {
                    owner: owner.to_string(),
                    name: name.to_string(),
                    attempt: attempts,
                },
            );
        }
    }

    let complete = counters.is_complete();
    if !complete {
        tracing::warn!(
            owner,
            name,
            attempts,
            contributors = ?counters.contributors,
            dependents = ?counters.dependents,
            "Repository counters unresolved, storing zero"
        );
        emit(
            on_progress,
            SyncProgress::ScrapeDegraded {
                owner: owner.to_string(),
                name: name.to_string(),
                attempts,
            },
        );
    }

    ScrapeResult {
        contributor_count: counters.contributors.unwrap_or(0),
        dependent_count: counters.dependents.unwrap_or(0),
        attempts,
        complete,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::http::{HttpMethod, HttpResponse, MockTransport};

    const WEB: &str = "https://github.test";

    fn page(contributors: Option<&str>, dependents: Option<&str>) -> String {
        let badge = |href: &str, title: Option<&str>| match title {
            Some(title) => format!(
                r#"<a href="{href}">Label <span title="{title}" class="Counter ml-1">abbr</span></a>"#
            ),
            None => format!(r#"<a href="{href}">Label</a>"#),
        };
        format!(
            "<html><body>{}{}</body></html>",
            badge("/TanStack/query/graphs/contributors", contributors),
            badge("/TanStack/query/network/dependents", dependents)
        )
    }

    fn html(body: String) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/html".to_string())],
            body: body.into_bytes(),
        }
    }

    fn client(transport: &MockTransport) -> GitHubClient {
        GitHubClient::new_with_transport(
            "https://api.github.test",
            WEB,
            None,
            None,
            Arc::new(transport.clone()),
        )
    }

    #[test]
    fn parse_reads_titles_and_strips_separators() {
        let counters = parse_repo_counters(&page(Some("1,234"), Some("98,765")));
        assert_eq!(counters.contributors, Some(1_234));
        assert_eq!(counters.dependents, Some(98_765));
        assert!(counters.is_complete());
    }

    #[test]
    fn parse_treats_zero_empty_and_non_numeric_titles_as_unresolved() {
        for title in ["0", "", "many"] {
            let counters = parse_repo_counters(&page(Some(title), None));
            assert_eq!(counters.contributors, None, "title {title:?}");
            assert_eq!(counters.dependents, None);
        }
    }

    #[test]
    fn parse_ignores_counters_outside_matching_links() {
        let markup = r#"<a href="/TanStack/query/stargazers"><span title="500" class="Counter">500</span></a>
            <span title="77" class="Counter">77</span>"#;
        assert_eq!(parse_repo_counters(markup), RepoCounters::default());
    }

    #[tokio::test]
    async fn stops_after_first_complete_page() {
        let transport = MockTransport::new();
        let url = format!("{WEB}/TanStack/query");
        transport.push_response(HttpMethod::Get, &url, html(page(Some("12"), Some("3,400"))));

        let result = scrape_repo_counters(&client(&transport), "TanStack", "query", 3, None).await;

        assert_eq!(result.contributor_count, 12);
        assert_eq!(result.dependent_count, 3_400);
        assert_eq!(result.attempts, 1);
        assert!(result.complete);
        assert_eq!(transport.request_count(&url), 1);
    }

    #[tokio::test]
    async fn gives_up_after_three_attempts_and_returns_zero() {
        let transport = MockTransport::new();
        let url = format!("{WEB}/TanStack/query");
        transport.set_fallback(&url, html(page(None, Some("50"))));

        let result = scrape_repo_counters(&client(&transport), "TanStack", "query", 3, None).await;

        assert_eq!(result.contributor_count, 0);
        assert_eq!(result.dependent_count, 50);
        assert_eq!(result.attempts, 3);
        assert!(!result.complete);
        assert_eq!(transport.request_count(&url), 3);
    }

    #[tokio::test]
    async fn keeps_counters_resolved_on_earlier_attempts() {
        let transport = MockTransport::new();
        let url = format!("{WEB}/TanStack/query");
        transport.push_response(HttpMethod::Get, &url, html(page(Some("9"), None)));
        transport.push_transport_error(&url, "connection reset");
        transport.push_response(HttpMethod::Get, &url, html(page(None, Some("4"))));

        let result = scrape_repo_counters(&client(&transport), "TanStack", "query", 3, None).await;

        assert_eq!(result.contributor_count, 9);
        assert_eq!(result.dependent_count, 4);
        assert_eq!(result.attempts, 3);
        assert!(result.complete);
    }

    #[tokio::test]
    async fn reports_retries_and_degradation() {
        let transport = MockTransport::new();
        let url = format!("{WEB}/TanStack/query");
        transport.set_fallback(&url, html(page(None, None)));

        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let capture = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            capture
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event);
        });

        scrape_repo_counters(&client(&transport), "TanStack", "query", 3, Some(&callback)).await;

        let events = events.lock().unwrap_or_else(|e| e.into_inner());
        let retries = events
            .iter()
            .filter(|e| matches!(e, SyncProgress::ScrapeRetry { .. }))
            .count();
        assert_eq!(retries, 2);
        assert!(matches!(
            events.last(),
            Some(SyncProgress::ScrapeDegraded { attempts: 3, .. })
        ));
    }
}
