use std::sync::Arc;
use std::time::Duration;

use console::Term;
use popstats::github::GitHubClient;
use popstats::http::{HttpTransport, ReqwestTransport};
use popstats::npm::NpmClient;
use popstats::sync::{
    DrainSummary, LocalScheduler, SyncContext, start_github_chain, start_npm_chain,
};
use popstats::{ApiRateLimiter, SourceKind};

use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::{SyncAction, shutdown};

pub(crate) async fn handle_sync(
    action: SyncAction,
    config: &Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (source, owners, args) = match action {
        SyncAction::Github { owners, args } => (SourceKind::GitHub, owners, args),
        SyncAction::Npm { orgs, args } => (SourceKind::Npm, orgs, args),
    };

    let db = popstats::connect_and_migrate(database_url).await?;

    let mut options = config.sync.options();
    if let Some(concurrency) = args.concurrency {
        options.concurrency = concurrency.max(1);
    }

    let (scheduler, queue) = LocalScheduler::new();
    let mut queue =
        queue.with_max_deliveries(args.max_deliveries.unwrap_or(config.sync.max_deliveries));

    let reporter = Arc::new(ProgressReporter::new());
    let mut ctx = SyncContext::new(db, Arc::new(scheduler), options)
        .with_progress(reporter.as_callback());
    if let Some(day) = args.as_of {
        ctx = ctx.with_as_of(day);
    }

    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::with_timeout(Duration::from_secs(30))?);
    let rate_limiter =
        |rps: u32| (!args.no_rate_limit && rps > 0).then(|| ApiRateLimiter::new(rps));

    let ctx = match source {
        SourceKind::GitHub => {
            let token = config.github_token();
            if token.is_none() {
                tracing::warn!(
                    "No GitHub token configured, listings use the unauthenticated rate limit"
                );
            }
            ctx.with_github(GitHubClient::new_with_transport(
                &config.github.api_url,
                &config.github.web_url,
                token.as_deref(),
                rate_limiter(config.github.requests_per_second),
                Arc::clone(&transport),
            ))
        }
        SourceKind::Npm => ctx.with_npm(NpmClient::new_with_transport(
            &config.npm.registry_url,
            &config.npm.downloads_url,
            rate_limiter(config.npm.requests_per_second),
            Arc::clone(&transport),
        )),
    };

    let mut start_failures = Vec::new();
    for owner in &owners {
        let started = match source {
            SourceKind::GitHub => start_github_chain(&ctx, owner).await,
            SourceKind::Npm => start_npm_chain(&ctx, owner),
        };
        match started {
            Ok(step) => tracing::debug!(%step, "Chain queued"),
            Err(e) => {
                tracing::error!(owner = %owner, error = %e, "Failed to start chain");
                start_failures.push((owner.clone(), e.to_string()));
            }
        }
    }

    let summary = queue.drain(&ctx, &shutdown::is_shutdown_requested).await;
    reporter.finish();

    print_summary(source, &summary, &start_failures);

    let failed = start_failures.len() + summary.fatal.len() + summary.dropped.len();
    if failed > 0 {
        return Err(format!("{failed} {source} chain(s) did not finish").into());
    }
    if summary.cancelled {
        return Err("sync interrupted; unfinished chains were not finalized".into());
    }
    Ok(())
}

fn print_summary(source: SourceKind, summary: &DrainSummary, start_failures: &[(String, String)]) {
    let is_tty = Term::stdout().is_term();

    for owner in &summary.finalized {
        let metrics = owner.metrics();
        match source {
            SourceKind::GitHub => println!(
                "{}: {} stars, {} contributors, {} dependents",
                owner.name,
                metrics.star_count,
                metrics.contributor_count,
                metrics.dependent_count
            ),
            SourceKind::Npm => println!("{}: {} downloads", owner.name, metrics.download_count),
        }
    }

    for (owner, error) in start_failures {
        eprintln!("{owner}: {error}");
    }
    for (step, error) in &summary.fatal {
        eprintln!("{step}: {error}");
    }
    for (step, error) in &summary.dropped {
        eprintln!("{step}: gave up after repeated failures: {error}");
    }

    if is_tty {
        println!(
            "\n{} steps, {} redeliveries, {} owners finalized",
            summary.steps_run,
            summary.redeliveries,
            summary.finalized.len()
        );
    }
}
