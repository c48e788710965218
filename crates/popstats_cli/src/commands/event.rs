use std::io::Read;
use std::path::PathBuf;

use chrono::Utc;
use popstats::github::RepositoryEventPayload;
use popstats::sync::{StarCountChanged, apply_star_change};

use crate::EventAction;

pub(crate) async fn handle_event(
    action: EventAction,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let event = match action {
        EventAction::Star { owner, repo, count } => StarCountChanged {
            owner,
            item: repo,
            star_count: count,
        },
        EventAction::Payload { file } => StarCountChanged::from(read_payload(file)?),
    };

    let db = popstats::connect_and_migrate(database_url).await?;
    let applied = apply_star_change(&db, &event, Utc::now()).await?;

    println!(
        "{}/{}: {} ({} stars), {} now has {} stars",
        event.owner,
        event.item,
        applied.merge,
        event.star_count,
        applied.aggregate.owner.name,
        applied.aggregate.owner.metrics().star_count
    );
    Ok(())
}

/// Read a repository webhook payload from a file, or stdin for `-`.
fn read_payload(file: PathBuf) -> Result<RepositoryEventPayload, Box<dyn std::error::Error>> {
    let raw = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&file)?
    };
    Ok(serde_json::from_str(&raw)?)
}
