use chrono::{DateTime, Utc};
use popstats::display::{StatsSnapshot, get_stats};
use popstats::store::owner;
use popstats::{OwnerModel, SourceKind};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub(crate) async fn handle_show(
    github_owner: Option<String>,
    npm_org: Option<String>,
    json: bool,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = popstats::connect_and_migrate(database_url).await?;
    let now = Utc::now();

    if github_owner.is_none() && npm_org.is_none() {
        let mut owners = owner::list(&db, SourceKind::GitHub).await?;
        owners.extend(owner::list(&db, SourceKind::Npm).await?);

        if json {
            let rows: Vec<_> = owners.iter().map(owner_json).collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else if owners.is_empty() {
            println!("No owners synced yet.");
        } else {
            for row in &owners {
                println!("{}", owner_line(row));
            }
        }
        return Ok(());
    }

    let snapshot = get_stats(&db, github_owner.as_deref(), npm_org.as_deref(), now).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", render_snapshot(&snapshot));
    }
    Ok(())
}

fn owner_json(row: &OwnerModel) -> serde_json::Value {
    serde_json::json!({
        "source": row.source,
        "name": row.name,
        "metrics": row.metrics(),
        "updated_at": row.updated_at.with_timezone(&Utc),
    })
}

fn owner_line(row: &OwnerModel) -> String {
    let metrics = row.metrics();
    let updated = format_time(row.updated_at.with_timezone(&Utc));
    match row.source {
        SourceKind::GitHub => format!(
            "github  {:24} {:>10} stars {:>8} contributors {:>10} dependents  ({updated})",
            row.name, metrics.star_count, metrics.contributor_count, metrics.dependent_count
        ),
        SourceKind::Npm => format!(
            "npm     {:24} {:>10} downloads  ({updated})",
            row.name, metrics.download_count
        ),
    }
}

fn render_snapshot(snapshot: &StatsSnapshot) -> String {
    let mut out = String::new();

    if let Some(owner) = &snapshot.github_owner {
        out.push_str(&format!("GitHub {owner}\n"));
        out.push_str(&format!("  stars         {}\n", snapshot.star_count));
        out.push_str(&format!("  contributors  {}\n", snapshot.contributor_count));
        out.push_str(&format!("  dependents    {}\n", snapshot.dependent_count));
        out.push_str(&format!(
            "  updated       {}\n",
            snapshot.github_updated_at.map(format_time).unwrap_or_else(|| "never".into())
        ));
    }

    if let Some(org) = &snapshot.npm_org {
        out.push_str(&format!("npm {org}\n"));
        out.push_str(&format!("  downloads     {}\n", snapshot.download_count));
        out.push_str(&format!("  projected     {}\n", snapshot.projected_download_count));
        let averages: Vec<String> = WEEKDAYS
            .iter()
            .zip(snapshot.day_of_week_averages.0)
            .map(|(day, avg)| format!("{day} {avg}"))
            .collect();
        out.push_str(&format!("  daily avg     {}\n", averages.join(", ")));
        out.push_str(&format!(
            "  updated       {}\n",
            snapshot.npm_updated_at.map(format_time).unwrap_or_else(|| "never".into())
        ));
    }

    out
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}
