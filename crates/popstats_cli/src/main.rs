//! Popstats CLI - command-line interface for the popularity tracker.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "popstats")]
#[command(version)]
#[command(about = "Track stars, contributors, dependents and downloads")]
#[command(
    long_about = "Popstats keeps popularity counters for GitHub owners and npm organizations \
in a local database. Listings are synced one page at a time, merged into per-repository and \
per-package rows, and summed into an owner total once the last page is done."
)]
#[command(after_long_help = r#"EXAMPLES
    Sync every repository of a GitHub organization or user:
        $ popstats sync github TanStack

    Sync the packages published under an npm organization:
        $ popstats sync npm tanstack

    Show combined stats:
        $ popstats show --github-owner TanStack --npm-org tanstack

    Record a star change by hand:
        $ popstats event star TanStack query 41000

    Accept star events over HTTP:
        $ popstats serve --bind 127.0.0.1:8787

CONFIGURATION
    Popstats reads configuration from:
      1. ~/.config/popstats/config.toml (or $XDG_CONFIG_HOME/popstats/config.toml)
      2. ./popstats.toml
      3. Environment variables (POPSTATS_* prefix, nested keys joined with __)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    POPSTATS_DATABASE__URL    Database connection string (default: ~/.local/state/popstats/popstats.db)
    POPSTATS_GITHUB__TOKEN    GitHub personal access token
    GITHUB_TOKEN              Used when no other GitHub token is configured
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Sync owners from an upstream
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Apply an inbound star change
    Event {
        #[command(subcommand)]
        action: EventAction,
    },
    /// Show stored stats
    ///
    /// Without filters, every synced owner is listed.
    Show {
        /// GitHub owner to include
        #[arg(short, long)]
        github_owner: Option<String>,

        /// npm organization to include
        #[arg(short, long)]
        npm_org: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Serve star events and stats over HTTP
    #[cfg(feature = "server")]
    Serve {
        /// Address to listen on (default from config or 127.0.0.1:8787)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

/// Options shared by every sync command.
#[derive(Debug, Clone, clap::Args)]
struct SyncArgs {
    /// Maximum concurrent detail lookups per page (default from config or 10)
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,

    /// Disable proactive rate limiting (may cause API throttling)
    #[arg(short = 'R', long)]
    no_rate_limit: bool,

    /// Deliveries of a failing page before it is given up (default from config or 5)
    #[arg(short = 'm', long)]
    max_deliveries: Option<u32>,

    /// Day download windows end on, as YYYY-MM-DD (default: today, UTC)
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum SyncAction {
    /// Sync repositories of GitHub users or organizations
    Github {
        /// Owner name(s) - can specify multiple
        #[arg(required = true)]
        owners: Vec<String>,

        #[command(flatten)]
        args: SyncArgs,
    },
    /// Sync packages of npm organizations
    Npm {
        /// Organization name(s) - can specify multiple
        #[arg(required = true)]
        orgs: Vec<String>,

        #[command(flatten)]
        args: SyncArgs,
    },
}

#[derive(Subcommand)]
enum EventAction {
    /// Set a repository's star count
    Star {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
        /// New star count
        count: u64,
    },
    /// Apply a GitHub repository webhook payload
    Payload {
        /// JSON file to read, or - for stdin
        #[arg(default_value = "-")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    shutdown::setup_shutdown_handler();

    // Structured logging only when stdout is not a terminal
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("popstats=info,popstats_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = config::Config::load();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(());
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output.clone())?;
            return Ok(());
        }
        _ => {}
    }

    let database_url = config
        .database_url()
        .ok_or("could not determine a database URL; set POPSTATS_DATABASE__URL")?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        if db_path.is_relative() && !db_path.as_os_str().is_empty() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Sync { action } => {
            commands::sync::handle_sync(action, &config, &database_url).await?;
        }
        Commands::Event { action } => {
            commands::event::handle_event(action, &database_url).await?;
        }
        Commands::Show {
            github_owner,
            npm_org,
            json,
        } => {
            commands::show::handle_show(github_owner, npm_org, json, &database_url).await?;
        }
        #[cfg(feature = "server")]
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            commands::serve::handle_serve(&bind, &database_url).await?;
        }
        Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}
