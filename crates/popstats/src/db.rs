//! Database connection utilities.

use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

/// Pragmas applied to every SQLite connection.
///
/// WAL keeps readers from blocking the single writer, and the busy timeout lets
/// concurrent read-modify-write transactions queue instead of failing.
const SQLITE_PRAGMAS: &[&str] = &[
    "PRAGMA journal_mode=WAL",
    "PRAGMA busy_timeout=5000",
    "PRAGMA synchronous=NORMAL",
];

fn is_sqlite(database_url: &str) -> bool {
    database_url.starts_with("sqlite:")
}

fn is_file_backed_sqlite(database_url: &str) -> bool {
    database_url.starts_with("sqlite://")
}

async fn configure_sqlite(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    for pragma in SQLITE_PRAGMAS {
        db.execute(Statement::from_string(backend, pragma.to_string()))
            .await?;
    }
    Ok(())
}

fn connect_options(database_url: &str) -> ConnectOptions {
    let mut options = ConnectOptions::new(database_url.to_string());
    options
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    // An in-memory SQLite database lives inside a single connection.
    if is_sqlite(database_url) && !is_file_backed_sqlite(database_url) {
        options.max_connections(1).min_connections(1);
    }

    options
}

/// Establish a connection to the database.
///
/// File-backed SQLite databases get WAL journaling, a 5 second busy timeout
/// and `synchronous=NORMAL`.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(connect_options(database_url)).await?;

    if is_file_backed_sqlite(database_url) {
        configure_sqlite(&db).await?;
    }

    Ok(db)
}

/// Connect and run all pending migrations.
///
/// # Example
/// ```ignore
/// let db = popstats::connect_and_migrate("sqlite::memory:").await?;
/// ```
#[cfg(feature = "migrate")]
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    use sea_orm_migration::MigratorTrait;

    let db = connect(database_url).await?;
    crate::migration::Migrator::up(&db, None).await?;
    Ok(db)
}
