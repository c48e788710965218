use thiserror::Error;

use crate::source::SourceError;
use crate::store::StoreError;

use super::scheduler::SchedulerError;

/// Errors that end a chain step.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The upstream rejected or failed a request.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Reading or writing the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The continuation step could not be scheduled.
    #[error(transparent)]
    Schedule(#[from] SchedulerError),

    /// A spawned detail task panicked or was cancelled.
    #[error("detail task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The step needs a client that was not configured.
    #[error("no {0} client configured")]
    MissingClient(&'static str),

    /// The chain was started with an unusable owner name.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SyncError {
    /// Whether the step must not be retried or continued.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Source(e) => e.is_fatal(),
            Self::Store(e) => matches!(e, StoreError::InvalidInput { .. }),
            Self::MissingClient(_) | Self::InvalidInput(_) => true,
            Self::Schedule(_) | Self::Task(_) => false,
        }
    }

    /// Whether delivering the same step again may succeed.
    pub fn is_transient(&self) -> bool {
        !self.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_follows_source_errors() {
        let fatal: SyncError = SourceError::NotFound {
            resource: "npm org nope".to_string(),
        }
        .into();
        assert!(fatal.is_fatal());

        let transient: SyncError = SourceError::Network {
            message: "reset".to_string(),
        }
        .into();
        assert!(transient.is_transient());

        let store: SyncError = StoreError::invalid_input("blank owner").into();
        assert!(store.is_fatal());

        let locked: SyncError =
            StoreError::Database(sea_orm::DbErr::Custom("database is locked".to_string())).into();
        assert!(locked.is_transient());

        assert!(SyncError::MissingClient("npm").is_fatal());
        assert!(SyncError::InvalidInput("blank owner".to_string()).is_fatal());
    }
}
