use crate::connection::SyncMode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Fetch failed for table '{table}': {message}")]
    FetchFailure { table: String, message: String },

    #[error("Reconciliation failed for table '{table}': {message}")]
    ReconciliationFailure { table: String, message: String },

    #[error("Seeding failed for table '{table}': {message}")]
    SeedFailure { table: String, message: String },

    #[error("Activity log write failed: {0}")]
    LogFailure(String),

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Remote store unavailable while in {0} mode")]
    RemoteUnavailable(SyncMode),

    #[error("Store '{0}' was reset while a remote call was in flight")]
    StoreReset(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Cannot {action} while in {from} mode")]
    InvalidTransition { from: SyncMode, action: &'static str },

    #[error("Duplicate id '{id}' in collection '{table}'")]
    DuplicateId { table: String, id: String },

    #[error("Entity without id in collection '{0}'")]
    MissingId(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl<T> From<std::sync::PoisonError<T>> for SyncError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
