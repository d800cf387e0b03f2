use crate::plan::ResourceKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimekillError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Quota exceeded for {kind}: {remaining} remaining this window")]
    QuotaExceeded { kind: ResourceKind, remaining: u64 },

    #[error("Quota store unavailable: {0}")]
    QuotaStoreUnavailable(String),

    #[error("Invalid plan state: {0}")]
    InvalidPlanState(String),

    #[error("Humanizer provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TimekillError>;
