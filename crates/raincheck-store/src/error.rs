//! Credential store errors.
//!
//! Callers branch on the variant. [`StoreError::NotFound`] and
//! [`StoreError::InvalidToken`] describe the request; everything from
//! [`StoreError::Consistency`] down describes the store itself.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing is stored under `id`.
    #[error("no {entity} for {id}")]
    NotFound { entity: &'static str, id: String },

    /// The presented token belongs to nobody.
    #[error("token is not recognised")]
    InvalidToken,

    /// Rejected input such as an empty user ID.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A token resolved to `matches` users. The data needs repair.
    #[error("{matches} users hold the same token")]
    Consistency { matches: usize },

    #[error("secure random generator unavailable")]
    Rng,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Schema step `version` could not be applied.
    #[error("schema v{version}: {message}")]
    Migration { version: u32, message: String },

    /// A thread panicked while holding the connection.
    #[error("database connection lock is poisoned")]
    Poisoned,

    /// The blocking task running a query was cancelled or panicked.
    #[error("database task aborted: {0}")]
    TaskJoin(String),
}

impl StoreError {
    /// True when the error is about the caller's input, not store health.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::InvalidToken | Self::InvalidArgument(_)
        )
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
