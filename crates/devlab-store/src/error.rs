//! Error types for scenario metadata storage

/// Metadata store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A record with this ID already exists
    #[error("scenario {0} already exists")]
    Duplicate(String),

    /// No record with this ID
    #[error("scenario {0} not found")]
    NotFound(String),

    /// Record rejected before reaching the backend
    #[error("invalid record: {0}")]
    Invalid(String),

    /// Stored data could not be decoded
    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// Backend failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Record is missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Backend(format!("storage task failed: {err}"))
    }
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
