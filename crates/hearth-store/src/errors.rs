//! Storage error type and retryability classification.

use thiserror::Error;

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error from the persistence accessor.
///
/// Every persistence failure surfaces as a `StoreError`; callers decide
/// whether to degrade (retrieval, update) or propagate (orchestrator).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Raw `SQLite` error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error (exhausted or build failure).
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failure.
    #[error("migration failed: {message}")]
    Migration {
        /// What went wrong.
        message: String,
    },

    /// JSON (de)serialization of a stored payload failed.
    #[error("payload serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Referenced issue does not exist.
    #[error("issue not found: {0}")]
    IssueNotFound(String),

    /// Referenced conversation does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// Referenced subject does not exist.
    #[error("subject not found: {0}")]
    SubjectNotFound(String),

    /// Internal invariant violation.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether retrying the operation could succeed.
    ///
    /// Busy/locked database states and pool exhaustion are transient;
    /// everything else is not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(code, _)) => matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            Self::Pool(_) => true,
            _ => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
