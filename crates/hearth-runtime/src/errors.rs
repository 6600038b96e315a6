//! Runtime error type.

use thiserror::Error;

use hearth_core::reply::ReplyParseError;
use hearth_store::StoreError;

use crate::provider::ProviderError;

/// Result alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Error from conversation processing.
///
/// Provider and reply-schema failures mean the conversation was marked
/// failed with a fallback reply before the error propagated; store
/// failures mean processing stopped where it stood.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Persistence access failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The model provider failed after its own retry policy ran out.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A reply violated the fixed schema outside the provider path.
    #[error(transparent)]
    InvalidReply(#[from] ReplyParseError),

    /// Serializing a reply for persistence failed.
    #[error("reply serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
