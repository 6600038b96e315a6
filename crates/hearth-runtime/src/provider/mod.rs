//! The model-provider contract.
//!
//! The orchestrator talks to the language model through one call:
//! system prompt plus user prompt in, a schema-validated
//! [`AssistantReply`] out. Retry policy lives inside the provider
//! implementation; the orchestrator never retries a model call.

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use hearth_core::reply::{AssistantReply, ReplyParseError};

pub use http::{HttpModelProvider, HttpProviderConfig};

/// Result alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Error from a model-provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the provider API.
    #[error("provider returned status {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error body, truncated.
        message: String,
        /// Whether the status class is worth retrying.
        retryable: bool,
    },

    /// The reply body did not match the fixed schema. Fatal for the
    /// attempt; the caller substitutes the fallback reply.
    #[error("model reply failed schema validation: {0}")]
    InvalidReply(#[from] ReplyParseError),
}

impl ProviderError {
    /// Whether the provider's retry loop should try again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::Api { retryable, .. } => *retryable,
            Self::InvalidReply(_) => false,
        }
    }
}

/// A language-model backend able to answer one conversation turn.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name for logs and metrics.
    fn name(&self) -> &str;

    /// Produce a schema-valid reply for the given prompts.
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
    -> ProviderResult<AssistantReply>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
