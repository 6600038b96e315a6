//! # hearth-runtime
//!
//! Top of the Hearth stack: drives one conversation end to end.
//!
//! - [`provider`] — the model-provider contract and the HTTP client
//!   with retrying exponential backoff
//! - [`prompt`] — renders the system and user prompts from a context
//!   bundle
//! - [`orchestrator`] — the per-conversation phase machine:
//!   `received → context_retrieved → model_called → validated →
//!   persisted`, with a fallback reply on provider failure
//! - [`worker`] — queue consumer calling the orchestrator with a
//!   per-job timeout
//!
//! ## Crate Position
//!
//! Aggregation layer. Depends on hearth-core, hearth-store, and
//! hearth-memory; nothing depends on it.

#![deny(unsafe_code)]

pub mod errors;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod worker;

pub use errors::{Result, RuntimeError};
pub use orchestrator::{Orchestrator, ProcessOutcome};
pub use provider::{ModelProvider, ProviderError};
