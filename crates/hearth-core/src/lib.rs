//! # hearth-core
//!
//! Foundation types, errors, IDs, and utilities for the Hearth
//! family-health assistant.
//!
//! This crate provides the shared vocabulary the other hearth crates
//! depend on:
//!
//! - **IDs**: [`ids`] — prefixed UUID v7 constructors per entity
//! - **Entities**: [`issue::ActiveIssue`], [`event::EventMemory`],
//!   [`insight::Insight`], [`issue::IssueHistory`],
//!   [`conversation::Conversation`]
//! - **Reply schema**: [`reply::AssistantReply`] — the fixed JSON shape
//!   the model provider must produce
//! - **Diagnostics**: [`diagnostics::Diagnostic`] for best-effort step
//!   outcomes that are logged rather than raised
//! - **Retry**: [`retry::RetryConfig`] and backoff calculation
//! - **Logging**: [`logging::init_subscriber`]
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other hearth crates.

#![deny(unsafe_code)]

pub mod conversation;
pub mod diagnostics;
pub mod event;
pub mod ids;
pub mod insight;
pub mod issue;
pub mod logging;
pub mod reply;
pub mod retry;
pub mod time;
