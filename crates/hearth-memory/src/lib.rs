//! Memory subsystem for the Hearth assistant.
//!
//! Three concerns live here, all operating over [`hearth_store::MemoryStore`]:
//!
//! - [`retrieval`] assembles the context bundle handed to the model, with
//!   per-slice degradation so one failing query never sinks a conversation.
//! - [`safety`] runs the ordered validation checks over an assistant reply
//!   and rewrites it when escalation is required.
//! - [`update`] applies post-reply writes (event log, issue reconciliation,
//!   auto-transition sweep), and [`insights`] runs the correlation rules.

pub mod insights;
pub mod retrieval;
pub mod safety;
pub mod update;

pub use insights::InsightDetector;
pub use retrieval::{ContextBundle, MemoryRetriever};
pub use safety::{SafetyReport, SafetySeverity};
pub use update::MemoryUpdater;
