//! Prompt rendering.
//!
//! The system prompt pins the assistant's role, the no-diagnosis
//! framing, and the reply JSON schema. The user prompt lays out the
//! context bundle as labelled sections followed by the raw user
//! message, so the model sees what is already known before what was
//! just said.

use std::fmt::Write;

use hearth_memory::retrieval::ContextBundle;

/// Fixed system prompt sent with every model call.
pub const SYSTEM_PROMPT: &str = "\
You are a careful family-health assistant. You help a family keep track \
of everyday health concerns and decide when professional care is needed.

Rules you must always follow:
- Never state or imply a diagnosis. Offer possibilities in plain language.
- Never use prescriptive phrasing such as \"prescribe\" or \"you are diagnosed with\".
- Always include warning signs that should prompt immediate care.
- Always encourage consulting a doctor or other healthcare professional \
when symptoms persist or worsen, and make clear your reply is general \
information, not medical advice.

Respond with a single JSON object and nothing else, using exactly these \
fields: \"reflection\" (empathetic one-paragraph summary), \
\"interpretation\" (plain-language explanation of what might be going on), \
\"guidance\" (array of general-care strings), \"redFlags\" (array of \
warning-sign strings, never empty), \"followUp\" (one question to keep \
the thread going), \"recommendations\" (array of next-step strings), and \
\"suggestedIssueUpdates\" (array of objects with \"action\" in \
create|update|resolve|none, optional \"issueId\", \"label\", \"status\" in \
active|improving|monitoring|resolved, \"severity\" in mild|moderate|severe, \
and \"reason\").";

/// Render the user prompt from the context bundle and the user text.
#[must_use]
pub fn build_user_prompt(bundle: &ContextBundle, user_text: &str) -> String {
    let mut out = String::new();

    if bundle.active_issues.is_empty() {
        out.push_str("No tracked issues yet for this subject.\n");
    } else {
        out.push_str("Tracked issues:\n");
        for issue in &bundle.active_issues {
            let _ = writeln!(
                out,
                "- {} ({}, {}, last mentioned {})",
                issue.label, issue.status, issue.severity, issue.last_mentioned_at
            );
        }
    }

    if !bundle.recent_events.is_empty() {
        out.push_str("\nRecent events:\n");
        for event in &bundle.recent_events {
            let _ = writeln!(out, "- [{}] {} ({})", event.kind, event.description, event.occurred_at);
        }
    }

    if !bundle.insights.is_empty() {
        out.push_str("\nObservations worth keeping in mind:\n");
        for insight in &bundle.insights {
            let _ = writeln!(out, "- {}", insight.text);
        }
    }

    let _ = write!(out, "\nUser message:\n{user_text}");
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
