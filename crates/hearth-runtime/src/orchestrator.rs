//! The per-conversation orchestrator.
//!
//! [`Orchestrator::process`] is the single queue-handler entry point.
//! One call drives the phase machine `received → context_retrieved →
//! model_called → validated → persisted`, persisting each transition so
//! no terminal failure is silent. A provider or schema failure marks
//! the conversation `failed` with a hard-coded fallback reply and then
//! propagates, leaving the queue to account for the job.
//!
//! Memory update runs best-effort after the reply is persisted; insight
//! detection is detached onto a blocking task and never holds up the
//! response.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, error, instrument};

use hearth_core::conversation::ConversationPhase;
use hearth_core::diagnostics::log_diagnostics;
use hearth_core::reply::AssistantReply;
use hearth_memory::insights::InsightDetector;
use hearth_memory::retrieval::MemoryRetriever;
use hearth_memory::safety::{self, SafetyReport};
use hearth_memory::update::MemoryUpdater;
use hearth_store::MemoryStore;

use crate::errors::Result;
use crate::prompt;
use crate::provider::ModelProvider;

/// What `process` hands back to the queue on success.
#[derive(Debug)]
pub struct ProcessOutcome {
    /// The conversation that was processed.
    pub conversation_id: String,
    /// The reply that was persisted (post-safety).
    pub reply: AssistantReply,
    /// The safety report for the original model reply.
    pub safety: SafetyReport,
}

/// Drives one conversation end to end.
pub struct Orchestrator {
    store: Arc<MemoryStore>,
    retriever: MemoryRetriever,
    updater: MemoryUpdater,
    detector: Arc<InsightDetector>,
    provider: Arc<dyn ModelProvider>,
}

impl Orchestrator {
    /// Wire the orchestrator over a shared store and provider.
    #[must_use]
    pub fn new(store: Arc<MemoryStore>, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            retriever: MemoryRetriever::new(Arc::clone(&store)),
            updater: MemoryUpdater::new(Arc::clone(&store)),
            detector: Arc::new(InsightDetector::new(Arc::clone(&store))),
            store,
            provider,
        }
    }

    /// Process one conversation job.
    ///
    /// Success means the reply is persisted and the conversation is in
    /// `persisted`. A returned error means the conversation is in
    /// `failed` with the fallback reply (provider/schema failures), or
    /// processing stopped where the store gave out.
    #[instrument(skip(self))]
    pub async fn process(&self, conversation_id: &str) -> Result<ProcessOutcome> {
        let conversation = self.store.require_conversation(conversation_id)?;
        let subject_id = conversation.subject_id.clone();

        let bundle = self.retriever.retrieve(&subject_id).await;
        self.set_phase(conversation_id, ConversationPhase::ContextRetrieved)?;

        let user_prompt = prompt::build_user_prompt(&bundle, &conversation.user_text);
        let reply = match self
            .provider
            .complete(prompt::SYSTEM_PROMPT, &user_prompt)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                error!(conversation_id, %err, "model call failed, substituting fallback");
                counter!("hearth_conversations_failed_total").increment(1);
                self.fail_with_fallback(conversation_id);
                return Err(err.into());
            }
        };
        self.set_phase(conversation_id, ConversationPhase::ModelCalled)?;

        let report = safety::validate(&reply, &conversation.user_text);
        if report.should_escalate {
            counter!("hearth_safety_escalations_total").increment(1);
        }
        let final_reply = report.modified_reply.clone().unwrap_or(reply);
        self.set_phase(conversation_id, ConversationPhase::Validated)?;

        let reply_json = serde_json::to_value(&final_reply)?;
        let _ = self
            .store
            .set_conversation_reply(conversation_id, &reply_json)?;

        let diagnostics =
            self.updater
                .update(&subject_id, &conversation.user_text, &final_reply, &bundle);
        log_diagnostics(&diagnostics);
        self.set_phase(conversation_id, ConversationPhase::Persisted)?;

        self.spawn_detection(subject_id);
        counter!("hearth_conversations_processed_total").increment(1);

        Ok(ProcessOutcome {
            conversation_id: conversation_id.to_string(),
            reply: final_reply,
            safety: report,
        })
    }

    /// The hard-coded reply persisted when the model cannot answer.
    #[must_use]
    pub fn fallback_reply() -> AssistantReply {
        AssistantReply {
            reflection: "Thanks for telling me about this. I couldn't put together a \
                personalized answer just now, but your message has been saved."
                .to_string(),
            interpretation: "This is general information, not a diagnosis: many everyday \
                symptoms settle on their own, but only a professional can assess what is \
                going on."
                .to_string(),
            guidance: vec![
                "Keep a short note of when symptoms appear and how long they last".to_string(),
            ],
            red_flags: vec![
                "Severe or rapidly worsening symptoms".to_string(),
                "Trouble breathing, chest pain, or confusion".to_string(),
            ],
            follow_up: "Could you try telling me about this again in a little while?".to_string(),
            recommendations: vec![
                "If you are concerned, contact your doctor or healthcare provider directly"
                    .to_string(),
            ],
            suggested_issue_updates: Vec::new(),
        }
    }

    fn set_phase(&self, conversation_id: &str, phase: ConversationPhase) -> Result<()> {
        let _ = self.store.set_conversation_phase(conversation_id, phase)?;
        debug!(conversation_id, %phase, "phase transition");
        Ok(())
    }

    /// Best-effort terminal failure: fallback reply plus `failed`
    /// phase. Store errors here are logged, not raised — the original
    /// provider error is what propagates.
    fn fail_with_fallback(&self, conversation_id: &str) {
        match serde_json::to_value(Self::fallback_reply()) {
            Ok(fallback) => {
                if let Err(err) = self.store.set_conversation_reply(conversation_id, &fallback) {
                    error!(conversation_id, %err, "failed to persist fallback reply");
                }
            }
            Err(err) => error!(conversation_id, %err, "failed to serialize fallback reply"),
        }
        if let Err(err) = self
            .store
            .set_conversation_phase(conversation_id, ConversationPhase::Failed)
        {
            error!(conversation_id, %err, "failed to mark conversation failed");
        }
    }

    /// Detach insight detection for the subject onto a blocking task.
    fn spawn_detection(&self, subject_id: String) {
        let detector = Arc::clone(&self.detector);
        let _ = tokio::task::spawn_blocking(move || {
            let outcome = detector.detect(&subject_id);
            log_diagnostics(&outcome.diagnostics);
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
