//! Queue-consumer worker.
//!
//! [`run_worker`] drains conversation jobs from an mpsc channel and
//! hands each to the orchestrator. Every job gets a timeout: a job
//! still running when it fires is abandoned (the future is dropped;
//! writes already issued stay written, nothing is rolled back). The
//! loop exits when the channel closes or the shutdown token fires.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::orchestrator::Orchestrator;

/// One unit of work from the queue.
#[derive(Debug)]
pub struct ConversationJob {
    /// Conversation to process.
    pub conversation_id: String,
}

/// Worker tuning.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// How long one job may run before it is abandoned.
    pub job_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(60),
        }
    }
}

/// Consume jobs until the channel closes or shutdown fires.
pub async fn run_worker(
    orchestrator: Arc<Orchestrator>,
    mut jobs: mpsc::Receiver<ConversationJob>,
    config: WorkerConfig,
    shutdown: CancellationToken,
) {
    info!(timeout_secs = config.job_timeout.as_secs(), "worker started");
    loop {
        let job = tokio::select! {
            () = shutdown.cancelled() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        gauge!("hearth_worker_jobs_in_flight").increment(1.0);
        tokio::select! {
            () = tokio::time::sleep(config.job_timeout) => {
                warn!(
                    conversation_id = %job.conversation_id,
                    "job exceeded timeout and was abandoned"
                );
                counter!("hearth_worker_jobs_abandoned_total").increment(1);
            }
            result = orchestrator.process(&job.conversation_id) => match result {
                Ok(outcome) => {
                    debug!(conversation_id = %outcome.conversation_id, "job succeeded");
                }
                Err(err) => {
                    error!(conversation_id = %job.conversation_id, %err, "job failed");
                }
            }
        }
        gauge!("hearth_worker_jobs_in_flight").decrement(1.0);
    }
    info!("worker stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use hearth_core::conversation::ConversationPhase;
    use hearth_core::reply::AssistantReply;
    use hearth_store::MemoryStore;

    use crate::provider::{ModelProvider, ProviderResult};

    struct FixedProvider;

    #[async_trait::async_trait]
    impl ModelProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _system: &str, _user: &str) -> ProviderResult<AssistantReply> {
            Ok(AssistantReply::from_value(json!({
                "reflection": "Thanks for sharing.",
                "interpretation": "General information, not a diagnosis.",
                "redFlags": ["Rapid worsening"],
                "followUp": "How is it now?",
                "recommendations": ["Check in with your doctor"]
            }))
            .unwrap())
        }
    }

    async fn wait_for_terminal(store: &MemoryStore, conversation_id: &str) -> ConversationPhase {
        for _ in 0..100 {
            let conversation = store.require_conversation(conversation_id).unwrap();
            if conversation.phase.is_terminal() {
                return conversation.phase;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("conversation never reached a terminal phase");
    }

    #[tokio::test]
    async fn worker_processes_jobs_until_shutdown() {
        let store = Arc::new(MemoryStore::open_in_memory().unwrap());
        let subject = store.create_subject("Maya").unwrap();
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&store), Arc::new(FixedProvider)));

        let (tx, rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            orchestrator,
            rx,
            WorkerConfig::default(),
            shutdown.clone(),
        ));

        let first = store.create_conversation(&subject.id, "headache").unwrap();
        let second = store.create_conversation(&subject.id, "still hurts").unwrap();
        tx.send(ConversationJob {
            conversation_id: first.id.clone(),
        })
        .await
        .unwrap();
        tx.send(ConversationJob {
            conversation_id: second.id.clone(),
        })
        .await
        .unwrap();

        assert_eq!(
            wait_for_terminal(&store, &first.id).await,
            ConversationPhase::Persisted
        );
        assert_eq!(
            wait_for_terminal(&store, &second.id).await,
            ConversationPhase::Persisted
        );

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn worker_exits_when_channel_closes() {
        let store = Arc::new(MemoryStore::open_in_memory().unwrap());
        let orchestrator = Arc::new(Orchestrator::new(store, Arc::new(FixedProvider)));

        let (tx, rx) = mpsc::channel::<ConversationJob>(1);
        let handle = tokio::spawn(run_worker(
            orchestrator,
            rx,
            WorkerConfig::default(),
            CancellationToken::new(),
        ));
        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn missing_conversation_does_not_kill_the_worker() {
        let store = Arc::new(MemoryStore::open_in_memory().unwrap());
        let subject = store.create_subject("Maya").unwrap();
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&store), Arc::new(FixedProvider)));

        let (tx, rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            orchestrator,
            rx,
            WorkerConfig::default(),
            shutdown.clone(),
        ));

        tx.send(ConversationJob {
            conversation_id: "conv_missing".into(),
        })
        .await
        .unwrap();
        let real = store.create_conversation(&subject.id, "hello").unwrap();
        tx.send(ConversationJob {
            conversation_id: real.id.clone(),
        })
        .await
        .unwrap();

        assert_eq!(
            wait_for_terminal(&store, &real.id).await,
            ConversationPhase::Persisted
        );
        shutdown.cancel();
        handle.await.unwrap();
    }
}
