//! Response orchestration
//!
//! Turns each accepted user message into a network call and the reply (or
//! failure) into a timeline of conversation mutations. The orchestrator
//! knows nothing about audio; the cue follows the state it publishes.

pub mod scheduler;
pub mod timeline;

pub use scheduler::{CycleScheduler, RunOutcome};
pub use timeline::{
    Step, Timeline, TimelineConfig, HOLD_MESSAGE, HOLD_RESUME_MESSAGE,
    OPERATOR_CONNECTED_MESSAGE, TRANSFER_MESSAGE,
};

use crate::api::{AgentReply, AgentTransport, TransportError};
use crate::conversation::{ConversationController, SendCycle};
use crate::session::SessionStore;
use crate::HoldlineError;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How one send cycle ended
#[derive(Clone, Debug)]
pub enum CycleOutcome {
    /// The reply timeline ran to the end
    Replied,
    /// A failure was shown to the user and the conversation is idle again
    Recovered(HoldlineError),
    /// Teardown or a newer cycle cancelled this one
    Cancelled,
    /// The controller had already moved to another generation
    Stale,
}

#[derive(Clone)]
pub struct ResponseOrchestrator {
    controller: ConversationController,
    transport: Arc<dyn AgentTransport>,
    store: Arc<dyn SessionStore>,
    scheduler: Arc<CycleScheduler>,
    config: TimelineConfig,
}

impl ResponseOrchestrator {
    pub fn new(
        controller: ConversationController,
        transport: Arc<dyn AgentTransport>,
        store: Arc<dyn SessionStore>,
        config: TimelineConfig,
    ) -> Self {
        Self {
            controller,
            transport,
            store,
            scheduler: Arc::new(CycleScheduler::new()),
            config,
        }
    }

    pub fn controller(&self) -> &ConversationController {
        &self.controller
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Submit user text.
    ///
    /// Returns `None` when the controller refuses the message (blank, or
    /// the conversation is busy) or after shutdown. Otherwise the cycle runs
    /// on its own task.
    pub fn send(&self, text: &str) -> Option<JoinHandle<CycleOutcome>> {
        if self.scheduler.is_shut_down() {
            warn!("Orchestrator is shut down, dropping message");
            return None;
        }

        let cycle = self.controller.send_user_message(text)?;
        let token = self.scheduler.begin(cycle.generation);
        let orchestrator = self.clone();
        Some(tokio::spawn(async move {
            orchestrator.run_cycle(cycle, token).await
        }))
    }

    /// Drive one accepted cycle: network call, then its timeline
    pub async fn run_cycle(&self, cycle: SendCycle, token: CancellationToken) -> CycleOutcome {
        let session_id = self.store.get();
        if session_id.is_none() {
            warn!("Sending without a session id");
        }

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Cycle {} cancelled while waiting for the agent", cycle.generation);
                return CycleOutcome::Cancelled;
            }
            response = self.transport.send_message(session_id.as_deref(), &cycle.text) => response,
        };

        let (timeline, failure) = self.plan(response, cycle.generation);
        let outcome =
            CycleScheduler::run(timeline, cycle.generation, &token, &self.controller).await;

        match (outcome, failure) {
            (RunOutcome::Completed, None) => CycleOutcome::Replied,
            (RunOutcome::Completed, Some(error)) => CycleOutcome::Recovered(error),
            (RunOutcome::Cancelled, _) => CycleOutcome::Cancelled,
            (RunOutcome::Stale, _) => CycleOutcome::Stale,
        }
    }

    fn plan(
        &self,
        response: Result<AgentReply, TransportError>,
        generation: u64,
    ) -> (Timeline, Option<HoldlineError>) {
        match response {
            Ok(reply) => match Timeline::for_reply(&reply, &self.config) {
                Ok(timeline) => {
                    debug!(
                        "Cycle {}: reply (waiting={}, transfer={}), {} steps",
                        generation,
                        reply.waiting,
                        reply.transfer,
                        timeline.len()
                    );
                    (timeline, None)
                }
                Err(e) => {
                    warn!("Cycle {}: {}", generation, e);
                    (Timeline::for_failure(&e, &self.config), Some(e))
                }
            },
            Err(e) => {
                let error = HoldlineError::from_send_failure(e);
                error!("Cycle {} failed: {}", generation, error);
                (Timeline::for_failure(&error, &self.config), Some(error))
            }
        }
    }

    /// Cancel every pending follow-up and return the conversation to idle
    pub fn shutdown(&self) {
        if self.scheduler.is_shut_down() {
            return;
        }
        self.scheduler.shutdown();
        self.controller.reset();
        info!("Response orchestrator stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.scheduler.is_shut_down()
    }
}
