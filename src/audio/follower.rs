//! Keeps the cue in step with the conversation

use super::engine::AudioCueEngine;
use crate::conversation::ConversationState;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Task applying the conversation's cue signal to the engine whenever the
/// state or the engine's readiness changes
pub struct CueFollower {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl CueFollower {
    pub fn spawn(
        engine: Arc<AudioCueEngine>,
        mut states: watch::Receiver<ConversationState>,
        parent: &CancellationToken,
    ) -> Self {
        let token = parent.child_token();
        let mut ready = engine.subscribe_ready();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            info!("Cue follower started");
            loop {
                let state = *states.borrow_and_update();
                ready.borrow_and_update();
                debug!("Cue follows {}", state);
                engine.follow(state.cue_signal());

                tokio::select! {
                    _ = task_token.cancelled() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = ready.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            info!("Cue follower stopped");
        });

        Self { token, handle }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop and wait for the task to exit
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}
