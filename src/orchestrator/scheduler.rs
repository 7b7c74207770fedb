//! Runs timelines, one cancellable cycle at a time

use super::timeline::Timeline;
use crate::conversation::ConversationController;
use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How a timeline run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step was applied
    Completed,
    /// The cycle's token fired before the next step was due
    Cancelled,
    /// The controller refused a step because a newer cycle started
    Stale,
}

struct ActiveCycle {
    generation: u64,
    token: CancellationToken,
}

/// Owns the cancellation tokens of the send cycles.
///
/// Every cycle token is a child of one root token, so `shutdown` reaches
/// all of them, including ones whose tasks are still waiting on the network.
pub struct CycleScheduler {
    root: CancellationToken,
    current: Mutex<Option<ActiveCycle>>,
}

impl Default for CycleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleScheduler {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            current: Mutex::new(None),
        }
    }

    /// Start tracking `generation`, cancelling what the previous cycle left
    pub fn begin(&self, generation: u64) -> CancellationToken {
        let token = self.root.child_token();
        let previous = self.current.lock().replace(ActiveCycle {
            generation,
            token: token.clone(),
        });
        if let Some(previous) = previous {
            if !previous.token.is_cancelled() {
                debug!("Cancelling cycle {}", previous.generation);
                previous.token.cancel();
            }
        }
        token
    }

    pub fn cancel_current(&self) {
        if let Some(active) = self.current.lock().take() {
            active.token.cancel();
        }
    }

    /// Cancel every cycle, present and future
    pub fn shutdown(&self) {
        self.root.cancel();
        self.current.lock().take();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.current
            .lock()
            .as_ref()
            .filter(|active| !active.token.is_cancelled())
            .map(|active| active.generation)
    }

    /// Apply the steps of `timeline` at their offsets from now.
    ///
    /// Returns early when `token` is cancelled or the controller has moved
    /// on to another generation.
    pub async fn run(
        timeline: Timeline,
        generation: u64,
        token: &CancellationToken,
        controller: &ConversationController,
    ) -> RunOutcome {
        let start = Instant::now();
        for step in timeline.into_steps() {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Cycle {} cancelled before step at {:?}", generation, step.at);
                    return RunOutcome::Cancelled;
                }
                _ = sleep_until(start + step.at) => {}
            }

            if !controller.apply(generation, &step.effects) {
                return RunOutcome::Stale;
            }
        }
        RunOutcome::Completed
    }
}
