//! Conversation controller
//!
//! Single source of truth for the message log and the conversation state.
//! Every mutation goes through one of the methods here, under one lock, so
//! log changes from concurrent send cycles can never interleave.

use super::state::{ChatEvent, Conversation, ConversationSnapshot, ConversationState, Effect};
use crate::messages::Message;
use crate::ui::Notification;
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// An accepted user message, handed to the orchestrator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendCycle {
    pub generation: u64,
    pub text: String,
}

#[derive(Clone)]
pub struct ConversationController {
    inner: Arc<RwLock<Conversation>>,
    state_tx: Arc<watch::Sender<ConversationState>>,
    event_tx: Option<Sender<ChatEvent>>,
}

impl Default for ConversationController {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationController {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ConversationState::Idle);
        Self {
            inner: Arc::new(RwLock::new(Conversation::new())),
            state_tx: Arc::new(state_tx),
            event_tx: None,
        }
    }

    /// Seed the log with opening agent messages, shown before the first send
    pub fn with_greeting<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut conversation = self.inner.write();
            for line in lines {
                conversation.log.push(Message::agent(line));
            }
        }
        self
    }

    /// Forward front-end events to `event_tx`
    pub fn with_events(mut self, event_tx: Sender<ChatEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    // === Read side ===

    pub fn state(&self) -> ConversationState {
        self.inner.read().state
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.inner.read().snapshot()
    }

    /// Subscribe to state changes (used by the audio follower)
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state_tx.subscribe()
    }

    // === Mutations ===

    /// Accept a user message.
    ///
    /// Returns `None` (and changes nothing) for blank text or while the
    /// conversation is busy. On acceptance the user message and the
    /// placeholder are appended, the state moves to `AwaitingReply` and a
    /// new generation starts.
    pub fn send_user_message(&self, text: &str) -> Option<SendCycle> {
        if text.trim().is_empty() {
            debug!("Ignoring blank message");
            return None;
        }

        let cycle = {
            let mut conversation = self.inner.write();
            if conversation.state.is_busy() {
                warn!(
                    "Cannot send message: conversation is {}",
                    conversation.state
                );
                return None;
            }

            let funny = conversation.funny_personality;
            conversation.log.push(Message::user(text));
            conversation.log.insert_placeholder(funny);
            conversation.state = ConversationState::AwaitingReply;
            conversation.generation += 1;

            SendCycle {
                generation: conversation.generation,
                text: text.to_string(),
            }
        };

        debug!("Send cycle {} started", cycle.generation);
        self.publish_state(ConversationState::AwaitingReply);
        self.emit(ChatEvent::MessagesChanged);
        Some(cycle)
    }

    /// Append an agent message, optionally dropping the placeholder first
    pub fn append_agent_message(&self, text: &str, replace_placeholder: bool) {
        {
            let mut conversation = self.inner.write();
            if replace_placeholder {
                conversation.log.remove_placeholders();
            }
            let funny = conversation.funny_personality;
            conversation
                .log
                .push(Message::agent(text).with_personality(funny));
        }
        self.emit(ChatEvent::MessagesChanged);
    }

    /// Append a placeholder unless one is already shown
    pub fn insert_placeholder(&self) -> bool {
        let inserted = {
            let mut conversation = self.inner.write();
            let funny = conversation.funny_personality;
            conversation.log.insert_placeholder(funny)
        };
        if inserted {
            self.emit(ChatEvent::MessagesChanged);
        }
        inserted
    }

    /// Apply one timeline step atomically.
    ///
    /// Steps from a generation other than the current one are refused, so a
    /// follow-up that survived cancellation still cannot touch the log.
    pub fn apply(&self, generation: u64, effects: &[Effect]) -> bool {
        let mut messages_changed = false;
        let mut new_state = None;
        let mut notifications: Vec<Notification> = Vec::new();

        {
            let mut conversation = self.inner.write();
            if conversation.generation != generation {
                debug!(
                    "Dropping stale step from cycle {} (current {})",
                    generation, conversation.generation
                );
                return false;
            }

            for effect in effects {
                match effect {
                    Effect::InsertPlaceholder => {
                        let funny = conversation.funny_personality;
                        messages_changed |= conversation.log.insert_placeholder(funny);
                    }
                    Effect::RemovePlaceholders => {
                        messages_changed |= conversation.log.remove_placeholders() > 0;
                    }
                    Effect::AppendAgent {
                        text,
                        replace_placeholder,
                    } => {
                        if *replace_placeholder {
                            conversation.log.remove_placeholders();
                        }
                        let funny = conversation.funny_personality;
                        conversation
                            .log
                            .push(Message::agent(text.clone()).with_personality(funny));
                        messages_changed = true;
                    }
                    Effect::SetState(state) => {
                        if conversation.state != *state {
                            debug!("Conversation {} -> {}", conversation.state, state);
                            conversation.state = *state;
                            new_state = Some(*state);
                        }
                    }
                    Effect::SetPersonality(funny) => {
                        conversation.funny_personality = *funny;
                    }
                    Effect::Notify(notification) => {
                        notifications.push(notification.clone());
                    }
                }
            }
        }

        if let Some(state) = new_state {
            self.publish_state(state);
        }
        if messages_changed {
            self.emit(ChatEvent::MessagesChanged);
        }
        for notification in notifications {
            self.emit(ChatEvent::Notification(notification));
        }
        true
    }

    /// Invalidate the current cycle and return to `Idle`.
    ///
    /// Used at teardown; a leftover placeholder is removed.
    pub fn reset(&self) -> u64 {
        let (generation, changed) = {
            let mut conversation = self.inner.write();
            conversation.generation += 1;
            conversation.log.remove_placeholders();
            let changed = conversation.state != ConversationState::Idle;
            conversation.state = ConversationState::Idle;
            (conversation.generation, changed)
        };
        if changed {
            self.publish_state(ConversationState::Idle);
        }
        generation
    }

    /// Raise a notification at the UI boundary without touching the log
    pub fn notify(&self, notification: Notification) {
        self.emit(ChatEvent::Notification(notification));
    }

    pub(crate) fn emit(&self, event: ChatEvent) {
        if let Some(tx) = &self.event_tx {
            if let Err(e) = tx.try_send(event) {
                debug!("Dropping UI event: {}", e);
            }
        }
    }

    fn publish_state(&self, state: ConversationState) {
        self.state_tx.send_replace(state);
        self.emit(ChatEvent::StateChanged(state));
    }
}
