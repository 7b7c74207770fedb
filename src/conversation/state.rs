//! Conversation state shared between the controller, the orchestrator and
//! the front-end
//!
//! The design separates:
//! - **State**: the message log and the high-level conversation state,
//!   queried synchronously through snapshots
//! - **Effects**: mutations produced by the orchestrator's timeline
//! - **Events**: notifications for the front-end (repaint, modal)

use crate::messages::{Message, MessageLog};
use crate::ui::Notification;
use serde::{Deserialize, Serialize};

/// High-level conversation state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationState {
    /// Ready for user input
    #[default]
    Idle,
    /// A message was sent, the agent's reply is pending
    AwaitingReply,
    /// The agent put the user on hold
    OnHold,
    /// The conversation is being handed to an operator
    Transferring,
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }

    /// Input is disabled in every state but `Idle`
    pub fn is_busy(&self) -> bool {
        !self.is_idle()
    }

    pub fn is_on_hold(&self) -> bool {
        matches!(self, ConversationState::OnHold)
    }

    pub fn is_transferring(&self) -> bool {
        matches!(self, ConversationState::Transferring)
    }

    /// The only view of the conversation the audio side gets
    pub fn cue_signal(&self) -> CueSignal {
        match self {
            ConversationState::OnHold => CueSignal::Waiting,
            ConversationState::Transferring => CueSignal::Transferring,
            ConversationState::Idle | ConversationState::AwaitingReply => CueSignal::None,
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationState::Idle => write!(f, "Idle"),
            ConversationState::AwaitingReply => write!(f, "AwaitingReply"),
            ConversationState::OnHold => write!(f, "OnHold"),
            ConversationState::Transferring => write!(f, "Transferring"),
        }
    }
}

/// Audio-facing state signal
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CueSignal {
    #[default]
    None,
    Waiting,
    Transferring,
}

/// A single conversation mutation.
///
/// Timeline steps carry a list of these; the controller applies one step's
/// effects atomically.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    InsertPlaceholder,
    RemovePlaceholders,
    AppendAgent {
        text: String,
        replace_placeholder: bool,
    },
    SetState(ConversationState),
    SetPersonality(bool),
    Notify(Notification),
}

impl Effect {
    pub fn replace_placeholder(text: impl Into<String>) -> Self {
        Effect::AppendAgent {
            text: text.into(),
            replace_placeholder: true,
        }
    }

    pub fn append_agent(text: impl Into<String>) -> Self {
        Effect::AppendAgent {
            text: text.into(),
            replace_placeholder: false,
        }
    }
}

/// Events emitted towards the front-end.
///
/// State should be read from a snapshot rather than rebuilt from events.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatEvent {
    /// The message log changed (trigger a repaint)
    MessagesChanged,
    /// The conversation state changed
    StateChanged(ConversationState),
    /// A modal notification must be shown
    Notification(Notification),
    /// The session has been torn down
    Closed,
}

/// Conversation data guarded by the controller's lock
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    pub log: MessageLog,
    pub state: ConversationState,
    /// Send-cycle generation; bumped on every accepted send and on reset
    pub generation: u64,
    /// Persona flag most recently reported by the server
    pub funny_personality: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            messages: self.log.get_all(),
            state: self.state,
            generation: self.generation,
            funny_personality: self.funny_personality,
        }
    }
}

/// Immutable copy of the conversation, read without holding locks
#[derive(Clone, Debug)]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    pub state: ConversationState,
    pub generation: u64,
    pub funny_personality: bool,
}

impl ConversationSnapshot {
    pub fn placeholder_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_placeholder).count()
    }

    pub fn agent_texts(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.is_agent() && !m.is_placeholder)
            .map(|m| m.text.as_str())
            .collect()
    }

    pub fn last_text(&self) -> Option<&str> {
        self.messages.last().map(|m| m.text.as_str())
    }
}
