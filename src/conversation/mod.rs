//! Conversation model: message log, state machine and the controller that
//! owns them

pub mod controller;
pub mod state;

pub use controller::{ConversationController, SendCycle};
pub use state::{
    ChatEvent, Conversation, ConversationSnapshot, ConversationState, CueSignal, Effect,
};
