//! Integration layer
//!
//! Configuration and the composed chat session the front-end talks to.

pub mod chat;
pub mod config;

pub use chat::{ChatSession, ChatSessionBuilder};
pub use config::ChatConfig;
