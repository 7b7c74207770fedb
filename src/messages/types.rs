use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text of the "agent is typing" entry
pub const PLACEHOLDER_TEXT: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    User,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub author: Author,
    pub text: String,
    pub is_placeholder: bool,
    /// Persona the agent was using when the message was created
    pub funny_personality: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(author: Author, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author,
            text: text.into(),
            is_placeholder: false,
            funny_personality: false,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Author::User, text)
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(Author::Agent, text)
    }

    /// Transient agent entry shown while a reply is pending
    pub fn placeholder() -> Self {
        Self {
            is_placeholder: true,
            ..Self::agent(PLACEHOLDER_TEXT)
        }
    }

    pub fn with_personality(mut self, funny: bool) -> Self {
        self.funny_personality = funny;
        self
    }

    pub fn is_agent(&self) -> bool {
        self.author == Author::Agent
    }

    pub fn is_user(&self) -> bool {
        self.author == Author::User
    }
}
