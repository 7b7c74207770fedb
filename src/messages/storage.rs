use super::types::{Author, Message};

/// Ordered message log.
///
/// Append-only, except that placeholder entries are removed by filter.
/// Holds at most one placeholder at any time.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        if message.is_placeholder && self.has_placeholder() {
            return;
        }
        self.messages.push(message);
    }

    /// Append a placeholder; returns false if one is already present
    pub fn insert_placeholder(&mut self, funny: bool) -> bool {
        if self.has_placeholder() {
            return false;
        }
        self.messages.push(Message::placeholder().with_personality(funny));
        true
    }

    /// Remove every placeholder entry, returning how many were dropped
    pub fn remove_placeholders(&mut self) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| !m.is_placeholder);
        before - self.messages.len()
    }

    pub fn has_placeholder(&self) -> bool {
        self.messages.iter().any(|m| m.is_placeholder)
    }

    pub fn placeholder_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_placeholder).count()
    }

    pub fn get_all(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Real (non-placeholder) agent messages
    pub fn agent_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.author == Author::Agent && !m.is_placeholder)
            .count()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
