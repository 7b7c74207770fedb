//! In-process transport that replays queued replies
//!
//! Used by the test suites and for running the client without a backend.

use super::transport::{AgentTransport, TransportError};
use super::types::{AgentReply, ChatRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

type Scripted = (Duration, Result<AgentReply, TransportError>);

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    sessions: Mutex<VecDeque<Result<String, TransportError>>>,
    replies: Mutex<VecDeque<Scripted>>,
    sent: Mutex<Vec<ChatRequest>>,
    closed: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next `start_session`
    pub fn push_session(&self, outcome: Result<String, TransportError>) -> &Self {
        self.sessions.lock().push_back(outcome);
        self
    }

    /// Queue a reply delivered right away
    pub fn push_reply(&self, reply: AgentReply) -> &Self {
        self.push_after(Duration::ZERO, Ok(reply))
    }

    pub fn push_failure(&self, error: TransportError) -> &Self {
        self.push_after(Duration::ZERO, Err(error))
    }

    /// Queue an outcome delivered after `latency` on the tokio clock
    pub fn push_after(
        &self,
        latency: Duration,
        outcome: Result<AgentReply, TransportError>,
    ) -> &Self {
        self.replies.lock().push_back((latency, outcome));
        self
    }

    /// Requests received so far
    pub fn sent(&self) -> Vec<ChatRequest> {
        self.sent.lock().clone()
    }

    /// Session ids passed to `close_session`
    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().clone()
    }

    pub fn pending_replies(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl AgentTransport for ScriptedTransport {
    async fn start_session(&self) -> Result<String, TransportError> {
        self.sessions
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("scripted-session".to_string()))
    }

    async fn send_message(
        &self,
        session_id: Option<&str>,
        message: &str,
    ) -> Result<AgentReply, TransportError> {
        self.sent.lock().push(ChatRequest {
            session_id: session_id.map(str::to_string),
            message: message.to_string(),
        });

        let next = self.replies.lock().pop_front();
        let Some((latency, outcome)) = next else {
            return Err(TransportError::Unknown("no scripted reply".to_string()));
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        debug!("Scripted reply after {:?}", latency);
        outcome
    }

    async fn close_session(&self, session_id: &str) -> Result<(), TransportError> {
        self.closed.lock().push(session_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order() {
        let transport = ScriptedTransport::new();
        transport
            .push_reply(AgentReply::text("uno"))
            .push_failure(TransportError::server(500));

        let first = transport.send_message(Some("s"), "a").await.unwrap();
        assert_eq!(first.content, "uno");
        let second = transport.send_message(Some("s"), "b").await;
        assert_eq!(second, Err(TransportError::server(500)));
        assert!(transport.send_message(None, "c").await.is_err());

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].session_id.as_deref(), Some("s"));
        assert_eq!(sent[2].session_id, None);
    }

    #[tokio::test]
    async fn test_default_session() {
        let transport = ScriptedTransport::new();
        assert_eq!(
            transport.start_session().await.as_deref(),
            Ok("scripted-session")
        );
    }
}
