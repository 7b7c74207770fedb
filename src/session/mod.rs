//! Chat session lifecycle

pub mod store;

pub use store::{FileSessionStore, MemorySessionStore, SessionStore, SESSION_KEY};

use crate::api::AgentTransport;
use crate::{HoldlineError, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Opens and closes the server-side session, keeping the store in sync
#[derive(Clone)]
pub struct SessionClient {
    transport: Arc<dyn AgentTransport>,
    store: Arc<dyn SessionStore>,
}

impl SessionClient {
    pub fn new(transport: Arc<dyn AgentTransport>, store: Arc<dyn SessionStore>) -> Self {
        Self { transport, store }
    }

    /// Create a session and persist its id.
    ///
    /// On failure the stored id is cleared so a stale one is never reused.
    pub async fn open(&self) -> Result<String> {
        match self.transport.start_session().await {
            Ok(session_id) => {
                self.store.set(&session_id)?;
                info!("Chat session {} opened", session_id);
                Ok(session_id)
            }
            Err(e) => {
                error!("Failed to create chat session: {}", e);
                if let Err(clear_err) = self.store.clear() {
                    warn!("Could not clear stored session id: {}", clear_err);
                }
                Err(HoldlineError::SessionCreation(e))
            }
        }
    }

    /// Close the stored session, if any. The local id is cleared even when
    /// the server call fails.
    pub async fn close(&self) -> Result<()> {
        let Some(session_id) = self.store.get() else {
            return Ok(());
        };

        if let Err(e) = self.transport.close_session(&session_id).await {
            warn!("Failed to close session {}: {}", session_id, e);
        } else {
            info!("Chat session {} closed", session_id);
        }
        self.store.clear()
    }

    pub fn session_id(&self) -> Option<String> {
        self.store.get()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ScriptedTransport, TransportError};

    fn client(transport: Arc<ScriptedTransport>) -> (SessionClient, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        (SessionClient::new(transport, store.clone()), store)
    }

    #[tokio::test]
    async fn test_open_persists_id() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_session(Ok("abc".to_string()));
        let (client, store) = client(transport);

        assert_eq!(client.open().await.unwrap(), "abc");
        assert_eq!(store.get().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_open_failure_clears_id() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_session(Err(TransportError::NoResponse("refused".into())));
        let (client, store) = client(transport);
        store.set("stale").unwrap();

        let err = client.open().await.unwrap_err();
        assert!(matches!(err, HoldlineError::SessionCreation(_)));
        assert!(!err.is_recoverable());
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn test_close_calls_server_and_clears() {
        let transport = Arc::new(ScriptedTransport::new());
        let (client, store) = client(transport.clone());
        client.open().await.unwrap();

        client.close().await.unwrap();
        assert_eq!(transport.closed(), vec!["scripted-session".to_string()]);
        assert!(store.get().is_none());

        // Nothing stored, nothing to close
        client.close().await.unwrap();
        assert_eq!(transport.closed().len(), 1);
    }
}
