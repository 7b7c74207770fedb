//! Chat session composition
//!
//! Wires the conversation controller, the response orchestrator, the
//! session lifecycle and the audio cue together, and hands the front-end
//! a single object to drive and observe the chat.

use crate::api::{AgentTransport, HttpTransport};
use crate::audio::{AudioCueEngine, AudioState, CueFollower};
use crate::conversation::{ChatEvent, ConversationController, ConversationSnapshot, ConversationState};
use crate::integration::config::ChatConfig;
use crate::orchestrator::{CycleOutcome, ResponseOrchestrator};
use crate::session::{FileSessionStore, MemorySessionStore, SessionClient, SessionStore};
use crate::ui::Notification;
use crate::{HoldlineError, Result};
use crossbeam_channel::{bounded, Receiver};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct ChatSession {
    controller: ConversationController,
    orchestrator: ResponseOrchestrator,
    sessions: SessionClient,
    engine: Option<Arc<AudioCueEngine>>,
    follower: Option<CueFollower>,
    root: CancellationToken,
    event_rx: Receiver<ChatEvent>,
    closed: bool,
}

impl ChatSession {
    pub fn builder() -> ChatSessionBuilder {
        ChatSessionBuilder::new()
    }

    /// Create the server-side session and start following the conversation
    /// with the audio cue.
    ///
    /// On failure the session-creation modal is raised and the error
    /// returned; the front-end is expected to leave the chat.
    pub async fn open(&mut self) -> Result<String> {
        let session_id = match self.sessions.open().await {
            Ok(id) => id,
            Err(HoldlineError::SessionCreation(e)) => {
                self.controller.notify(Notification::session_failed(&e));
                return Err(HoldlineError::SessionCreation(e));
            }
            Err(e) => return Err(e),
        };

        if self.follower.is_none() {
            if let Some(engine) = &self.engine {
                let follower =
                    CueFollower::spawn(Arc::clone(engine), self.controller.subscribe(), &self.root);
                self.follower = Some(follower);
            }
        }
        Ok(session_id)
    }

    /// Submit user text; `false` when it was not accepted
    pub fn send(&self, text: &str) -> bool {
        self.send_tracked(text).is_some()
    }

    /// Like `send`, returning the cycle task for callers that need to wait
    pub fn send_tracked(&self, text: &str) -> Option<JoinHandle<CycleOutcome>> {
        if self.closed {
            return None;
        }
        self.orchestrator.send(text)
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.controller.snapshot()
    }

    pub fn state(&self) -> ConversationState {
        self.controller.state()
    }

    pub fn controller(&self) -> &ConversationController {
        &self.controller
    }

    pub fn session_id(&self) -> Option<String> {
        self.sessions.session_id()
    }

    /// Try to receive a front-end event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ChatEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn events(&self) -> &Receiver<ChatEvent> {
        &self.event_rx
    }

    /// Analyser bins of the cue, empty without audio
    pub fn spectrum(&self) -> Vec<u8> {
        self.engine
            .as_ref()
            .map(|engine| engine.spectrum())
            .unwrap_or_default()
    }

    pub fn audio_state(&self) -> Option<AudioState> {
        self.engine.as_ref().map(|engine| engine.audio_state())
    }

    pub fn engine(&self) -> Option<&Arc<AudioCueEngine>> {
        self.engine.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Tear down: cancel pending follow-ups, silence the cue and close the
    /// server-side session
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.orchestrator.shutdown();
        self.root.cancel();
        if let Some(follower) = self.follower.take() {
            follower.shutdown().await;
        }
        if let Some(engine) = &self.engine {
            engine.close();
        }

        let result = self.sessions.close().await;
        self.controller.emit(ChatEvent::Closed);
        info!("Chat session closed");
        result
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if !self.closed {
            self.orchestrator.shutdown();
            self.root.cancel();
        }
    }
}

/// Builder for `ChatSession`
pub struct ChatSessionBuilder {
    config: ChatConfig,
    transport: Option<Arc<dyn AgentTransport>>,
    store: Option<Arc<dyn SessionStore>>,
    engine: Option<Arc<AudioCueEngine>>,
}

impl ChatSessionBuilder {
    pub fn new() -> Self {
        Self {
            config: ChatConfig::default(),
            transport: None,
            store: None,
            engine: None,
        }
    }

    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom transport instead of HTTP
    pub fn with_transport(mut self, transport: Arc<dyn AgentTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach an audio cue engine; without one the chat is text-only
    pub fn with_engine(mut self, engine: Arc<AudioCueEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn build(self) -> Result<ChatSession> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(
                self.config.api_url.clone(),
                self.config.request_timeout(),
            )?),
        };
        let store = self.store.unwrap_or_else(|| default_store(&self.config));

        let (event_tx, event_rx) = bounded(self.config.event_buffer_size);
        let controller = ConversationController::new()
            .with_greeting(self.config.greeting.iter().cloned())
            .with_events(event_tx);
        let orchestrator = ResponseOrchestrator::new(
            controller.clone(),
            Arc::clone(&transport),
            Arc::clone(&store),
            self.config.timeline.clone(),
        );
        let engine = if self.config.enable_audio {
            self.engine
        } else {
            None
        };

        Ok(ChatSession {
            controller,
            orchestrator,
            sessions: SessionClient::new(transport, store),
            engine,
            follower: None,
            root: CancellationToken::new(),
            event_rx,
            closed: false,
        })
    }
}

impl Default for ChatSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_store(config: &ChatConfig) -> Arc<dyn SessionStore> {
    match config
        .session_file
        .clone()
        .or_else(FileSessionStore::default_path)
    {
        Some(path) => Arc::new(FileSessionStore::new(path)),
        None => {
            warn!("No data directory, keeping the session id in memory");
            Arc::new(MemorySessionStore::new())
        }
    }
}
