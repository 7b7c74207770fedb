//! Agent backend interface
//!
//! The automated agent is an opaque HTTP responder. This module defines the
//! wire types, the transport seam used by the orchestrator and the session
//! client, and the `reqwest` implementation.

pub mod http;
pub mod scripted;
pub mod transport;
pub mod types;

pub use http::{Endpoints, HttpTransport};
pub use scripted::ScriptedTransport;
pub use transport::{AgentTransport, TransportError};
pub use types::{AgentReply, ChatRequest, StartSessionResponse};
