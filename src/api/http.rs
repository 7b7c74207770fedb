//! `reqwest` implementation of the agent transport

use super::transport::{AgentTransport, TransportError};
use super::types::{AgentReply, ChatRequest, ErrorBody, StartSessionResponse};
use crate::{HoldlineError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Backend routes, relative to the API base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub start_session: String,
    pub chat: String,
    pub close_session: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            start_session: "/api/start_chat".to_string(),
            chat: "/api/chat".to_string(),
            close_session: "/api/close_chat".to_string(),
        }
    }
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
    endpoints: Endpoints,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HoldlineError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Agent backend at {}", base_url);

        Ok(Self {
            client,
            base_url,
            endpoints: Endpoints::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn close_url(&self, session_id: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            self.endpoints.close_session.trim_end_matches('/'),
            session_id
        )
    }
}

/// Map a `reqwest` failure onto the transport taxonomy
fn classify(error: reqwest::Error) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::server(status.as_u16());
    }
    if error.is_timeout() || error.is_connect() || error.is_request() {
        return TransportError::NoResponse(error.to_string());
    }
    TransportError::Unknown(error.to_string())
}

/// Turn a non-success response into `TransportError::Server`, reading the
/// FastAPI error body with `pick` when there is one
async fn check_status(
    response: Response,
    pick: fn(&ErrorBody) -> Option<String>,
) -> std::result::Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| pick(&b));

    warn!("Backend answered {}: {:?}", status, detail);
    Err(TransportError::Server {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl AgentTransport for HttpTransport {
    async fn start_session(&self) -> std::result::Result<String, TransportError> {
        let response = self
            .client
            .get(self.url(&self.endpoints.start_session))
            .send()
            .await
            .map_err(classify)?;

        let body: StartSessionResponse = check_status(response, ErrorBody::session_text)
            .await?
            .json()
            .await
            .map_err(classify)?;

        match body.session_id {
            Some(id) if !id.is_empty() => {
                debug!("Session created: {}", id);
                Ok(id)
            }
            _ => Err(TransportError::Unknown("Session ID non ricevuto".to_string())),
        }
    }

    async fn send_message(
        &self,
        session_id: Option<&str>,
        message: &str,
    ) -> std::result::Result<AgentReply, TransportError> {
        let request = ChatRequest {
            session_id: session_id.map(str::to_string),
            message: message.to_string(),
        };

        let response = self
            .client
            .post(self.url(&self.endpoints.chat))
            .json(&request)
            .send()
            .await
            .map_err(classify)?;

        let reply: AgentReply = check_status(response, ErrorBody::reply_text)
            .await?
            .json()
            .await
            .map_err(classify)?;

        debug!(
            "Reply received (waiting={}, transfer={}, {} chars)",
            reply.waiting,
            reply.transfer,
            reply.content.len()
        );
        Ok(reply)
    }

    async fn close_session(&self, session_id: &str) -> std::result::Result<(), TransportError> {
        let response = self
            .client
            .delete(self.close_url(session_id))
            .send()
            .await
            .map_err(classify)?;

        check_status(response, ErrorBody::session_text).await?;
        info!("Session {} closed", session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Answer one request with a canned response; the handle yields the
    /// request head
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let head = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            head
        });
        (base_url, handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before request head");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let length = head
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < head_end + length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn transport(base_url: &str) -> HttpTransport {
        HttpTransport::new(base_url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_urls() {
        let transport =
            HttpTransport::new("http://localhost:8000/", Duration::from_secs(30)).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8000");
        assert_eq!(
            transport.url(&transport.endpoints.chat),
            "http://localhost:8000/api/chat"
        );
        assert_eq!(
            transport.close_url("abc"),
            "http://localhost:8000/api/close_chat/abc"
        );
    }

    #[test]
    fn test_custom_endpoints() {
        let transport = HttpTransport::new("http://api", Duration::from_secs(1))
            .unwrap()
            .with_endpoints(Endpoints {
                start_session: "/startSession".into(),
                chat: "/sendMessage".into(),
                close_session: "/closeSession/".into(),
            });
        assert_eq!(transport.close_url("s1"), "http://api/closeSession/s1");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_no_response() {
        // Port 9 (discard) is closed on test machines
        let transport =
            HttpTransport::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = transport.send_message(None, "ciao").await.unwrap_err();
        assert!(matches!(err, TransportError::NoResponse(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_reply_parsed() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"role":"assistant","content":"","waiting":true,"transfer":false}"#,
        )
        .await;
        let reply = transport(&url).send_message(Some("s1"), "ciao").await.unwrap();
        assert!(reply.waiting);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/chat "));
        assert!(request.contains(r#""session_id":"s1""#));
    }

    #[tokio::test]
    async fn test_429_becomes_rate_limit() {
        let (url, _server) =
            serve_once("429 Too Many Requests", r#"{"detail":"Too many requests"}"#).await;
        let err = transport(&url).send_message(None, "ciao").await.unwrap_err();
        assert_eq!(err, TransportError::server_with_detail(429, "Too many requests"));
        assert!(matches!(
            HoldlineError::from_send_failure(err),
            HoldlineError::RateLimited
        ));
    }

    #[tokio::test]
    async fn test_send_error_prefers_detail() {
        let (url, _server) = serve_once(
            "500 Internal Server Error",
            r#"{"detail":"Errore temporaneo del server. Riprova tra poco.","message":"boom"}"#,
        )
        .await;
        let err = transport(&url).send_message(None, "ciao").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(
            err.inline_detail(),
            "Errore temporaneo del server. Riprova tra poco."
        );
    }

    #[tokio::test]
    async fn test_session_error_prefers_message() {
        let (url, _server) = serve_once(
            "503 Service Unavailable",
            r#"{"detail":"upstream","message":"Servizio non disponibile"}"#,
        )
        .await;
        let err = transport(&url).start_session().await.unwrap_err();
        assert_eq!(err.session_detail(), "Servizio non disponibile");
    }

    #[tokio::test]
    async fn test_error_without_body_uses_status() {
        let (url, _server) = serve_once("502 Bad Gateway", "").await;
        let err = transport(&url).send_message(None, "ciao").await.unwrap_err();
        assert_eq!(err, TransportError::server(502));
        assert_eq!(err.inline_detail(), "Errore del server (502)");
    }

    #[tokio::test]
    async fn test_missing_session_id() {
        let (url, server) = serve_once("200 OK", r#"{"session_id":null}"#).await;
        let err = transport(&url).start_session().await.unwrap_err();
        assert_eq!(err, TransportError::Unknown("Session ID non ricevuto".into()));
        assert!(server.await.unwrap().starts_with("GET /api/start_chat "));
    }

    #[tokio::test]
    async fn test_session_created() {
        let (url, _server) = serve_once("200 OK", r#"{"session_id":"abc-123"}"#).await;
        let id = transport(&url).start_session().await.unwrap();
        assert_eq!(id, "abc-123");
    }

    #[tokio::test]
    async fn test_non_json_reply_is_unknown() {
        let (url, _server) = serve_once("200 OK", "<html>ok</html>").await;
        let err = transport(&url).send_message(None, "ciao").await.unwrap_err();
        assert!(matches!(err, TransportError::Unknown(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_close_hits_session_path() {
        let (url, server) = serve_once("200 OK", "{}").await;
        transport(&url).close_session("abc").await.unwrap();
        assert!(server.await.unwrap().starts_with("DELETE /api/close_chat/abc "));
    }
}
