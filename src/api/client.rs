//! Authenticated HTTP client for the history endpoint
//!
//! Wraps reqwest::Client with bearer token injection.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use url::Url;

use super::history::{parse_history, HistoryError, HistoryService};
use crate::auth::Credential;
use crate::models::{ConversationId, Message};

/// Upper bound on one history request, connect to last body byte.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for `GET /chat/{senderId}/{senderRole}/{receiverId}/{receiverRole}`.
pub struct HistoryClient {
    http: reqwest::Client,
    base: Url,
    credential: Credential,
}

impl HistoryClient {
    pub fn new(endpoint: &str, credential: Credential) -> anyhow::Result<Self> {
        Self::with_timeout(endpoint, credential, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: &str,
        credential: Credential,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let base = Url::parse(endpoint)
            .map_err(|e| anyhow::anyhow!("Invalid endpoint {:?}: {}", endpoint, e))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("Endpoint {:?} cannot be used as a base URL", endpoint);
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base,
            credential,
        })
    }

    /// History URL for a conversation, with each identity segment percent-encoded.
    pub fn history_url(&self, conversation: &ConversationId) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "chat",
                conversation.sender.id.as_str(),
                conversation.sender.role.as_str(),
                conversation.receiver.id.as_str(),
                conversation.receiver.role.as_str(),
            ]);
        }
        url
    }
}

#[async_trait]
impl HistoryService for HistoryClient {
    async fn fetch(&self, conversation: &ConversationId) -> Result<Vec<Message>, HistoryError> {
        let url = self.history_url(conversation);
        tracing::debug!("History GET {}", url);

        let resp = self
            .http
            .get(url.clone())
            .bearer_auth(self.credential.bearer())
            .send()
            .await
            .map_err(|source| HistoryError::Transport {
                url: url.to_string(),
                source,
            })?;

        let resp = check_response(resp, url.as_str()).await?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| HistoryError::Malformed(e.to_string()))?;

        parse_history(body)
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(
    resp: reqwest::Response,
    url: &str,
) -> Result<reqwest::Response, HistoryError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(HistoryError::Unauthorized(url.to_string()));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(HistoryError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Participant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn conversation(sender_id: &str) -> ConversationId {
        ConversationId {
            sender: Participant::new(sender_id, "student"),
            receiver: Participant::new("u2", "teacher"),
        }
    }

    /// Serve exactly one HTTP response and hand back the raw request text.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let resp = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            let _ = sock.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_history_url_encodes_segments() {
        let client = HistoryClient::new(
            "https://chat.example.org/api/",
            Credential::new("tok").unwrap(),
        )
        .unwrap();
        let url = client.history_url(&conversation("a b/c"));
        assert_eq!(
            url.as_str(),
            "https://chat.example.org/api/chat/a%20b%2Fc/student/u2/teacher"
        );
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(HistoryClient::new("not a url", Credential::new("tok").unwrap()).is_err());
        assert!(HistoryClient::new("mailto:x@y", Credential::new("tok").unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_and_parses_array() {
        let body = r#"[{"senderId":"u1","senderRole":"student","receiverId":"u2","receiverRole":"teacher","content":"hi","timestamp":"2024-03-01T12:00:00.000Z"}]"#;
        let (base, server) = serve_once("200 OK", body).await;
        let client = HistoryClient::new(&base, Credential::new("tok123").unwrap()).unwrap();

        let msgs = client.fetch(&conversation("u1")).await.unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content, "hi");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /chat/u1/student/u2/teacher HTTP/1.1"));
        assert!(request
            .to_lowercase()
            .contains("authorization: bearer tok123"));
    }

    #[tokio::test]
    async fn test_fetch_unauthorized() {
        let (base, server) = serve_once("401 Unauthorized", r#"{"error":"bad token"}"#).await;
        let client = HistoryClient::new(&base, Credential::new("tok").unwrap()).unwrap();

        let err = client.fetch(&conversation("u1")).await.unwrap_err();
        assert!(matches!(err, HistoryError::Unauthorized(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_server_error_keeps_body() {
        let (base, server) = serve_once("500 Internal Server Error", r#""boom""#).await;
        let client = HistoryClient::new(&base, Credential::new("tok").unwrap()).unwrap();

        match client.fetch(&conversation("u1")).await {
            Err(HistoryError::Status { status, body, .. }) => {
                assert_eq!(status, 500);
                assert_eq!(body, r#""boom""#);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_non_array_is_malformed() {
        let (base, server) = serve_once("200 OK", r#"{"message":"no chats"}"#).await;
        let client = HistoryClient::new(&base, Credential::new("tok").unwrap()).unwrap();

        let err = client.fetch(&conversation("u1")).await.unwrap_err();
        assert!(matches!(err, HistoryError::Malformed(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            HistoryClient::new(&format!("http://{}", addr), Credential::new("tok").unwrap())
                .unwrap();
        let err = client.fetch(&conversation("u1")).await.unwrap_err();
        assert!(matches!(err, HistoryError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_fetch_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(sock);
        });

        let client = HistoryClient::with_timeout(
            &format!("http://{}", addr),
            Credential::new("tok").unwrap(),
            Duration::from_millis(200),
        )
        .unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), client.fetch(&conversation("u1")))
            .await
            .expect("request should give up on its own");
        match result {
            Err(HistoryError::Transport { source, .. }) => assert!(source.is_timeout()),
            other => panic!("unexpected result: {:?}", other),
        }
        server.abort();
    }
}
