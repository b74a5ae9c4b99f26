//! Push notification forwarding.
//!
//! The back office exposes one endpoint that takes `{token, title, body,
//! data}` and relays it to the messaging provider as
//! `{"message": {"token", "notification": {"title", "body"}, "data"}}` with a
//! bearer server key.

use std::collections::BTreeMap;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument};
use url::Url;

/// Longest accepted device token.
const MAX_TOKEN_LEN: usize = 4096;
/// Longest accepted title.
const MAX_TITLE_LEN: usize = 200;
/// Longest accepted body.
const MAX_BODY_LEN: usize = 4000;

/// Errors that can occur when forwarding a notification.
#[derive(Debug, Error)]
pub enum PushError {
    /// The notification payload is invalid.
    #[error("invalid notification: {0}")]
    Invalid(&'static str),

    /// HTTP request failed.
    #[error("push request failed: {0}")]
    Request(String),

    /// The provider refused the message.
    #[error("push provider rejected the message with status {status}")]
    Rejected { status: u16, body: String },
}

/// A notification to deliver to one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    /// Provider device registration token.
    pub token: String,
    pub title: String,
    pub body: String,
    /// Extra key-value data delivered to the app.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl PushNotification {
    /// Check the payload before it leaves the server.
    ///
    /// # Errors
    ///
    /// Returns `PushError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), PushError> {
        if self.token.trim().is_empty() || self.token.len() > MAX_TOKEN_LEN {
            return Err(PushError::Invalid("token"));
        }
        if self.title.trim().is_empty() || self.title.len() > MAX_TITLE_LEN {
            return Err(PushError::Invalid("title"));
        }
        if self.body.len() > MAX_BODY_LEN {
            return Err(PushError::Invalid("body"));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ProviderEnvelope<'a> {
    message: ProviderMessage<'a>,
}

#[derive(Serialize)]
struct ProviderMessage<'a> {
    token: &'a str,
    notification: ProviderNotification<'a>,
    data: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct ProviderNotification<'a> {
    title: &'a str,
    body: &'a str,
}

/// Client for the messaging provider's send endpoint.
#[derive(Clone)]
pub struct PushClient {
    client: Client,
    endpoint: Url,
    server_key: SecretString,
}

impl std::fmt::Debug for PushClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("server_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl PushClient {
    /// Create a new push client.
    #[must_use]
    pub fn new(endpoint: Url, server_key: SecretString) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            server_key,
        }
    }

    /// Validate and forward a notification.
    ///
    /// # Errors
    ///
    /// Returns `PushError::Invalid` for a bad payload (nothing is sent),
    /// `PushError::Request` if the provider is unreachable, and
    /// `PushError::Rejected` if it answers with a non-success status.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn send(&self, notification: &PushNotification) -> Result<(), PushError> {
        notification.validate()?;

        let envelope = ProviderEnvelope {
            message: ProviderMessage {
                token: &notification.token,
                notification: ProviderNotification {
                    title: &notification.title,
                    body: &notification.body,
                },
                data: &notification.data,
            },
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.server_key.expose_secret())
            .json(&envelope)
            .send()
            .await
            .map_err(|e| PushError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Push provider rejected message");
            return Err(PushError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Push notification forwarded");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value as JsonValue, json};

    use super::*;

    type Captured = Arc<Mutex<Option<(Option<String>, JsonValue)>>>;

    async fn provider(status: StatusCode) -> (Url, Captured) {
        let captured: Captured = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&captured);
        let app = Router::new().route(
            "/send",
            post(move |headers: HeaderMap, Json(body): Json<JsonValue>| {
                let sink = Arc::clone(&sink);
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    *sink.lock().unwrap() = Some((auth, body));
                    status
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (Url::parse(&format!("http://{addr}/send")).unwrap(), captured)
    }

    fn notification() -> PushNotification {
        PushNotification {
            token: "device-token-1".to_owned(),
            title: "Invoice paid".to_owned(),
            body: "Invoice #12 was paid in full.".to_owned(),
            data: BTreeMap::from([("invoice".to_owned(), "12".to_owned())]),
        }
    }

    #[tokio::test]
    async fn test_forwards_provider_envelope() {
        let (url, captured) = provider(StatusCode::OK).await;
        let client = PushClient::new(url, SecretString::from("server-key-abc"));

        client.send(&notification()).await.unwrap();

        let (auth, body) = captured.lock().unwrap().take().unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer server-key-abc"));
        assert_eq!(
            body,
            json!({
                "message": {
                    "token": "device-token-1",
                    "notification": {"title": "Invoice paid", "body": "Invoice #12 was paid in full."},
                    "data": {"invoice": "12"},
                }
            })
        );
    }

    #[tokio::test]
    async fn test_provider_rejection() {
        let (url, _captured) = provider(StatusCode::BAD_REQUEST).await;
        let client = PushClient::new(url, SecretString::from("server-key-abc"));

        assert!(matches!(
            client.send(&notification()).await,
            Err(PushError::Rejected { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_payload_is_not_sent() {
        let (url, captured) = provider(StatusCode::OK).await;
        let client = PushClient::new(url, SecretString::from("server-key-abc"));
        let mut bad = notification();
        bad.token = "  ".to_owned();

        assert!(matches!(
            client.send(&bad).await,
            Err(PushError::Invalid("token"))
        ));
        assert!(captured.lock().unwrap().is_none());
    }
}
