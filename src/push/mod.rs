pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::PushGatewayConfig;

use self::models::{
    GatewayApiError, RegisterRequest, RegisterResponse, SendRequest, SendResponse, TokenRequest,
    TokenResponse, TokenResult, CODE_RATE_LIMITED, CODE_TOKEN_INVALID, CODE_TOKEN_UNREGISTERED,
};

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Classified push-transport failure. Policy code branches on the variant,
/// never on transport error text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PushError {
    /// Network trouble, rate limiting, gateway 5xx — worth trying again on
    /// the next natural trigger.
    #[error("transient push failure: {0}")]
    Transient(String),

    /// The registration token is dead; the endpoint must be deactivated and
    /// the client has to re-register.
    #[error("registration token permanently invalid: {0}")]
    PermanentlyInvalid(String),

    /// Anything the gateway reports that fits neither bucket.
    #[error("push transport failure: {0}")]
    Unknown(String),
}

impl PushError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, PushError::PermanentlyInvalid(_))
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        // Anything that never produced a response is worth retrying later.
        PushError::Transient(e.to_string())
    }

    fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                PushError::PermanentlyInvalid(format!("{status}: {body}"))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                PushError::Transient(format!("{status}: {body}"))
            }
            s if s.is_server_error() => PushError::Transient(format!("{status}: {body}")),
            _ => PushError::Unknown(format!("{status}: {body}")),
        }
    }

    fn from_api(e: GatewayApiError) -> Self {
        match e.code {
            CODE_TOKEN_UNREGISTERED | CODE_TOKEN_INVALID => {
                PushError::PermanentlyInvalid(format!("code={}, msg={}", e.code, e.msg))
            }
            CODE_RATE_LIMITED => PushError::Transient(format!("code={}, msg={}", e.code, e.msg)),
            _ => PushError::Unknown(format!("code={}, msg={}", e.code, e.msg)),
        }
    }
}

// ---------------------------------------------------------------------------
// PushTransport
// ---------------------------------------------------------------------------

/// One push notification as handed to the transport.
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Structured payload delivered alongside the notification text.
    pub data: serde_json::Value,
}

/// Abstraction over the external push-notification delivery service.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver `message` to a single registration token. Returns the
    /// gateway-assigned message ID.
    async fn send(&self, token: &str, message: &PushMessage) -> Result<String, PushError>;

    /// Register a token with the gateway so it can receive alerts.
    async fn register(&self, token: &str) -> Result<(), PushError>;

    /// `true` when no real gateway is configured and calls are accepted
    /// without leaving the process.
    fn is_emulated(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// GatewayClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GatewayClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    /// Unix timestamp (seconds) when this token expires
    expires_at: i64,
}

impl GatewayClient {
    pub fn new(config: &PushGatewayConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: Client::new(),
                base_url: config.base_url.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                token: Mutex::new(None),
            }),
        }
    }

    /// Returns a valid access token, refreshing it if necessary.
    async fn access_token(&self) -> Result<String, PushError> {
        let mut guard = self.inner.token.lock().await;
        let now = chrono::Utc::now().timestamp();

        if let Some(ref cached) = *guard {
            // Refresh 60 s before expiry
            if cached.expires_at > now + 60 {
                return Ok(cached.access_token.clone());
            }
        }

        info!("Fetching new push gateway access token");
        let token = self.fetch_token().await?;
        let expires_at = now + token.expire_time;
        let access_token = token.access_token.clone();

        *guard = Some(CachedToken {
            access_token: token.access_token,
            expires_at,
        });

        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<TokenResult, PushError> {
        let url = format!("{}/v1/oauth/token", self.inner.base_url);
        debug!(url = %url, "Requesting push gateway token");

        let body = TokenRequest {
            client_id: &self.inner.client_id,
            client_secret: &self.inner.client_secret,
            grant_type: "client_credentials",
        };

        let resp = self
            .inner
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(PushError::from_reqwest)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(PushError::from_reqwest)?;
        if !status.is_success() {
            // Token-endpoint failures are never about a subscriber token.
            return Err(PushError::Unknown(format!(
                "token endpoint returned {status}: {}",
                String::from_utf8_lossy(&bytes)
            )));
        }

        let envelope = serde_json::from_slice::<TokenResponse>(&bytes)
            .map_err(|e| PushError::Unknown(format!("malformed token response: {e}")))?;
        envelope
            .into_result()
            .map_err(|e| PushError::Unknown(format!("token call failed: code={}, msg={}", e.code, e.msg)))
    }

    async fn post_json<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Vec<u8>, PushError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.inner.base_url, path);

        let resp = self
            .inner
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(PushError::from_reqwest)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(PushError::from_reqwest)?;
        if !status.is_success() {
            return Err(PushError::from_status(status, &String::from_utf8_lossy(&bytes)));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PushTransport for GatewayClient {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<String, PushError> {
        debug!(token_prefix = %token_prefix(token), "Sending push notification");

        let body = SendRequest {
            token,
            notification: models::Notification {
                title: &message.title,
                body: &message.body,
            },
            data: &message.data,
        };

        let bytes = self.post_json("/v1/messages", &body).await?;
        let envelope = serde_json::from_slice::<SendResponse>(&bytes)
            .map_err(|e| PushError::Unknown(format!("malformed send response: {e}")))?;
        let result = envelope.into_result().map_err(PushError::from_api)?;
        Ok(result.message_id)
    }

    async fn register(&self, token: &str) -> Result<(), PushError> {
        debug!(token_prefix = %token_prefix(token), "Registering push token");

        let body = RegisterRequest { token };
        let bytes = self.post_json("/v1/registrations", &body).await?;
        let envelope = serde_json::from_slice::<RegisterResponse>(&bytes)
            .map_err(|e| PushError::Unknown(format!("malformed register response: {e}")))?;
        envelope.into_unit().map_err(PushError::from_api)
    }
}

// ---------------------------------------------------------------------------
// EmulatedTransport
// ---------------------------------------------------------------------------

/// In-process stand-in used when no gateway is configured. Accepts every
/// call so the rest of the pipeline can be exercised end to end.
#[derive(Debug, Default, Clone)]
pub struct EmulatedTransport;

#[async_trait]
impl PushTransport for EmulatedTransport {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<String, PushError> {
        let message_id = format!("emulated-{}", Uuid::new_v4());
        info!(
            token_prefix = %token_prefix(token),
            title = %message.title,
            message_id = %message_id,
            "Emulator mode: push notification accepted"
        );
        Ok(message_id)
    }

    async fn register(&self, token: &str) -> Result<(), PushError> {
        info!(
            token_prefix = %token_prefix(token),
            "Emulator mode: token received (skipping gateway registration)"
        );
        Ok(())
    }

    fn is_emulated(&self) -> bool {
        true
    }
}

/// Tokens are opaque credentials; only a short prefix ever reaches the logs.
fn token_prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(20)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}
