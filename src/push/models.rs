use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Generic response envelope
//
// Every push-gateway API wraps its payload in the same outer object:
//
// Success:
//   { "success": true, "result": <T> }
//
// Failure:
//   { "success": false, "code": 2001, "msg": "token is not registered" }
//
// `result` is absent on failure; `code` and `msg` are absent on success.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GatewayResponse<T> {
    /// `true` on success, `false` on API-level failure.
    pub success: bool,

    /// Present on success.
    pub result: Option<T>,

    /// Gateway error code — present on failure.
    pub code: Option<i32>,

    /// Human-readable error message — present on failure.
    pub msg: Option<String>,
}

/// API-level failure reported inside a 2xx envelope.
#[derive(Debug)]
pub struct GatewayApiError {
    pub code: i32,
    pub msg: String,
}

impl<T> GatewayResponse<T> {
    /// Convert into a result, mapping API-level failures to `GatewayApiError`.
    pub fn into_result(self) -> Result<T, GatewayApiError> {
        if self.success {
            self.result.ok_or(GatewayApiError {
                code: -1,
                msg: "gateway response: success=true but result field is missing".to_owned(),
            })
        } else {
            Err(GatewayApiError {
                code: self.code.unwrap_or(-1),
                msg: self.msg.unwrap_or_else(|| "(no message)".to_owned()),
            })
        }
    }

    /// Like `into_result` but for endpoints whose success payload is empty.
    pub fn into_unit(self) -> Result<(), GatewayApiError> {
        if self.success {
            Ok(())
        } else {
            Err(GatewayApiError {
                code: self.code.unwrap_or(-1),
                msg: self.msg.unwrap_or_else(|| "(no message)".to_owned()),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway error codes
//
// The gateway distinguishes permanently dead registration tokens from
// everything else; those two codes are the only ones policy code depends on.
// ---------------------------------------------------------------------------

/// Registration token was never registered or has been evicted.
pub const CODE_TOKEN_UNREGISTERED: i32 = 2001;
/// Registration token is malformed or revoked.
pub const CODE_TOKEN_INVALID: i32 = 2002;
/// Caller exceeded the gateway rate limit.
pub const CODE_RATE_LIMITED: i32 = 1011;

// ---------------------------------------------------------------------------
// Token  —  POST /v1/oauth/token
// ---------------------------------------------------------------------------

/// Full response type: `GatewayResponse<TokenResult>`.
pub type TokenResponse = GatewayResponse<TokenResult>;

#[derive(Debug, Serialize)]
pub struct TokenRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub grant_type: &'a str,
}

/// Payload inside a successful token response.
#[derive(Debug, Deserialize)]
pub struct TokenResult {
    /// Short-lived bearer token used in subsequent API calls.
    pub access_token: String,

    /// Validity period in **seconds** (typically 7200).
    pub expire_time: i64,
}

// ---------------------------------------------------------------------------
// Send  —  POST /v1/messages
// ---------------------------------------------------------------------------

/// Full response type: `GatewayResponse<SendResult>`.
pub type SendResponse = GatewayResponse<SendResult>;

#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    /// Target registration token.
    pub token: &'a str,
    pub notification: Notification<'a>,
    /// Structured key/value payload delivered alongside the notification.
    #[serde(skip_serializing_if = "data_is_null")]
    pub data: &'a serde_json::Value,
}

fn data_is_null(data: &&serde_json::Value) -> bool {
    data.is_null()
}

#[derive(Debug, Serialize)]
pub struct Notification<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

/// Payload inside a successful send response.
#[derive(Debug, Deserialize)]
pub struct SendResult {
    /// Gateway-assigned delivery ID.
    pub message_id: String,
}

// ---------------------------------------------------------------------------
// Register  —  POST /v1/registrations
// ---------------------------------------------------------------------------

/// Full response type: `GatewayResponse<serde_json::Value>` — the success
/// payload carries nothing the service needs.
pub type RegisterResponse = GatewayResponse<serde_json::Value>;

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub token: &'a str,
}
