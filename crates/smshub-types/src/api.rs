use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// Operator session claims shared between the login handler and the
/// `require_auth` middleware. Canonical definition lives here in
/// smshub-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Operator auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub operator_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- OTP query --

/// The latest message that contained an extractable verification code.
/// `content` is the original message body, unmodified; `time` is the
/// display-normalized receive timestamp.
#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub phone: String,
    pub code: String,
    pub content: String,
    pub time: String,
}

// -- Listing --

#[derive(Debug, Serialize)]
pub struct MessageItem {
    pub phone: String,
    pub content: String,
    pub received_at: String,
    pub device: String,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub total: i64,
    pub page: i64,
    pub pages: i64,
    pub per_page: i64,
    pub sort: &'static str,
    pub dir: String,
    pub messages: Vec<MessageItem>,
    /// Distinct device tags seen in the store, for filter dropdowns.
    pub devices: Vec<String>,
}

// -- Purge --

#[derive(Debug, Serialize)]
pub struct PurgeTokenResponse {
    pub purge_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurgeRequest {
    pub purge_token: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub success: bool,
    pub removed: usize,
}

// -- Token administration --

#[derive(Debug, Serialize)]
pub struct TokenInfo {
    pub id: i64,
    pub name: String,
    pub token: String,
    pub enabled: bool,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTokenRequest {
    pub name: String,
    /// Length of the generated secret; clamped to 16..=96, default 48.
    pub length: Option<usize>,
    /// Operator-supplied secret; when set, `length` is ignored.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ResetTokenRequest {
    pub length: Option<usize>,
    pub token: Option<String>,
}
