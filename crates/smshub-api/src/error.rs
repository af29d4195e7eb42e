use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Request-level failure taxonomy. Every variant renders as the same JSON
/// envelope shape, so clients never see a bare status line or an HTML
/// error page.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No device credential was supplied at all.
    #[error("missing token")]
    MissingToken,

    /// A credential was supplied but matches no enabled token.
    #[error("invalid token")]
    InvalidToken,

    /// Operator session token absent or failed verification.
    #[error("unauthorized")]
    Unauthorized,

    /// Required ingestion fields resolved empty. Carries what the client
    /// actually sent, to make misbehaving forwarder apps debuggable.
    #[error("missing params")]
    MissingParams {
        got_keys: Vec<String>,
        content_type: String,
    },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// The presented purge nonce did not match the current one.
    #[error("invalid purge token")]
    InvalidPurgeToken,

    /// A normal, expected miss (e.g. no extractable OTP), not a fault.
    #[error("{message}")]
    NotFound { message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "success": false,
                    "error": "missing_token",
                    "message": "token query parameter or Authorization: Bearer required",
                }),
            ),
            ApiError::InvalidToken => (
                StatusCode::FORBIDDEN,
                json!({
                    "success": false,
                    "error": "invalid_token",
                    "message": "token is invalid or disabled",
                }),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "success": false,
                    "error": "unauthorized",
                    "message": "operator login required",
                }),
            ),
            ApiError::MissingParams {
                got_keys,
                content_type,
            } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "success": false,
                    "error": "missing_params",
                    "debug": {
                        "got_keys": got_keys,
                        "content_type": content_type,
                    },
                }),
            ),
            ApiError::BadRequest { message } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "success": false,
                    "error": "bad_request",
                    "message": message,
                }),
            ),
            ApiError::InvalidPurgeToken => (
                StatusCode::FORBIDDEN,
                json!({
                    "success": false,
                    "error": "invalid_purge_token",
                    "message": "purge token did not match; request a fresh one",
                }),
            ),
            ApiError::NotFound { message } => (
                StatusCode::NOT_FOUND,
                json!({
                    "success": false,
                    "error": "not_found",
                    "message": message,
                }),
            ),
            ApiError::Internal(e) => {
                error!("internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "success": false,
                        "error": "server_error",
                        "detail": e.to_string(),
                    }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Run a blocking store closure off the async runtime.
pub async fn run_db<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("background task failed"))
        })?
        .map_err(ApiError::Internal)
}
