use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::warn;
use uuid::Uuid;

use smshub_db::Database;
use smshub_types::api::{Claims, LoginRequest, LoginResponse};

use crate::error::{ApiError, run_db};
use crate::tokens::generate_secret;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub purge_nonces: PurgeNonces,
}

/// Server-side single-use nonces guarding the destructive purge, one per
/// operator. Checked by exact match and rotated after every attempt,
/// match or not, so a captured value cannot be replayed.
#[derive(Default)]
pub struct PurgeNonces {
    inner: Mutex<HashMap<Uuid, String>>,
}

impl PurgeNonces {
    /// Current nonce for the operator, minting one on first use.
    pub fn issue(&self, operator: Uuid) -> Result<String> {
        let mut map = self
            .inner
            .lock()
            .map_err(|e| anyhow::anyhow!("nonce lock poisoned: {}", e))?;
        let nonce = map
            .entry(operator)
            .or_insert_with(|| generate_secret(32));
        Ok(nonce.clone())
    }

    /// Validate a presented nonce. The stored value is replaced before
    /// the verdict is returned, whatever that verdict is.
    pub fn consume(&self, operator: Uuid, presented: &str) -> Result<bool> {
        let mut map = self
            .inner
            .lock()
            .map_err(|e| anyhow::anyhow!("nonce lock poisoned: {}", e))?;
        let current = map.insert(operator, generate_secret(32));
        Ok(current.as_deref() == Some(presented))
    }
}

// -- Operator login --

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let db_state = state.clone();
    let username = req.username.clone();
    let operator = run_db(move || db_state.db.get_operator_by_username(&username))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&operator.password)
        .map_err(|e| anyhow::anyhow!("stored password hash unreadable: {}", e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let operator_id: Uuid = operator
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt operator id '{}': {}", operator.id, e))?;

    let token = create_session_token(&state.jwt_secret, operator_id, &operator.username)?;

    Ok(Json(LoginResponse {
        operator_id,
        username: operator.username,
        token,
    }))
}

fn create_session_token(secret: &str, operator_id: Uuid, username: &str) -> Result<String> {
    let claims = Claims {
        sub: operator_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Create the first operator account when none exist yet. Returns true
/// when an account was created.
pub fn bootstrap_operator(db: &Database, username: &str, password: &str) -> Result<bool> {
    if db.count_operators()? > 0 {
        return Ok(false);
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    db.create_operator(&Uuid::new_v4().to_string(), username, &hash)?;
    Ok(true)
}

// -- Device credentials --

/// Validate a device credential. The endpoint-specific extraction
/// (query vs body vs Bearer header) happens at the call site; `None`
/// means the caller supplied nothing at all.
pub async fn validate_sms_token(
    state: &AppState,
    candidate: Option<String>,
) -> Result<i64, ApiError> {
    let candidate = candidate
        .filter(|c| !c.is_empty())
        .ok_or(ApiError::MissingToken)?;

    let db_state = state.clone();
    run_db(move || db_state.db.find_enabled_token(&candidate))
        .await?
        .ok_or(ApiError::InvalidToken)
}

/// Best-effort last-used stamp, detached from the request so a failure
/// can never fail or roll back the caller's primary operation.
pub fn touch_token(state: &AppState, token_id: i64) {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = state.db.touch_token(token_id) {
            warn!("failed to update last_used_at for token {}: {}", token_id, e);
        }
    });
}
