use axum::{Extension, Json};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use rand::RngCore;
use serde_json::{Value, json};

use smshub_types::api::{Claims, CreateTokenRequest, ResetTokenRequest, TokenInfo};

use crate::auth::AppState;
use crate::error::{ApiError, run_db};

/// Random hex secret of `len` characters, clamped to 16..=96.
pub fn generate_secret(len: usize) -> String {
    let len = len.clamp(16, 96);
    let mut buf = vec![0u8; len.div_ceil(2)];
    rand::rng().fill_bytes(&mut buf);
    let mut secret = hex::encode(buf);
    secret.truncate(len);
    secret
}

/// GET /api/tokens — every credential, newest first.
pub async fn list(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<Vec<TokenInfo>>, ApiError> {
    let db_state = state.clone();
    let rows = run_db(move || db_state.db.list_tokens()).await?;

    let tokens = rows
        .into_iter()
        .map(|row| TokenInfo {
            id: row.id,
            name: row.name,
            token: row.token,
            enabled: row.enabled,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        })
        .collect();

    Ok(Json(tokens))
}

/// POST /api/tokens — create a credential with a supplied or generated
/// secret. The secret is echoed back once, on creation.
pub async fn create(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<CreateTokenRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest {
            message: "name is required".into(),
        });
    }

    let secret = pick_secret(req.token.as_deref(), req.length);

    let db_state = state.clone();
    let stored = secret.clone();
    let id = run_db(move || db_state.db.create_token(&name, &stored)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "id": id, "token": secret })),
    ))
}

/// POST /api/tokens/{id}/toggle — flip enabled/disabled.
pub async fn toggle(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let db_state = state.clone();
    let changed = run_db(move || db_state.db.toggle_token(id)).await?;
    if !changed {
        return Err(token_not_found(id));
    }
    Ok(Json(json!({ "success": true })))
}

/// POST /api/tokens/{id}/reset — rotate the secret; the old value stops
/// validating immediately and created_at restarts.
pub async fn reset(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<ResetTokenRequest>,
) -> Result<Json<Value>, ApiError> {
    let secret = pick_secret(req.token.as_deref(), req.length);

    let db_state = state.clone();
    let stored = secret.clone();
    let changed = run_db(move || db_state.db.reset_token(id, &stored)).await?;
    if !changed {
        return Err(token_not_found(id));
    }
    Ok(Json(json!({ "success": true, "token": secret })))
}

/// DELETE /api/tokens/{id}
pub async fn remove(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let db_state = state.clone();
    let changed = run_db(move || db_state.db.delete_token(id)).await?;
    if !changed {
        return Err(token_not_found(id));
    }
    Ok(Json(json!({ "success": true })))
}

fn pick_secret(custom: Option<&str>, length: Option<usize>) -> String {
    match custom.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => token.to_string(),
        None => generate_secret(length.unwrap_or(48)),
    }
}

fn token_not_found(id: i64) -> ApiError {
    ApiError::NotFound {
        message: format!("no token with id {}", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_honor_requested_length() {
        assert_eq!(generate_secret(48).len(), 48);
        assert_eq!(generate_secret(17).len(), 17);
    }

    #[test]
    fn generated_length_is_clamped() {
        assert_eq!(generate_secret(1).len(), 16);
        assert_eq!(generate_secret(10_000).len(), 96);
    }

    #[test]
    fn generated_secrets_are_lowercase_hex() {
        let secret = generate_secret(64);
        assert!(secret.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn consecutive_secrets_differ() {
        assert_ne!(generate_secret(48), generate_secret(48));
    }

    #[test]
    fn custom_secret_wins_over_length() {
        assert_eq!(pick_secret(Some("my-token"), Some(48)), "my-token");
        assert_eq!(pick_secret(Some("  "), Some(20)).len(), 20);
        assert_eq!(pick_secret(None, None).len(), 48);
    }
}
