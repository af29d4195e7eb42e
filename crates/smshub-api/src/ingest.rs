use std::collections::HashMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header::CONTENT_TYPE};
use chrono::NaiveDateTime;
use serde_json::{Value, json};
use tracing::debug;

use smshub_extract::fields::{self, Payload};
use smshub_extract::time::{format_timestamp, normalize_time};

use crate::auth::{AppState, touch_token, validate_sms_token};
use crate::error::{ApiError, run_db};

/// POST /api/sms — normalize a forwarded message and store it.
///
/// The body may be a JSON object or form fields; the device credential
/// comes from the `token` query parameter first, then the parsed body.
pub async fn receive_sms(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let payload = parse_payload(&content_type, &body);

    let candidate = query
        .get("token")
        .filter(|t| !t.is_empty())
        .cloned()
        .or_else(|| payload.get("token"));
    let token_id = validate_sms_token(&state, candidate).await?;

    let record = normalize(&payload, &content_type, chrono::Utc::now().naive_utc())?;

    let db_state = state.clone();
    let row = record.clone();
    run_db(move || {
        db_state
            .db
            .insert_message(&row.phone, &row.content, &row.received_at, &row.device)
    })
    .await?;

    touch_token(&state, token_id);

    Ok(Json(json!({ "success": true })))
}

/// Decode the request body by Content-Type. JSON is authoritative; a
/// body that claims JSON but fails to parse resolves no fields, and the
/// missing-params debug output will say so.
fn parse_payload(content_type: &str, body: &[u8]) -> Payload {
    if content_type.to_ascii_lowercase().contains("application/json") {
        if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
            return Payload::Json(map);
        }
        return Payload::Json(serde_json::Map::new());
    }

    let pairs = serde_urlencoded::from_bytes::<Vec<(String, String)>>(body).unwrap_or_default();
    Payload::Form(pairs)
}

#[derive(Debug, Clone)]
struct NewMessage {
    phone: String,
    content: String,
    received_at: String,
    device: String,
}

/// Resolve the canonical fields through their alias lists and normalize
/// the receive time against `now`.
fn normalize(
    payload: &Payload,
    content_type: &str,
    now: NaiveDateTime,
) -> Result<NewMessage, ApiError> {
    let phone = fields::resolve_field(payload, fields::PHONE_ALIASES);
    let content = fields::resolve_field(payload, fields::CONTENT_ALIASES);

    let (Some(phone), Some(content)) = (phone, content) else {
        return Err(ApiError::MissingParams {
            got_keys: payload.keys(),
            content_type: content_type.to_string(),
        });
    };

    let time = fields::resolve_field(payload, fields::TIME_ALIASES).unwrap_or_default();
    let device = fields::resolve_field(payload, fields::DEVICE_ALIASES).unwrap_or_default();

    let received = normalize_time(&time, now);
    if received == now && !time.is_empty() {
        debug!("unparsable time field {:?}, using receipt time", time);
    }

    Ok(NewMessage {
        phone,
        content,
        received_at: format_timestamp(received),
        device,
    })
}
