use axum::Json;
use axum::extract::{Query, State};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use serde::Deserialize;

use smshub_db::models::SmsRow;
use smshub_extract::otp::{contains_otp_keyword, extract_code};
use smshub_extract::time::{format_timestamp, parse_datetime};
use smshub_types::api::CodeResponse;

use crate::auth::{AppState, touch_token, validate_sms_token};
use crate::error::{ApiError, run_db};

/// Coarse-filter cap: the strict scan never looks at more than this many
/// recent candidates, whatever the corpus size.
const CANDIDATE_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    pub token: Option<String>,
}

/// GET /api/code — the most recent message with an extractable passcode.
pub async fn latest_code(
    State(state): State<AppState>,
    Query(query): Query<CodeQuery>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<CodeResponse>, ApiError> {
    // Query parameter first, then Authorization: Bearer. Operator login
    // sessions are deliberately not accepted here.
    let candidate = query
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| bearer.map(|TypedHeader(auth)| auth.token().to_string()));
    let token_id = validate_sms_token(&state, candidate).await?;
    touch_token(&state, token_id);

    let db_state = state.clone();
    let candidates = run_db(move || db_state.db.keyword_candidates(CANDIDATE_LIMIT)).await?;

    scan_candidates(candidates).map(Json).ok_or_else(|| ApiError::NotFound {
        message: "no recent message contains a verification keyword and an extractable 4-6 digit code"
            .into(),
    })
}

/// Walk the coarse candidates, newest first, and return the first one
/// that passes the strict keyword test and yields a standalone digit run.
/// A keyword hit without an extractable code is skipped, not an error.
fn scan_candidates(candidates: Vec<SmsRow>) -> Option<CodeResponse> {
    for row in candidates {
        if !contains_otp_keyword(&row.content) {
            continue;
        }
        let Some(code) = extract_code(&row.content).map(str::to_string) else {
            continue;
        };
        let time = display_time(&row.received_at);
        return Some(CodeResponse {
            phone: row.phone,
            code,
            content: row.content,
            time,
        });
    }
    None
}

/// Re-render a stored timestamp for display; unparsable values pass
/// through untouched.
fn display_time(stored: &str) -> String {
    parse_datetime(stored)
        .map(format_timestamp)
        .unwrap_or_else(|| stored.to_string())
}
