use axum::{Extension, Json};
use axum::extract::{Query, State};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use smshub_db::queries::{MessageFilter, SortDir};
use smshub_types::api::{
    Claims, ListResponse, MessageItem, PurgeRequest, PurgeResponse, PurgeTokenResponse,
};

use crate::auth::AppState;
use crate::error::{ApiError, run_db};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Exact device tag.
    #[serde(default)]
    pub device: String,
    /// Sender substring.
    #[serde(default)]
    pub phone: String,
    /// Content substring.
    #[serde(default)]
    pub q: String,
    /// Calendar dates, YYYY-MM-DD, inclusive.
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    /// Accepted for interface compatibility; receive time is the only
    /// supported sort key.
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_dir")]
    pub dir: String,
    #[serde(default = "default_page")]
    pub page: i64,
    /// Page size.
    #[serde(default = "default_pp")]
    pub pp: i64,
}

fn default_sort() -> String {
    "time".into()
}

fn default_dir() -> String {
    "desc".into()
}

fn default_page() -> i64 {
    1
}

fn default_pp() -> i64 {
    50
}

/// GET /api/messages — filtered, sorted, paginated listing.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let window = page_window(query.page, query.pp);
    let dir = if query.dir.eq_ignore_ascii_case("asc") {
        SortDir::Asc
    } else {
        SortDir::Desc
    };
    let filter = build_filter(&query);

    let db_state = state.clone();
    let (total, rows, devices) = run_db(move || {
        // Count and page fetch share one predicate set, so the totals
        // always describe the same result set as the rows.
        let total = db_state.db.count_messages(&filter)?;
        let rows = db_state
            .db
            .list_messages(&filter, dir, window.per_page, window.offset)?;
        let devices = db_state.db.distinct_devices()?;
        Ok((total, rows, devices))
    })
    .await?;

    let messages = rows
        .into_iter()
        .map(|row| MessageItem {
            phone: row.phone,
            content: row.content,
            received_at: row.received_at,
            device: row.device,
        })
        .collect();

    Ok(Json(ListResponse {
        total,
        page: window.page,
        pages: page_count(total, window.per_page),
        per_page: window.per_page,
        sort: "time",
        dir: match dir {
            SortDir::Asc => "asc".into(),
            SortDir::Desc => "desc".into(),
        },
        messages,
        devices,
    }))
}

/// GET /api/messages/purge-token — the operator's current purge nonce.
pub async fn purge_token(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<PurgeTokenResponse>, ApiError> {
    let purge_token = state.purge_nonces.issue(claims.sub)?;
    Ok(Json(PurgeTokenResponse { purge_token }))
}

/// POST /api/messages/purge — destroy every stored message. The nonce is
/// rotated whether or not it matched; a rejected attempt needs a freshly
/// fetched token to retry.
pub async fn purge(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PurgeRequest>,
) -> Result<Json<PurgeResponse>, ApiError> {
    let ok = state.purge_nonces.consume(claims.sub, &req.purge_token)?;
    if !ok {
        return Err(ApiError::InvalidPurgeToken);
    }

    let db_state = state.clone();
    let removed = run_db(move || db_state.db.purge_messages()).await?;
    info!("operator {} purged {} sms records", claims.username, removed);

    Ok(Json(PurgeResponse {
        success: true,
        removed,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageWindow {
    page: i64,
    per_page: i64,
    offset: i64,
}

/// Clamp the requested window: page at least 1, size within [10, 200].
fn page_window(page: i64, pp: i64) -> PageWindow {
    let page = page.max(1);
    let per_page = pp.clamp(10, 200);
    PageWindow {
        page,
        per_page,
        offset: (page - 1) * per_page,
    }
}

fn page_count(total: i64, per_page: i64) -> i64 {
    let total = total.max(0);
    ((total + per_page - 1) / per_page).max(1)
}

fn build_filter(query: &ListQuery) -> MessageFilter {
    MessageFilter {
        device: non_empty(&query.device),
        phone: non_empty(&query.phone),
        content: non_empty(&query.q),
        received_from: day_bound(&query.from, "00:00:00"),
        received_to: day_bound(&query.to, "23:59:59"),
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Expand a calendar date to an inclusive day edge; malformed dates are
/// dropped rather than compared lexically.
fn day_bound(raw: &str, edge: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| format!("{} {}", date.format("%Y-%m-%d"), edge))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_clamps() {
        assert_eq!(
            page_window(0, 5),
            PageWindow {
                page: 1,
                per_page: 10,
                offset: 0
            }
        );
        assert_eq!(
            page_window(-3, 1000),
            PageWindow {
                page: 1,
                per_page: 200,
                offset: 0
            }
        );
        assert_eq!(
            page_window(3, 50),
            PageWindow {
                page: 3,
                per_page: 50,
                offset: 100
            }
        );
    }

    #[test]
    fn page_count_arithmetic() {
        assert_eq!(page_count(0, 50), 1);
        assert_eq!(page_count(50, 50), 1);
        assert_eq!(page_count(51, 50), 2);
        // 101 rows at 50 per page: two full pages plus one row.
        assert_eq!(page_count(101, 50), 3);
    }

    #[test]
    fn day_bounds_expand_to_day_edges() {
        assert_eq!(
            day_bound("2024-05-01", "00:00:00"),
            Some("2024-05-01 00:00:00".into())
        );
        assert_eq!(
            day_bound("2024-05-01", "23:59:59"),
            Some("2024-05-01 23:59:59".into())
        );
        assert_eq!(day_bound("", "00:00:00"), None);
        assert_eq!(day_bound("05/01/2024", "00:00:00"), None);
    }

    #[test]
    fn blank_filters_are_dropped() {
        let query = ListQuery {
            device: "  ".into(),
            phone: "100".into(),
            q: String::new(),
            from: String::new(),
            to: String::new(),
            sort: default_sort(),
            dir: default_dir(),
            page: default_page(),
            pp: default_pp(),
        };
        let filter = build_filter(&query);
        assert_eq!(filter.device, None);
        assert_eq!(filter.phone, Some("100".into()));
        assert_eq!(filter.content, None);
    }
}
