//! Read-only views over the append-only activity log. Admin/superadmin only.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde::Deserialize;

use crate::auth::AuthenticatedUser;
use crate::db;
use crate::AppState;

#[derive(Deserialize)]
pub struct ActivityParams {
    /// RFC3339 lower bound on entry timestamps.
    pub since: Option<String>,
}

pub async fn list_activity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<ActivityParams>,
) -> impl IntoResponse {
    if let Err(e) = super::require_admin(&user) {
        return e.into_response();
    }
    let since = match params.since.as_deref() {
        None => None,
        Some(s) => match chrono::DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Some(dt.with_timezone(&chrono::Utc)),
            Err(_) => {
                return (StatusCode::BAD_REQUEST, "since: expected RFC3339 timestamp".to_string())
                    .into_response();
            }
        },
    };
    match db::list_activity(&state.db, since).await {
        Ok(entries) => AxumJson(serde_json::json!({ "activity": entries })).into_response(),
        Err(e) => {
            tracing::error!("Activity query error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        let escaped = s.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    } else {
        s.to_string()
    }
}

pub async fn export_activity_csv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<ActivityParams>,
) -> impl IntoResponse {
    if let Err(e) = super::require_admin(&user) {
        return e.into_response();
    }
    let since = match params.since.as_deref() {
        None => None,
        Some(s) => match chrono::DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Some(dt.with_timezone(&chrono::Utc)),
            Err(_) => {
                return (StatusCode::BAD_REQUEST, "since: expected RFC3339 timestamp".to_string())
                    .into_response();
            }
        },
    };

    match db::list_activity(&state.db, since).await {
        Ok(entries) => {
            let mut w = String::new();
            w.push_str("id,transaction_id,record_type,amount,category,status,comment,actor,created_at\n");
            for a in entries {
                let amount = format!("{:.2}", a.amount);
                let comment = a.comment.unwrap_or_default();
                let created = a.created_at.to_rfc3339();
                w.push_str(&format!(
                    "{},{},{},{},{},{},{},{},{}\n",
                    csv_escape(&a.id),
                    csv_escape(&a.transaction_id),
                    csv_escape(&a.record_type),
                    csv_escape(&amount),
                    csv_escape(&a.category),
                    csv_escape(&a.status),
                    csv_escape(&comment),
                    csv_escape(&a.actor),
                    csv_escape(&created),
                ));
            }

            let mut resp = Response::new(w.into());
            let headers = resp.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            );
            headers.insert(
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=activity_log.csv"),
            );
            resp
        }
        Err(e) => {
            tracing::error!("Activity export error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
