//! Shared review endpoint logic for the three reviewed record kinds.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db::{self, RecordKind};
use crate::review;
use crate::AppState;

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub action: review::ReviewAction,
    pub comment: Option<String>,
}

/// Runs one review action end to end: snapshot, guard evaluation, optimistic
/// write, audit append. The snapshot is taken before the mutation so the
/// activity log records pre-transition fields alongside the resulting status.
pub(crate) async fn handle_review(
    state: &AppState,
    user: &AuthenticatedUser,
    kind: RecordKind,
    id: &str,
    req: &ReviewRequest,
) -> Response {
    let snapshot = match db::get_review_snapshot(&state.db, kind, id).await {
        Ok(Some(s)) => s,
        Ok(None) => return (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Review snapshot error for {} {}: {}", kind.as_str(), id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let comment = req.comment.as_deref();
    let effect = match review::evaluate(user.role, req.action, snapshot.state, comment) {
        Ok(effect) => effect,
        Err(e) => return e.into_response(),
    };

    let now = Utc::now();
    match db::apply_review(
        &state.db,
        kind,
        id,
        snapshot.state.status,
        effect,
        &user.username,
        comment,
        now,
    )
    .await
    {
        Ok(true) => {}
        Ok(false) => {
            // Status moved under us between snapshot and write.
            return (StatusCode::CONFLICT, "Transaction state changed, retry").into_response();
        }
        Err(e) => {
            tracing::error!("Review update error for {} {}: {}", kind.as_str(), id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    let new_status = effect.resulting_status();
    let audit_id = Uuid::new_v4().to_string();
    if let Err(e) = db::log_activity(
        &state.db,
        &audit_id,
        &snapshot.transaction_id,
        kind.as_str(),
        snapshot.amount,
        &snapshot.category,
        new_status.as_str(),
        comment,
        &user.username,
        now,
    )
    .await
    {
        tracing::error!("Activity log append failed for {}: {}", snapshot.transaction_id, e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    tracing::info!(
        transaction_id = %snapshot.transaction_id,
        kind = kind.as_str(),
        action = req.action.as_str(),
        actor = %user.username,
        status = new_status.as_str(),
        "review action applied"
    );

    AxumJson(serde_json::json!({ "id": id, "status": new_status })).into_response()
}

/// Audit entry for a freshly created transaction: exactly one, status pending.
pub(crate) async fn log_creation(
    state: &AppState,
    user: &AuthenticatedUser,
    kind: RecordKind,
    transaction_id: &str,
    amount: f64,
    category: &str,
) -> anyhow::Result<()> {
    let audit_id = Uuid::new_v4().to_string();
    db::log_activity(
        &state.db,
        &audit_id,
        transaction_id,
        kind.as_str(),
        amount,
        category,
        review::ReviewStatus::Pending.as_str(),
        None,
        &user.username,
        Utc::now(),
    )
    .await
}
