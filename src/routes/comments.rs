//! Public viewer feedback. Submission is unauthenticated; moderation
//! (publish/archive) is admin-only.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db::{self, models::ViewerComment};
use crate::AppState;

const CONTEXT_TYPES: [&str; 4] = ["general", "abr", "sre", "dfur"];
const COMMENT_STATUSES: [&str; 3] = ["pending", "published", "archived"];

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub name: Option<String>,
    pub contact_info: Option<String>,
    pub message: String,
    pub context_type: Option<String>,
    pub context_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ModerateCommentRequest {
    pub action: ModerationAction,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Publish,
    Archive,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

pub async fn create_comment(
    State(state): State<AppState>,
    Json(req): Json<CreateCommentRequest>,
) -> impl IntoResponse {
    let message = req.message.trim();
    // Character count, not byte length; messages are frequently non-ASCII.
    let length = message.chars().count();
    if length < 10 {
        return (StatusCode::BAD_REQUEST, "message: must be at least 10 characters".to_string())
            .into_response();
    }
    if length > 1000 {
        return (StatusCode::BAD_REQUEST, "message: must not exceed 1000 characters".to_string())
            .into_response();
    }
    if let Some(ct) = req.context_type.as_deref() {
        if !CONTEXT_TYPES.contains(&ct) {
            return (
                StatusCode::BAD_REQUEST,
                format!("context_type: must be one of {}", CONTEXT_TYPES.join(", ")),
            )
                .into_response();
        }
    }

    let record = ViewerComment {
        id: Uuid::new_v4().to_string(),
        name: req.name.filter(|n| !n.trim().is_empty()),
        contact_info: req.contact_info.filter(|c| !c.trim().is_empty()),
        message: message.to_string(),
        context_type: req.context_type,
        context_id: req.context_id,
        status: "pending".to_string(),
        reviewed_by: None,
        reviewed_at: None,
        created_at: Utc::now(),
    };

    match db::add_viewer_comment(&state.db, &record).await {
        Ok(()) => (
            StatusCode::CREATED,
            AxumJson(serde_json::json!({ "status": "created", "id": record.id })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Viewer comment insert failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn list_comments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    if let Err(e) = super::require_admin(&user) {
        return e.into_response();
    }
    if let Some(s) = params.status.as_deref() {
        if !COMMENT_STATUSES.contains(&s) {
            return (StatusCode::BAD_REQUEST, "status: unknown comment status".to_string())
                .into_response();
        }
    }
    match db::list_viewer_comments(&state.db, params.status.as_deref()).await {
        Ok(list) => AxumJson(serde_json::json!({ "comments": list })).into_response(),
        Err(e) => {
            tracing::error!("Viewer comment query error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn moderate_comment(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<ModerateCommentRequest>,
) -> impl IntoResponse {
    if let Err(e) = super::require_admin(&user) {
        return e.into_response();
    }
    let status = match req.action {
        ModerationAction::Publish => "published",
        ModerationAction::Archive => "archived",
    };
    match db::set_viewer_comment_status(&state.db, &id, status, &user.username, Utc::now()).await {
        Ok(true) => AxumJson(serde_json::json!({ "id": id, "status": status })).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Viewer comment moderation error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
