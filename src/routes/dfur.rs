use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db::{self, models::DfurProject, RecordKind};
use crate::review::ReviewStatus;
use crate::routes::review::{handle_review, log_creation, ReviewRequest};
use crate::AppState;

const PROJECT_STATUSES: [&str; 5] =
    ["Planned", "In Progress", "Completed", "On Hold", "Cancelled"];

fn validate_project_status(s: &str) -> Result<String, (StatusCode, String)> {
    if PROJECT_STATUSES.contains(&s) {
        Ok(s.to_string())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            format!("status: must be one of {}", PROJECT_STATUSES.join(", ")),
        ))
    }
}

#[derive(Deserialize)]
pub struct CreateDfurRequest {
    pub transaction_id: Option<String>,
    pub transaction_date: String, // YYYY-MM-DD
    pub nature_of_collection: String,
    pub project: String,
    pub location: String,
    pub total_cost_approved: f64,
    pub date_started: String,
    pub target_completion_date: String,
    pub status: String,
    pub total_cost_incurred: Option<f64>,
    pub number_of_extensions: Option<i64>,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateDfurRequest {
    pub transaction_date: Option<String>,
    pub nature_of_collection: Option<String>,
    pub project: Option<String>,
    pub location: Option<String>,
    pub total_cost_approved: Option<f64>,
    pub date_started: Option<String>,
    pub target_completion_date: Option<String>,
    pub status: Option<String>,
    pub total_cost_incurred: Option<f64>,
    pub number_of_extensions: Option<i64>,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

pub async fn create_dfur_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateDfurRequest>,
) -> impl IntoResponse {
    if let Err(e) = super::require_encoder(&user) {
        return e.into_response();
    }

    let checks = (|| {
        let transaction_date = super::parse_date("transaction_date", &req.transaction_date)?;
        let date_started = super::parse_date("date_started", &req.date_started)?;
        let target = super::parse_date("target_completion_date", &req.target_completion_date)?;
        let nature = super::non_empty("nature_of_collection", &req.nature_of_collection)?;
        let project = super::non_empty("project", &req.project)?;
        let location = super::non_empty("location", &req.location)?;
        let status = validate_project_status(&req.status)?;
        let approved = super::positive_amount("total_cost_approved", req.total_cost_approved)?;
        let incurred =
            super::non_negative_amount("total_cost_incurred", req.total_cost_incurred.unwrap_or(0.0))?;
        Ok::<_, (StatusCode, String)>((
            transaction_date,
            date_started,
            target,
            nature,
            project,
            location,
            status,
            approved,
            incurred,
        ))
    })();
    let (transaction_date, date_started, target, nature, project, location, status, approved, incurred) =
        match checks {
            Ok(v) => v,
            Err(e) => return e.into_response(),
        };

    if incurred > approved {
        return (
            StatusCode::BAD_REQUEST,
            "total_cost_incurred: cannot exceed total_cost_approved".to_string(),
        )
            .into_response();
    }
    let extensions = req.number_of_extensions.unwrap_or(0);
    if extensions < 0 {
        return (StatusCode::BAD_REQUEST, "number_of_extensions: must not be negative".to_string())
            .into_response();
    }

    let transaction_id = req
        .transaction_id
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("DFUR-{}", Uuid::new_v4()));

    let record = DfurProject {
        id: Uuid::new_v4().to_string(),
        transaction_id,
        transaction_date,
        nature_of_collection: nature,
        project,
        location,
        total_cost_approved: approved,
        date_started,
        target_completion_date: target,
        status,
        total_cost_incurred: incurred,
        number_of_extensions: extensions,
        remarks: req.remarks,
        review_status: ReviewStatus::Pending.as_str().to_string(),
        review_comment: None,
        reviewed_by: None,
        reviewed_at: None,
        checked_by: None,
        checked_at: None,
        created_at: Utc::now(),
    };

    if let Err(e) = db::add_dfur_project(&state.db, &record).await {
        if db::is_unique_violation(&e) {
            return (StatusCode::CONFLICT, "transaction_id already exists").into_response();
        }
        tracing::error!("DFUR insert failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    if let Err(e) = log_creation(
        &state,
        &user,
        RecordKind::DfurProject,
        &record.transaction_id,
        record.total_cost_approved,
        &record.nature_of_collection,
    )
    .await
    {
        tracing::error!("Activity log append failed for {}: {}", record.transaction_id, e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    (
        StatusCode::CREATED,
        AxumJson(serde_json::json!({
            "status": "created",
            "id": record.id,
            "transaction_id": record.transaction_id,
        })),
    )
        .into_response()
}

pub async fn list_dfur_projects(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    if let Some(s) = params.status.as_deref() {
        if ReviewStatus::parse(s).is_none() {
            return (StatusCode::BAD_REQUEST, "status: unknown review status".to_string())
                .into_response();
        }
    }
    match db::list_dfur_projects(&state.db, params.status.as_deref()).await {
        Ok(list) => AxumJson(serde_json::json!({ "projects": list })).into_response(),
        Err(e) => {
            tracing::error!("DFUR query error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn update_dfur_project(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<UpdateDfurRequest>,
) -> impl IntoResponse {
    if let Err(e) = super::require_encoder(&user) {
        return e.into_response();
    }

    let mut record = match db::get_dfur_project(&state.db, &id).await {
        Ok(Some(p)) => p,
        Ok(None) => return (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("DFUR lookup error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    if record.review_status == ReviewStatus::Approved.as_str() {
        return (StatusCode::CONFLICT, "Approved transactions cannot be edited").into_response();
    }

    if let Some(s) = req.transaction_date.as_deref() {
        record.transaction_date = match super::parse_date("transaction_date", s) {
            Ok(d) => d,
            Err(e) => return e.into_response(),
        };
    }
    if let Some(s) = req.date_started.as_deref() {
        record.date_started = match super::parse_date("date_started", s) {
            Ok(d) => d,
            Err(e) => return e.into_response(),
        };
    }
    if let Some(s) = req.target_completion_date.as_deref() {
        record.target_completion_date = match super::parse_date("target_completion_date", s) {
            Ok(d) => d,
            Err(e) => return e.into_response(),
        };
    }
    if let Some(s) = req.status.as_deref() {
        record.status = match validate_project_status(s) {
            Ok(s) => s,
            Err(e) => return e.into_response(),
        };
    }
    if let Some(v) = req.total_cost_approved {
        record.total_cost_approved = match super::positive_amount("total_cost_approved", v) {
            Ok(a) => a,
            Err(e) => return e.into_response(),
        };
    }
    if let Some(v) = req.total_cost_incurred {
        record.total_cost_incurred = match super::non_negative_amount("total_cost_incurred", v) {
            Ok(a) => a,
            Err(e) => return e.into_response(),
        };
    }
    if record.total_cost_incurred > record.total_cost_approved {
        return (
            StatusCode::BAD_REQUEST,
            "total_cost_incurred: cannot exceed total_cost_approved".to_string(),
        )
            .into_response();
    }
    if let Some(n) = req.number_of_extensions {
        if n < 0 {
            return (
                StatusCode::BAD_REQUEST,
                "number_of_extensions: must not be negative".to_string(),
            )
                .into_response();
        }
        record.number_of_extensions = n;
    }
    macro_rules! set_required {
        ($field:ident, $name:literal) => {
            if let Some(v) = req.$field.as_deref() {
                record.$field = match super::non_empty($name, v) {
                    Ok(s) => s,
                    Err(e) => return e.into_response(),
                };
            }
        };
    }
    set_required!(nature_of_collection, "nature_of_collection");
    set_required!(project, "project");
    set_required!(location, "location");
    if req.remarks.is_some() {
        record.remarks = req.remarks;
    }

    match db::update_dfur_project_fields(&state.db, &id, &record).await {
        Ok(true) => {
            AxumJson(serde_json::json!({ "status": "updated", "id": id })).into_response()
        }
        Ok(false) => (StatusCode::CONFLICT, "Not updated (approved or missing)").into_response(),
        Err(e) => {
            tracing::error!("DFUR update error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn review_dfur_project(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<ReviewRequest>,
) -> impl IntoResponse {
    handle_review(&state, &user, RecordKind::DfurProject, &id, &req).await
}
