use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db::{self, models::Collection, RecordKind};
use crate::review::ReviewStatus;
use crate::routes::review::{handle_review, log_creation, ReviewRequest};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateCollectionRequest {
    pub transaction_id: Option<String>,
    pub transaction_date: String, // YYYY-MM-DD
    pub nature_of_collection: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub purpose: Option<String>,
    pub fund_source: String,
    pub amount: f64,
    pub payor: String,
    pub or_number: String,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateCollectionRequest {
    pub transaction_date: Option<String>,
    pub nature_of_collection: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub purpose: Option<String>,
    pub fund_source: Option<String>,
    pub amount: Option<f64>,
    pub payor: Option<String>,
    pub or_number: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

pub async fn create_collection(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateCollectionRequest>,
) -> impl IntoResponse {
    if let Err(e) = super::require_encoder(&user) {
        return e.into_response();
    }

    let transaction_date = match super::parse_date("transaction_date", &req.transaction_date) {
        Ok(d) => d,
        Err(e) => return e.into_response(),
    };
    let checks = (|| {
        let nature = super::non_empty("nature_of_collection", &req.nature_of_collection)?;
        let category = super::non_empty("category", &req.category)?;
        let fund_source = super::non_empty("fund_source", &req.fund_source)?;
        let payor = super::non_empty("payor", &req.payor)?;
        let or_number = super::non_empty("or_number", &req.or_number)?;
        let amount = super::positive_amount("amount", req.amount)?;
        Ok::<_, (StatusCode, String)>((nature, category, fund_source, payor, or_number, amount))
    })();
    let (nature, category, fund_source, payor, or_number, amount) = match checks {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };

    let transaction_id = req
        .transaction_id
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("COL-{}", Uuid::new_v4()));

    let record = Collection {
        id: Uuid::new_v4().to_string(),
        transaction_id,
        transaction_date,
        nature_of_collection: nature,
        category,
        subcategory: req.subcategory,
        purpose: req.purpose,
        fund_source,
        amount,
        payor,
        or_number,
        remarks: req.remarks,
        review_status: ReviewStatus::Pending.as_str().to_string(),
        review_comment: None,
        reviewed_by: None,
        reviewed_at: None,
        checked_by: None,
        checked_at: None,
        created_at: Utc::now(),
    };

    if let Err(e) = db::add_collection(&state.db, &record).await {
        if db::is_unique_violation(&e) {
            return (StatusCode::CONFLICT, "transaction_id already exists").into_response();
        }
        tracing::error!("Collection insert failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    if let Err(e) = log_creation(
        &state,
        &user,
        RecordKind::Collection,
        &record.transaction_id,
        record.amount,
        &record.category,
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

pub async fn list_collections(
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
    match db::list_collections(&state.db, params.status.as_deref()).await {
        Ok(list) => AxumJson(serde_json::json!({ "collections": list })).into_response(),
        Err(e) => {
            tracing::error!("Collection query error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn update_collection(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<UpdateCollectionRequest>,
) -> impl IntoResponse {
    if let Err(e) = super::require_encoder(&user) {
        return e.into_response();
    }

    let mut record = match db::get_collection(&state.db, &id).await {
        Ok(Some(c)) => c,
        Ok(None) => return (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Collection lookup error: {}", e);
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
    if let Some(v) = req.amount {
        record.amount = match super::positive_amount("amount", v) {
            Ok(a) => a,
            Err(e) => return e.into_response(),
        };
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
    set_required!(category, "category");
    set_required!(fund_source, "fund_source");
    set_required!(payor, "payor");
    set_required!(or_number, "or_number");
    if req.subcategory.is_some() {
        record.subcategory = req.subcategory;
    }
    if req.purpose.is_some() {
        record.purpose = req.purpose;
    }
    if req.remarks.is_some() {
        record.remarks = req.remarks;
    }

    match db::update_collection_fields(&state.db, &id, &record).await {
        Ok(true) => {
            AxumJson(serde_json::json!({ "status": "updated", "id": id })).into_response()
        }
        Ok(false) => (StatusCode::CONFLICT, "Not updated (approved or missing)").into_response(),
        Err(e) => {
            tracing::error!("Collection update error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn review_collection(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<ReviewRequest>,
) -> impl IntoResponse {
    handle_review(&state, &user, RecordKind::Collection, &id, &req).await
}
