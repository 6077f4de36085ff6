use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db::{self, models::FundOperation};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateFundOperationRequest {
    pub fund_type: String,
    pub opening_balance: f64,
    pub receipts: f64,
    pub disbursements: f64,
    pub period: String, // e.g. "Q1 2026" or "January 2026"
    pub date: String,   // YYYY-MM-DD
}

pub async fn create_fund_operation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateFundOperationRequest>,
) -> impl IntoResponse {
    if let Err(e) = super::require_encoder(&user) {
        return e.into_response();
    }
    let checks = (|| {
        let fund_type = super::non_empty("fund_type", &req.fund_type)?;
        let period = super::non_empty("period", &req.period)?;
        let date = super::parse_date("date", &req.date)?;
        let opening = super::non_negative_amount("opening_balance", req.opening_balance)?;
        let receipts = super::non_negative_amount("receipts", req.receipts)?;
        let disbursements = super::non_negative_amount("disbursements", req.disbursements)?;
        Ok::<_, (StatusCode, String)>((fund_type, period, date, opening, receipts, disbursements))
    })();
    let (fund_type, period, date, opening, receipts, disbursements) = match checks {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };

    let record = FundOperation {
        id: Uuid::new_v4().to_string(),
        fund_type,
        opening_balance: opening,
        receipts,
        disbursements,
        // Derived, not client-supplied; keeps the books arithmetically consistent.
        closing_balance: opening + receipts - disbursements,
        period,
        date,
    };
    match db::add_fund_operation(&state.db, &record).await {
        Ok(()) => (
            StatusCode::CREATED,
            AxumJson(serde_json::json!({
                "status": "created",
                "id": record.id,
                "closing_balance": record.closing_balance,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Fund operation insert failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn list_fund_operations(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    match db::list_fund_operations(&state.db).await {
        Ok(list) => AxumJson(serde_json::json!({ "fund_operations": list })).into_response(),
        Err(e) => {
            tracing::error!("Fund operation query error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
