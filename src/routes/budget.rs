//! ABO budget entries and yearly budget allocations. Neither carries the
//! review workflow; entries are plain encoder CRUD.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db::{self, models::{BudgetAllocation, BudgetEntry}};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateBudgetEntryRequest {
    pub transaction_id: Option<String>,
    pub transaction_date: String, // YYYY-MM-DD
    pub expenditure_program: String,
    pub category: String,
    pub subcategory: String,
    pub program_description: Option<String>,
    pub fund_source: String,
    pub amount: f64,
    pub payee: String,
    pub dv_number: String,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateBudgetEntryRequest {
    pub transaction_date: Option<String>,
    pub expenditure_program: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub program_description: Option<String>,
    pub fund_source: Option<String>,
    pub amount: Option<f64>,
    pub payee: Option<String>,
    pub dv_number: Option<String>,
    pub remarks: Option<String>,
}

pub async fn create_budget_entry(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateBudgetEntryRequest>,
) -> impl IntoResponse {
    if let Err(e) = super::require_encoder(&user) {
        return e.into_response();
    }

    let checks = (|| {
        let transaction_date = super::parse_date("transaction_date", &req.transaction_date)?;
        let program = super::non_empty("expenditure_program", &req.expenditure_program)?;
        let category = super::non_empty("category", &req.category)?;
        let subcategory = super::non_empty("subcategory", &req.subcategory)?;
        let fund_source = super::non_empty("fund_source", &req.fund_source)?;
        let payee = super::non_empty("payee", &req.payee)?;
        let dv_number = super::non_empty("dv_number", &req.dv_number)?;
        let amount = super::positive_amount("amount", req.amount)?;
        Ok::<_, (StatusCode, String)>((
            transaction_date,
            program,
            category,
            subcategory,
            fund_source,
            payee,
            dv_number,
            amount,
        ))
    })();
    let (transaction_date, program, category, subcategory, fund_source, payee, dv_number, amount) =
        match checks {
            Ok(v) => v,
            Err(e) => return e.into_response(),
        };

    let record = BudgetEntry {
        id: Uuid::new_v4().to_string(),
        transaction_id: req
            .transaction_id
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("ABO-{}", Uuid::new_v4())),
        transaction_date,
        expenditure_program: program,
        category,
        subcategory,
        program_description: req.program_description,
        fund_source,
        amount,
        payee,
        dv_number,
        remarks: req.remarks,
        created_at: Utc::now(),
    };

    if let Err(e) = db::add_budget_entry(&state.db, &record).await {
        if db::is_unique_violation(&e) {
            return (StatusCode::CONFLICT, "transaction_id already exists").into_response();
        }
        tracing::error!("Budget entry insert failed: {}", e);
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

pub async fn list_budget_entries(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    match db::list_budget_entries(&state.db).await {
        Ok(list) => AxumJson(serde_json::json!({ "budget_entries": list })).into_response(),
        Err(e) => {
            tracing::error!("Budget entry query error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn update_budget_entry(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<UpdateBudgetEntryRequest>,
) -> impl IntoResponse {
    if let Err(e) = super::require_encoder(&user) {
        return e.into_response();
    }

    let mut record = match db::get_budget_entry(&state.db, &id).await {
        Ok(Some(b)) => b,
        Ok(None) => return (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Budget entry lookup error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

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
    set_required!(expenditure_program, "expenditure_program");
    set_required!(category, "category");
    set_required!(subcategory, "subcategory");
    set_required!(fund_source, "fund_source");
    set_required!(payee, "payee");
    set_required!(dv_number, "dv_number");
    if req.program_description.is_some() {
        record.program_description = req.program_description;
    }
    if req.remarks.is_some() {
        record.remarks = req.remarks;
    }

    match db::update_budget_entry(&state.db, &id, &record).await {
        Ok(true) => AxumJson(serde_json::json!({ "status": "updated", "id": id })).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Budget entry update error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct CreateAllocationRequest {
    pub category: String,
    pub allocated_amount: f64,
    pub utilized_amount: Option<f64>,
    pub year: i32,
}

#[derive(Deserialize)]
pub struct AllocationParams {
    pub year: Option<i32>,
}

pub async fn create_budget_allocation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateAllocationRequest>,
) -> impl IntoResponse {
    if let Err(e) = super::require_encoder(&user) {
        return e.into_response();
    }
    let checks = (|| {
        let category = super::non_empty("category", &req.category)?;
        let allocated = super::positive_amount("allocated_amount", req.allocated_amount)?;
        let utilized =
            super::non_negative_amount("utilized_amount", req.utilized_amount.unwrap_or(0.0))?;
        Ok::<_, (StatusCode, String)>((category, allocated, utilized))
    })();
    let (category, allocated, utilized) = match checks {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };

    let record = BudgetAllocation {
        id: Uuid::new_v4().to_string(),
        category,
        allocated_amount: allocated,
        utilized_amount: utilized,
        year: req.year,
    };
    match db::add_budget_allocation(&state.db, &record).await {
        Ok(()) => (
            StatusCode::CREATED,
            AxumJson(serde_json::json!({ "status": "created", "id": record.id })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Allocation insert failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn list_budget_allocations(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<AllocationParams>,
) -> impl IntoResponse {
    match db::list_budget_allocations(&state.db, params.year).await {
        Ok(list) => AxumJson(serde_json::json!({ "allocations": list })).into_response(),
        Err(e) => {
            tracing::error!("Allocation query error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
