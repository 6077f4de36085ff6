//! Financial summary and the combined Statement of Receipts & Expenditures
//! (SRE) export.

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json as AxumJson, Response},
};

use crate::auth::AuthenticatedUser;
use crate::db;
use crate::review::ReviewStatus;
use crate::AppState;

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        let escaped = s.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    } else {
        s.to_string()
    }
}

pub async fn summary(State(state): State<AppState>, _user: AuthenticatedUser) -> impl IntoResponse {
    match db::financial_summary(&state.db).await {
        Ok(summary) => AxumJson(summary).into_response(),
        Err(e) => {
            tracing::error!("Summary query error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// One CSV covering approved receipts and expenditures, receipts first.
pub async fn export_sre_csv(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    let approved = ReviewStatus::Approved.as_str();
    let collections = match db::list_collections(&state.db, Some(approved)).await {
        Ok(list) => list,
        Err(e) => {
            tracing::error!("SRE export query error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };
    let disbursements = match db::list_disbursements(&state.db, Some(approved)).await {
        Ok(list) => list,
        Err(e) => {
            tracing::error!("SRE export query error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let mut w = String::new();
    w.push_str("side,transaction_id,date,nature,category,subcategory,fund_source,amount,party,reference\n");
    for c in collections {
        let date = c.transaction_date.format("%Y-%m-%d").to_string();
        let subcategory = c.subcategory.unwrap_or_default();
        let amount = format!("{:.2}", c.amount);
        w.push_str(&format!(
            "receipt,{},{},{},{},{},{},{},{},{}\n",
            csv_escape(&c.transaction_id),
            csv_escape(&date),
            csv_escape(&c.nature_of_collection),
            csv_escape(&c.category),
            csv_escape(&subcategory),
            csv_escape(&c.fund_source),
            csv_escape(&amount),
            csv_escape(&c.payor),
            csv_escape(&c.or_number),
        ));
    }
    for d in disbursements {
        let date = d.transaction_date.format("%Y-%m-%d").to_string();
        let amount = format!("{:.2}", d.amount);
        w.push_str(&format!(
            "expenditure,{},{},{},{},{},{},{},{},{}\n",
            csv_escape(&d.transaction_id),
            csv_escape(&date),
            csv_escape(&d.nature_of_disbursement),
            csv_escape(&d.category),
            csv_escape(&d.subcategory),
            csv_escape(&d.fund_source),
            csv_escape(&amount),
            csv_escape(&d.payee),
            csv_escape(&d.dv_number),
        ));
    }

    let mut resp = Response::new(w.into());
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=sre.csv"),
    );
    resp
}
