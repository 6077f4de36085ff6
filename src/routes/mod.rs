use axum::http::StatusCode;
use chrono::NaiveDate;

use crate::auth::AuthenticatedUser;
use crate::review::{ReviewError, Role};

pub mod activity;
pub mod budget;
pub mod collections;
pub mod comments;
pub mod dfur;
pub mod disbursements;
pub mod funds;
pub mod reports;
pub mod review;
pub mod users;

// Field-level validation errors surface as 400 with the offending field named.

pub(crate) fn parse_date(
    field: &'static str,
    s: &str,
) -> Result<NaiveDate, (StatusCode, String)> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("{field}: expected YYYY-MM-DD")))
}

pub(crate) fn positive_amount(
    field: &'static str,
    value: f64,
) -> Result<f64, (StatusCode, String)> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err((StatusCode::BAD_REQUEST, format!("{field}: must be a positive number")))
    }
}

pub(crate) fn non_negative_amount(
    field: &'static str,
    value: f64,
) -> Result<f64, (StatusCode, String)> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err((StatusCode::BAD_REQUEST, format!("{field}: must be zero or a positive number")))
    }
}

pub(crate) fn non_empty(
    field: &'static str,
    value: &str,
) -> Result<String, (StatusCode, String)> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err((StatusCode::BAD_REQUEST, format!("{field}: must not be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}

pub(crate) fn require_admin(user: &AuthenticatedUser) -> Result<(), ReviewError> {
    if user.role.is_admin() {
        Ok(())
    } else {
        Err(ReviewError::Forbidden { role: user.role, action: "administer" })
    }
}

/// Only encoders submit transactions; admins may do so correctively.
pub(crate) fn require_encoder(user: &AuthenticatedUser) -> Result<(), ReviewError> {
    if user.role == Role::Encoder || user.role.is_admin() {
        Ok(())
    } else {
        Err(ReviewError::Forbidden { role: user.role, action: "encode" })
    }
}
