use serde::{Deserialize, Serialize};
use chrono::{NaiveDate, DateTime, Utc};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Collection {
    pub id: String,
    pub transaction_id: String,
    pub transaction_date: NaiveDate,
    pub nature_of_collection: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub purpose: Option<String>,
    pub fund_source: String,
    pub amount: f64,
    pub payor: String,
    pub or_number: String,
    pub remarks: Option<String>,
    pub review_status: String,
    pub review_comment: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub checked_by: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Disbursement {
    pub id: String,
    pub transaction_id: String,
    pub transaction_date: NaiveDate,
    pub nature_of_disbursement: String,
    pub category: String,
    pub subcategory: String,
    pub program_description: Option<String>,
    pub fund_source: String,
    pub amount: f64,
    pub payee: String,
    pub dv_number: String,
    pub remarks: Option<String>,
    pub review_status: String,
    pub review_comment: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub checked_by: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DfurProject {
    pub id: String,
    pub transaction_id: String,
    pub transaction_date: NaiveDate,
    pub nature_of_collection: String,
    pub project: String,
    pub location: String,
    pub total_cost_approved: f64,
    pub date_started: NaiveDate,
    pub target_completion_date: NaiveDate,
    pub status: String,
    pub total_cost_incurred: f64,
    pub number_of_extensions: i64,
    pub remarks: Option<String>,
    pub review_status: String,
    pub review_comment: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub checked_by: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Detailed budget planning transaction (ABO). Not subject to review.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BudgetEntry {
    pub id: String,
    pub transaction_id: String,
    pub transaction_date: NaiveDate,
    pub expenditure_program: String,
    pub category: String,
    pub subcategory: String,
    pub program_description: Option<String>,
    pub fund_source: String,
    pub amount: f64,
    pub payee: String,
    pub dv_number: String,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FundOperation {
    pub id: String,
    pub fund_type: String,
    pub opening_balance: f64,
    pub receipts: f64,
    pub disbursements: f64,
    pub closing_balance: f64,
    pub period: String,
    pub date: NaiveDate,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BudgetAllocation {
    pub id: String,
    pub category: String,
    pub allocated_amount: f64,
    pub utilized_amount: f64,
    pub year: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Salted hash; never serialized into API responses.
    #[serde(skip_serializing)]
    pub password: String,
    pub role: String,
    pub full_name: String,
    pub position: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Public feedback left by viewers; moderated by admins.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ViewerComment {
    pub id: String,
    pub name: Option<String>,
    pub contact_info: Option<String>,
    pub message: String,
    pub context_type: Option<String>,
    pub context_id: Option<String>,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of a transaction entering a review state. Append-only.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ActivityLogEntry {
    pub id: String,
    pub transaction_id: String,
    pub record_type: String,
    pub amount: f64,
    pub category: String,
    pub status: String,
    pub comment: Option<String>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}
