use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};
use std::env;
use std::path::Path;

use crate::review::{ReviewEffect, ReviewState, ReviewStatus};

pub mod models;

use models::*;

pub type DbPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = include_str!("../../migrations/init.sql");

pub async fn init_pool() -> anyhow::Result<DbPool> {
    let path = env::var("DATABASE_PATH").unwrap_or_else(|_| "data/barangay.db".to_string());
    if let Some(parent) = Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let manager = SqliteConnectionManager::file(&path);
    let pool = Pool::builder()
        .max_size(10)
        .connection_timeout(std::time::Duration::from_secs(30))
        .build(manager)
        .map_err(|e| anyhow::anyhow!("Failed to create DB pool: {}", e))?;

    // Schema is idempotent (CREATE TABLE IF NOT EXISTS), safe to apply at startup.
    let conn = pool.get()?;
    conn.execute_batch(SCHEMA).context("applying schema")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    Ok(pool)
}

pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// SQLite stores timestamps as RFC3339 text and dates as YYYY-MM-DD text.

fn fmt_dt(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn col_dt(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn col_dt_opt(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            }),
    }
}

fn col_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// --- Review workflow -------------------------------------------------------

/// The three record kinds that carry the review lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Collection,
    Disbursement,
    DfurProject,
}

impl RecordKind {
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Collection => "collections",
            RecordKind::Disbursement => "disbursements",
            RecordKind::DfurProject => "dfur_projects",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Collection => "collection",
            RecordKind::Disbursement => "disbursement",
            RecordKind::DfurProject => "dfur_project",
        }
    }

    // Columns snapshotted into the activity log. DFUR projects label their
    // sector in nature_of_collection and cost their project in
    // total_cost_approved.
    fn category_column(&self) -> &'static str {
        match self {
            RecordKind::DfurProject => "nature_of_collection",
            _ => "category",
        }
    }

    fn amount_column(&self) -> &'static str {
        match self {
            RecordKind::DfurProject => "total_cost_approved",
            _ => "amount",
        }
    }
}

/// Pre-transition snapshot of a record, read before any mutation is applied.
#[derive(Debug, Clone)]
pub struct ReviewSnapshot {
    pub transaction_id: String,
    pub amount: f64,
    pub category: String,
    pub state: ReviewState,
}

pub async fn get_review_snapshot(
    pool: &DbPool,
    kind: RecordKind,
    id: &str,
) -> anyhow::Result<Option<ReviewSnapshot>> {
    let conn = pool.get()?;
    let sql = format!(
        "SELECT transaction_id, {}, {}, review_status, checked_by FROM {} WHERE id = ?1",
        kind.amount_column(),
        kind.category_column(),
        kind.table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id])?;

    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let status_raw: String = row.get(3)?;
    let status = ReviewStatus::parse(&status_raw)
        .ok_or_else(|| anyhow::anyhow!("unknown review status in {}: {}", kind.table(), status_raw))?;
    let checked_by: Option<String> = row.get(4)?;

    Ok(Some(ReviewSnapshot {
        transaction_id: row.get(0)?,
        amount: row.get(1)?,
        category: row.get(2)?,
        state: ReviewState { status, checked: checked_by.is_some() },
    }))
}

/// Applies a validated review effect. The WHERE clause re-checks the status
/// the effect was evaluated against, so a concurrent transition makes this
/// return false instead of clobbering newer state.
pub async fn apply_review(
    pool: &DbPool,
    kind: RecordKind,
    id: &str,
    expected: ReviewStatus,
    effect: ReviewEffect,
    actor: &str,
    comment: Option<&str>,
    now: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let table = kind.table();
    let changed = match effect {
        ReviewEffect::Checked => conn.execute(
            &format!(
                "UPDATE {table} SET checked_by = ?1, checked_at = ?2
                 WHERE id = ?3 AND review_status = ?4"
            ),
            params![actor, fmt_dt(now), id, expected.as_str()],
        )?,
        ReviewEffect::Flagged => conn.execute(
            &format!(
                "UPDATE {table} SET review_status = 'flagged', review_comment = ?1,
                        reviewed_by = ?2, reviewed_at = ?3
                 WHERE id = ?4 AND review_status = ?5"
            ),
            params![comment, actor, fmt_dt(now), id, expected.as_str()],
        )?,
        ReviewEffect::Approved => conn.execute(
            &format!(
                "UPDATE {table} SET review_status = 'approved', review_comment = ?1,
                        reviewed_by = ?2, reviewed_at = ?3
                 WHERE id = ?4 AND review_status = ?5"
            ),
            params![comment, actor, fmt_dt(now), id, expected.as_str()],
        )?,
        ReviewEffect::Resubmitted => conn.execute(
            &format!(
                "UPDATE {table} SET review_status = 'pending', review_comment = NULL,
                        reviewed_by = NULL, reviewed_at = NULL,
                        checked_by = NULL, checked_at = NULL
                 WHERE id = ?1 AND review_status = ?2"
            ),
            params![id, expected.as_str()],
        )?,
    };
    Ok(changed > 0)
}

// --- Activity log ----------------------------------------------------------

#[allow(clippy::too_many_arguments)]
pub async fn log_activity(
    pool: &DbPool,
    id: &str,
    transaction_id: &str,
    record_type: &str,
    amount: f64,
    category: &str,
    status: &str,
    comment: Option<&str>,
    actor: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO activity_log (id, transaction_id, record_type, amount, category, status, comment, actor, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![id, transaction_id, record_type, amount, category, status, comment, actor, fmt_dt(now)],
    )?;
    Ok(())
}

pub async fn list_activity(
    pool: &DbPool,
    since: Option<DateTime<Utc>>,
) -> anyhow::Result<Vec<ActivityLogEntry>> {
    let conn = pool.get()?;
    let base = "SELECT id, transaction_id, record_type, amount, category, status, comment, actor, created_at
                FROM activity_log";

    let map = |row: &Row| -> rusqlite::Result<ActivityLogEntry> {
        Ok(ActivityLogEntry {
            id: row.get(0)?,
            transaction_id: row.get(1)?,
            record_type: row.get(2)?,
            amount: row.get(3)?,
            category: row.get(4)?,
            status: row.get(5)?,
            comment: row.get(6)?,
            actor: row.get(7)?,
            created_at: col_dt(row, 8)?,
        })
    };

    let entries = match since {
        Some(since) => {
            let sql = format!("{base} WHERE created_at >= ?1 ORDER BY created_at DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![fmt_dt(since)], map)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!("{base} ORDER BY created_at DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], map)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(entries)
}

// --- Collections -----------------------------------------------------------

fn row_to_collection(row: &Row) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        transaction_date: col_date(row, 2)?,
        nature_of_collection: row.get(3)?,
        category: row.get(4)?,
        subcategory: row.get(5)?,
        purpose: row.get(6)?,
        fund_source: row.get(7)?,
        amount: row.get(8)?,
        payor: row.get(9)?,
        or_number: row.get(10)?,
        remarks: row.get(11)?,
        review_status: row.get(12)?,
        review_comment: row.get(13)?,
        reviewed_by: row.get(14)?,
        reviewed_at: col_dt_opt(row, 15)?,
        checked_by: row.get(16)?,
        checked_at: col_dt_opt(row, 17)?,
        created_at: col_dt(row, 18)?,
    })
}

const COLLECTION_COLS: &str = "id, transaction_id, transaction_date, nature_of_collection, category, subcategory, purpose, fund_source, amount, payor, or_number, remarks, review_status, review_comment, reviewed_by, reviewed_at, checked_by, checked_at, created_at";

pub async fn add_collection(pool: &DbPool, c: &Collection) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO collections (id, transaction_id, transaction_date, nature_of_collection, category, subcategory, purpose, fund_source, amount, payor, or_number, remarks, review_status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            c.id,
            c.transaction_id,
            fmt_date(c.transaction_date),
            c.nature_of_collection,
            c.category,
            c.subcategory,
            c.purpose,
            c.fund_source,
            c.amount,
            c.payor,
            c.or_number,
            c.remarks,
            c.review_status,
            fmt_dt(c.created_at),
        ],
    )?;
    Ok(())
}

pub async fn list_collections(
    pool: &DbPool,
    status: Option<&str>,
) -> anyhow::Result<Vec<Collection>> {
    let conn = pool.get()?;
    let list = match status {
        Some(status) => {
            let sql = format!(
                "SELECT {COLLECTION_COLS} FROM collections WHERE review_status = ?1 ORDER BY transaction_date DESC, created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status], row_to_collection)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!(
                "SELECT {COLLECTION_COLS} FROM collections ORDER BY transaction_date DESC, created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_collection)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(list)
}

pub async fn get_collection(pool: &DbPool, id: &str) -> anyhow::Result<Option<Collection>> {
    let conn = pool.get()?;
    let sql = format!("SELECT {COLLECTION_COLS} FROM collections WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_collection)?;
    Ok(rows.next().transpose()?)
}

/// Field-level edit; review columns are untouched. Guarded by the caller for
/// role and by the WHERE clause against the terminal state.
pub async fn update_collection_fields(
    pool: &DbPool,
    id: &str,
    c: &Collection,
) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE collections SET transaction_date = ?1, nature_of_collection = ?2, category = ?3,
                subcategory = ?4, purpose = ?5, fund_source = ?6, amount = ?7, payor = ?8,
                or_number = ?9, remarks = ?10
         WHERE id = ?11 AND review_status != 'approved'",
        params![
            fmt_date(c.transaction_date),
            c.nature_of_collection,
            c.category,
            c.subcategory,
            c.purpose,
            c.fund_source,
            c.amount,
            c.payor,
            c.or_number,
            c.remarks,
            id,
        ],
    )?;
    Ok(changed > 0)
}

// --- Disbursements ---------------------------------------------------------

fn row_to_disbursement(row: &Row) -> rusqlite::Result<Disbursement> {
    Ok(Disbursement {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        transaction_date: col_date(row, 2)?,
        nature_of_disbursement: row.get(3)?,
        category: row.get(4)?,
        subcategory: row.get(5)?,
        program_description: row.get(6)?,
        fund_source: row.get(7)?,
        amount: row.get(8)?,
        payee: row.get(9)?,
        dv_number: row.get(10)?,
        remarks: row.get(11)?,
        review_status: row.get(12)?,
        review_comment: row.get(13)?,
        reviewed_by: row.get(14)?,
        reviewed_at: col_dt_opt(row, 15)?,
        checked_by: row.get(16)?,
        checked_at: col_dt_opt(row, 17)?,
        created_at: col_dt(row, 18)?,
    })
}

const DISBURSEMENT_COLS: &str = "id, transaction_id, transaction_date, nature_of_disbursement, category, subcategory, program_description, fund_source, amount, payee, dv_number, remarks, review_status, review_comment, reviewed_by, reviewed_at, checked_by, checked_at, created_at";

pub async fn add_disbursement(pool: &DbPool, d: &Disbursement) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO disbursements (id, transaction_id, transaction_date, nature_of_disbursement, category, subcategory, program_description, fund_source, amount, payee, dv_number, remarks, review_status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            d.id,
            d.transaction_id,
            fmt_date(d.transaction_date),
            d.nature_of_disbursement,
            d.category,
            d.subcategory,
            d.program_description,
            d.fund_source,
            d.amount,
            d.payee,
            d.dv_number,
            d.remarks,
            d.review_status,
            fmt_dt(d.created_at),
        ],
    )?;
    Ok(())
}

pub async fn list_disbursements(
    pool: &DbPool,
    status: Option<&str>,
) -> anyhow::Result<Vec<Disbursement>> {
    let conn = pool.get()?;
    let list = match status {
        Some(status) => {
            let sql = format!(
                "SELECT {DISBURSEMENT_COLS} FROM disbursements WHERE review_status = ?1 ORDER BY transaction_date DESC, created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status], row_to_disbursement)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!(
                "SELECT {DISBURSEMENT_COLS} FROM disbursements ORDER BY transaction_date DESC, created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_disbursement)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(list)
}

pub async fn get_disbursement(pool: &DbPool, id: &str) -> anyhow::Result<Option<Disbursement>> {
    let conn = pool.get()?;
    let sql = format!("SELECT {DISBURSEMENT_COLS} FROM disbursements WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_disbursement)?;
    Ok(rows.next().transpose()?)
}

pub async fn update_disbursement_fields(
    pool: &DbPool,
    id: &str,
    d: &Disbursement,
) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE disbursements SET transaction_date = ?1, nature_of_disbursement = ?2, category = ?3,
                subcategory = ?4, program_description = ?5, fund_source = ?6, amount = ?7,
                payee = ?8, dv_number = ?9, remarks = ?10
         WHERE id = ?11 AND review_status != 'approved'",
        params![
            fmt_date(d.transaction_date),
            d.nature_of_disbursement,
            d.category,
            d.subcategory,
            d.program_description,
            d.fund_source,
            d.amount,
            d.payee,
            d.dv_number,
            d.remarks,
            id,
        ],
    )?;
    Ok(changed > 0)
}

// --- DFUR projects ---------------------------------------------------------

fn row_to_dfur(row: &Row) -> rusqlite::Result<DfurProject> {
    Ok(DfurProject {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        transaction_date: col_date(row, 2)?,
        nature_of_collection: row.get(3)?,
        project: row.get(4)?,
        location: row.get(5)?,
        total_cost_approved: row.get(6)?,
        date_started: col_date(row, 7)?,
        target_completion_date: col_date(row, 8)?,
        status: row.get(9)?,
        total_cost_incurred: row.get(10)?,
        number_of_extensions: row.get(11)?,
        remarks: row.get(12)?,
        review_status: row.get(13)?,
        review_comment: row.get(14)?,
        reviewed_by: row.get(15)?,
        reviewed_at: col_dt_opt(row, 16)?,
        checked_by: row.get(17)?,
        checked_at: col_dt_opt(row, 18)?,
        created_at: col_dt(row, 19)?,
    })
}

const DFUR_COLS: &str = "id, transaction_id, transaction_date, nature_of_collection, project, location, total_cost_approved, date_started, target_completion_date, status, total_cost_incurred, number_of_extensions, remarks, review_status, review_comment, reviewed_by, reviewed_at, checked_by, checked_at, created_at";

pub async fn add_dfur_project(pool: &DbPool, p: &DfurProject) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO dfur_projects (id, transaction_id, transaction_date, nature_of_collection, project, location, total_cost_approved, date_started, target_completion_date, status, total_cost_incurred, number_of_extensions, remarks, review_status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            p.id,
            p.transaction_id,
            fmt_date(p.transaction_date),
            p.nature_of_collection,
            p.project,
            p.location,
            p.total_cost_approved,
            fmt_date(p.date_started),
            fmt_date(p.target_completion_date),
            p.status,
            p.total_cost_incurred,
            p.number_of_extensions,
            p.remarks,
            p.review_status,
            fmt_dt(p.created_at),
        ],
    )?;
    Ok(())
}

pub async fn list_dfur_projects(
    pool: &DbPool,
    status: Option<&str>,
) -> anyhow::Result<Vec<DfurProject>> {
    let conn = pool.get()?;
    let list = match status {
        Some(status) => {
            let sql = format!(
                "SELECT {DFUR_COLS} FROM dfur_projects WHERE review_status = ?1 ORDER BY transaction_date DESC, created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status], row_to_dfur)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!(
                "SELECT {DFUR_COLS} FROM dfur_projects ORDER BY transaction_date DESC, created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_dfur)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(list)
}

pub async fn get_dfur_project(pool: &DbPool, id: &str) -> anyhow::Result<Option<DfurProject>> {
    let conn = pool.get()?;
    let sql = format!("SELECT {DFUR_COLS} FROM dfur_projects WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_dfur)?;
    Ok(rows.next().transpose()?)
}

pub async fn update_dfur_project_fields(
    pool: &DbPool,
    id: &str,
    p: &DfurProject,
) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE dfur_projects SET transaction_date = ?1, nature_of_collection = ?2, project = ?3,
                location = ?4, total_cost_approved = ?5, date_started = ?6,
                target_completion_date = ?7, status = ?8, total_cost_incurred = ?9,
                number_of_extensions = ?10, remarks = ?11
         WHERE id = ?12 AND review_status != 'approved'",
        params![
            fmt_date(p.transaction_date),
            p.nature_of_collection,
            p.project,
            p.location,
            p.total_cost_approved,
            fmt_date(p.date_started),
            fmt_date(p.target_completion_date),
            p.status,
            p.total_cost_incurred,
            p.number_of_extensions,
            p.remarks,
            id,
        ],
    )?;
    Ok(changed > 0)
}

// --- Budget entries (ABO) --------------------------------------------------

fn row_to_budget_entry(row: &Row) -> rusqlite::Result<BudgetEntry> {
    Ok(BudgetEntry {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        transaction_date: col_date(row, 2)?,
        expenditure_program: row.get(3)?,
        category: row.get(4)?,
        subcategory: row.get(5)?,
        program_description: row.get(6)?,
        fund_source: row.get(7)?,
        amount: row.get(8)?,
        payee: row.get(9)?,
        dv_number: row.get(10)?,
        remarks: row.get(11)?,
        created_at: col_dt(row, 12)?,
    })
}

const BUDGET_ENTRY_COLS: &str = "id, transaction_id, transaction_date, expenditure_program, category, subcategory, program_description, fund_source, amount, payee, dv_number, remarks, created_at";

pub async fn add_budget_entry(pool: &DbPool, b: &BudgetEntry) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO budget_entries (id, transaction_id, transaction_date, expenditure_program, category, subcategory, program_description, fund_source, amount, payee, dv_number, remarks, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            b.id,
            b.transaction_id,
            fmt_date(b.transaction_date),
            b.expenditure_program,
            b.category,
            b.subcategory,
            b.program_description,
            b.fund_source,
            b.amount,
            b.payee,
            b.dv_number,
            b.remarks,
            fmt_dt(b.created_at),
        ],
    )?;
    Ok(())
}

pub async fn list_budget_entries(pool: &DbPool) -> anyhow::Result<Vec<BudgetEntry>> {
    let conn = pool.get()?;
    let sql = format!(
        "SELECT {BUDGET_ENTRY_COLS} FROM budget_entries ORDER BY transaction_date DESC, created_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_budget_entry)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub async fn get_budget_entry(pool: &DbPool, id: &str) -> anyhow::Result<Option<BudgetEntry>> {
    let conn = pool.get()?;
    let sql = format!("SELECT {BUDGET_ENTRY_COLS} FROM budget_entries WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_budget_entry)?;
    Ok(rows.next().transpose()?)
}

pub async fn update_budget_entry(pool: &DbPool, id: &str, b: &BudgetEntry) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE budget_entries SET transaction_date = ?1, expenditure_program = ?2, category = ?3,
                subcategory = ?4, program_description = ?5, fund_source = ?6, amount = ?7,
                payee = ?8, dv_number = ?9, remarks = ?10
         WHERE id = ?11",
        params![
            fmt_date(b.transaction_date),
            b.expenditure_program,
            b.category,
            b.subcategory,
            b.program_description,
            b.fund_source,
            b.amount,
            b.payee,
            b.dv_number,
            b.remarks,
            id,
        ],
    )?;
    Ok(changed > 0)
}

// --- Fund operations and budget allocations --------------------------------

pub async fn add_fund_operation(pool: &DbPool, f: &FundOperation) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO fund_operations (id, fund_type, opening_balance, receipts, disbursements, closing_balance, period, date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            f.id,
            f.fund_type,
            f.opening_balance,
            f.receipts,
            f.disbursements,
            f.closing_balance,
            f.period,
            fmt_date(f.date),
        ],
    )?;
    Ok(())
}

pub async fn list_fund_operations(pool: &DbPool) -> anyhow::Result<Vec<FundOperation>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, fund_type, opening_balance, receipts, disbursements, closing_balance, period, date
         FROM fund_operations ORDER BY date DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(FundOperation {
            id: row.get(0)?,
            fund_type: row.get(1)?,
            opening_balance: row.get(2)?,
            receipts: row.get(3)?,
            disbursements: row.get(4)?,
            closing_balance: row.get(5)?,
            period: row.get(6)?,
            date: col_date(row, 7)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub async fn add_budget_allocation(pool: &DbPool, a: &BudgetAllocation) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO budget_allocations (id, category, allocated_amount, utilized_amount, year)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![a.id, a.category, a.allocated_amount, a.utilized_amount, a.year],
    )?;
    Ok(())
}

pub async fn list_budget_allocations(
    pool: &DbPool,
    year: Option<i32>,
) -> anyhow::Result<Vec<BudgetAllocation>> {
    let conn = pool.get()?;
    let map = |row: &Row| -> rusqlite::Result<BudgetAllocation> {
        Ok(BudgetAllocation {
            id: row.get(0)?,
            category: row.get(1)?,
            allocated_amount: row.get(2)?,
            utilized_amount: row.get(3)?,
            year: row.get(4)?,
        })
    };
    let list = match year {
        Some(year) => {
            let mut stmt = conn.prepare(
                "SELECT id, category, allocated_amount, utilized_amount, year
                 FROM budget_allocations WHERE year = ?1 ORDER BY category",
            )?;
            let rows = stmt.query_map(params![year], map)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, category, allocated_amount, utilized_amount, year
                 FROM budget_allocations ORDER BY year DESC, category",
            )?;
            let rows = stmt.query_map([], map)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(list)
}

// --- Users -----------------------------------------------------------------

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let active: i64 = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        role: row.get(3)?,
        full_name: row.get(4)?,
        position: row.get(5)?,
        is_active: active != 0,
        created_at: col_dt(row, 7)?,
        last_login: col_dt_opt(row, 8)?,
    })
}

const USER_COLS: &str =
    "id, username, password, role, full_name, position, is_active, created_at, last_login";

pub async fn create_user(pool: &DbPool, u: &User) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO users (id, username, password, role, full_name, position, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            u.id,
            u.username,
            u.password,
            u.role,
            u.full_name,
            u.position,
            u.is_active as i64,
            fmt_dt(u.created_at),
        ],
    )?;
    Ok(())
}

pub async fn find_user_by_username(pool: &DbPool, username: &str) -> anyhow::Result<Option<User>> {
    let conn = pool.get()?;
    let sql = format!("SELECT {USER_COLS} FROM users WHERE username = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![username], row_to_user)?;
    Ok(rows.next().transpose()?)
}

pub async fn get_user(pool: &DbPool, id: &str) -> anyhow::Result<Option<User>> {
    let conn = pool.get()?;
    let sql = format!("SELECT {USER_COLS} FROM users WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_user)?;
    Ok(rows.next().transpose()?)
}

pub async fn list_users(pool: &DbPool) -> anyhow::Result<Vec<User>> {
    let conn = pool.get()?;
    let sql = format!("SELECT {USER_COLS} FROM users ORDER BY username");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_user)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub async fn update_user(
    pool: &DbPool,
    id: &str,
    role: &str,
    full_name: &str,
    position: &str,
    is_active: bool,
    password: Option<&str>,
) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = match password {
        Some(hash) => conn.execute(
            "UPDATE users SET role = ?1, full_name = ?2, position = ?3, is_active = ?4, password = ?5
             WHERE id = ?6",
            params![role, full_name, position, is_active as i64, hash, id],
        )?,
        None => conn.execute(
            "UPDATE users SET role = ?1, full_name = ?2, position = ?3, is_active = ?4
             WHERE id = ?5",
            params![role, full_name, position, is_active as i64, id],
        )?,
    };
    Ok(changed > 0)
}

pub async fn touch_last_login(pool: &DbPool, id: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute("UPDATE users SET last_login = ?1 WHERE id = ?2", params![fmt_dt(now), id])?;
    Ok(())
}

// --- Viewer comments -------------------------------------------------------

fn row_to_comment(row: &Row) -> rusqlite::Result<ViewerComment> {
    Ok(ViewerComment {
        id: row.get(0)?,
        name: row.get(1)?,
        contact_info: row.get(2)?,
        message: row.get(3)?,
        context_type: row.get(4)?,
        context_id: row.get(5)?,
        status: row.get(6)?,
        reviewed_by: row.get(7)?,
        reviewed_at: col_dt_opt(row, 8)?,
        created_at: col_dt(row, 9)?,
    })
}

const COMMENT_COLS: &str = "id, name, contact_info, message, context_type, context_id, status, reviewed_by, reviewed_at, created_at";

pub async fn add_viewer_comment(pool: &DbPool, c: &ViewerComment) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO viewer_comments (id, name, contact_info, message, context_type, context_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            c.id,
            c.name,
            c.contact_info,
            c.message,
            c.context_type,
            c.context_id,
            c.status,
            fmt_dt(c.created_at),
        ],
    )?;
    Ok(())
}

pub async fn list_viewer_comments(
    pool: &DbPool,
    status: Option<&str>,
) -> anyhow::Result<Vec<ViewerComment>> {
    let conn = pool.get()?;
    let list = match status {
        Some(status) => {
            let sql = format!(
                "SELECT {COMMENT_COLS} FROM viewer_comments WHERE status = ?1 ORDER BY created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status], row_to_comment)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql =
                format!("SELECT {COMMENT_COLS} FROM viewer_comments ORDER BY created_at DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_comment)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(list)
}

pub async fn set_viewer_comment_status(
    pool: &DbPool,
    id: &str,
    status: &str,
    reviewer: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE viewer_comments SET status = ?1, reviewed_by = ?2, reviewed_at = ?3 WHERE id = ?4",
        params![status, reviewer, fmt_dt(now), id],
    )?;
    Ok(changed > 0)
}

// --- Reports ---------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize)]
pub struct FinancialSummary {
    pub total_collections: f64,
    pub total_disbursements: f64,
    pub net_balance: f64,
    pub pending_count: i64,
    pub flagged_count: i64,
}

/// Totals cover approved transactions only; pending/flagged counts span all
/// three reviewed record kinds.
pub async fn financial_summary(pool: &DbPool) -> anyhow::Result<FinancialSummary> {
    let conn = pool.get()?;

    let total_collections: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM collections WHERE review_status = 'approved'",
        [],
        |row| row.get(0),
    )?;
    let total_disbursements: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM disbursements WHERE review_status = 'approved'",
        [],
        |row| row.get(0),
    )?;

    let count_status = |status: &str| -> rusqlite::Result<i64> {
        conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM collections WHERE review_status = ?1)
              + (SELECT COUNT(*) FROM disbursements WHERE review_status = ?1)
              + (SELECT COUNT(*) FROM dfur_projects WHERE review_status = ?1)",
            params![status],
            |row| row.get(0),
        )
    };

    Ok(FinancialSummary {
        total_collections,
        total_disbursements,
        net_balance: total_collections - total_disbursements,
        pending_count: count_status("pending")?,
        flagged_count: count_status("flagged")?,
    })
}
