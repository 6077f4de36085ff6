use std::sync::OnceLock;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use barangay_fms::auth::{self, AuthenticatedUser};
use barangay_fms::db::{self, models::{Disbursement, User}, RecordKind};
use barangay_fms::review::{self, ReviewAction, ReviewEffect, ReviewStatus, Role};
use barangay_fms::routes;
use barangay_fms::AppState;
use chrono::Utc;
use uuid::Uuid;

static DB_DIR: OnceLock<tempfile::TempDir> = OnceLock::new();

fn setup_db_env() {
    let dir = DB_DIR.get_or_init(|| tempfile::tempdir().expect("tempdir"));
    std::env::set_var("DATABASE_PATH", dir.path().join("test.db"));
}

fn user_with(role: Role, username: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        role,
    }
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn sample_disbursement(transaction_id: &str) -> Disbursement {
    Disbursement {
        id: Uuid::new_v4().to_string(),
        transaction_id: transaction_id.to_string(),
        transaction_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 7).expect("valid date"),
        nature_of_disbursement: "Road repair materials".to_string(),
        category: "Economic Services".to_string(),
        subcategory: "Infrastructure".to_string(),
        program_description: None,
        fund_source: "General Fund".to_string(),
        amount: 8200.0,
        payee: "ACME Hardware".to_string(),
        dv_number: "DV-2026-0101".to_string(),
        remarks: None,
        review_status: ReviewStatus::Pending.as_str().to_string(),
        review_comment: None,
        reviewed_by: None,
        reviewed_at: None,
        checked_by: None,
        checked_at: None,
        created_at: Utc::now(),
    }
}

async fn log_for(pool: &db::DbPool, txid: &str, kind: RecordKind, amount: f64, category: &str, status: &str, comment: Option<&str>, actor: &str) {
    let id = Uuid::new_v4().to_string();
    db::log_activity(pool, &id, txid, kind.as_str(), amount, category, status, comment, actor, Utc::now())
        .await
        .expect("log_activity");
}

#[tokio::test]
async fn collection_moves_through_check_and_approval() {
    setup_db_env();
    let pool = db::init_pool().await.expect("init pool");
    let state = AppState { db: pool.clone() };

    // Creation goes through the route handler so the audit append is the
    // production path, not a test shim.
    let txid = format!("COL-{}", Uuid::new_v4());
    let resp = routes::collections::create_collection(
        State(state.clone()),
        user_with(Role::Encoder, "encoder1"),
        Json(routes::collections::CreateCollectionRequest {
            transaction_id: Some(txid.clone()),
            transaction_date: "2026-03-05".to_string(),
            nature_of_collection: "Business permit fee".to_string(),
            category: "INTERNAL SOURCES: NON TAX REVENUE".to_string(),
            subcategory: Some("Service and Business Income".to_string()),
            purpose: None,
            fund_source: "General Fund".to_string(),
            amount: 1500.0,
            payor: "J. dela Cruz".to_string(),
            or_number: "OR-2026-0042".to_string(),
            remarks: None,
        }),
    )
    .await
    .into_response();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_json(resp).await["id"].as_str().expect("id").to_string();

    // Exactly one creation entry, status pending.
    let entries = db::list_activity(&pool, None).await.expect("list_activity");
    let created: Vec<_> = entries.iter().filter(|e| e.transaction_id == txid).collect();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].status, "pending");
    assert_eq!(created[0].actor, "encoder1");

    let snap = db::get_review_snapshot(&pool, RecordKind::Collection, &id)
        .await
        .expect("snapshot")
        .expect("record exists");
    assert_eq!(snap.state.status, ReviewStatus::Pending);
    assert!(!snap.state.checked);

    // Checker marks it ready for approval.
    let effect = review::evaluate(Role::Checker, ReviewAction::Check, snap.state, None).expect("check allowed");
    assert_eq!(effect, ReviewEffect::Checked);
    let applied = db::apply_review(&pool, RecordKind::Collection, &id, snap.state.status, effect, "checker1", None, Utc::now())
        .await
        .expect("apply check");
    assert!(applied);

    let snap = db::get_review_snapshot(&pool, RecordKind::Collection, &id)
        .await
        .expect("snapshot")
        .expect("record exists");
    assert_eq!(snap.state.status, ReviewStatus::Pending);
    assert!(snap.state.checked);

    // Approver issues the final disposition.
    let effect = review::evaluate(Role::Approver, ReviewAction::Approve, snap.state, None).expect("approve allowed");
    let applied = db::apply_review(&pool, RecordKind::Collection, &id, snap.state.status, effect, "approver1", None, Utc::now())
        .await
        .expect("apply approve");
    assert!(applied);
    log_for(&pool, &txid, RecordKind::Collection, snap.amount, &snap.category, "approved", None, "approver1").await;

    let stored = db::get_collection(&pool, &id).await.expect("get").expect("exists");
    assert_eq!(stored.review_status, "approved");
    assert_eq!(stored.reviewed_by.as_deref(), Some("approver1"));

    // Approved is terminal: guard rejects, and a stale write is a no-op.
    let snap = db::get_review_snapshot(&pool, RecordKind::Collection, &id)
        .await
        .expect("snapshot")
        .expect("record exists");
    let err = review::evaluate(Role::Admin, ReviewAction::Flag, snap.state, Some("too late")).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::CONFLICT);
    let stale = db::apply_review(
        &pool,
        RecordKind::Collection,
        &id,
        ReviewStatus::Pending,
        ReviewEffect::Flagged,
        "checker1",
        Some("stale"),
        Utc::now(),
    )
    .await
    .expect("stale apply");
    assert!(!stale);

    // Field edits are blocked on approved records too.
    let edited = db::update_collection_fields(&pool, &id, &stored).await.expect("update");
    assert!(!edited);
}

#[tokio::test]
async fn flagged_disbursement_resubmits_and_log_keeps_comment() {
    setup_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let txid = format!("DIS-{}", Uuid::new_v4());
    let record = sample_disbursement(&txid);
    db::add_disbursement(&pool, &record).await.expect("add_disbursement");
    log_for(&pool, &txid, RecordKind::Disbursement, record.amount, &record.category, "pending", None, "encoder1").await;

    let snap = db::get_review_snapshot(&pool, RecordKind::Disbursement, &record.id)
        .await
        .expect("snapshot")
        .expect("record exists");

    // Checker flags with a mandatory comment.
    let comment = "DV number does not match the voucher";
    let effect = review::evaluate(Role::Checker, ReviewAction::Flag, snap.state, Some(comment)).expect("flag allowed");
    let applied = db::apply_review(&pool, RecordKind::Disbursement, &record.id, snap.state.status, effect, "checker1", Some(comment), Utc::now())
        .await
        .expect("apply flag");
    assert!(applied);
    log_for(&pool, &txid, RecordKind::Disbursement, snap.amount, &snap.category, "flagged", Some(comment), "checker1").await;

    let stored = db::get_disbursement(&pool, &record.id).await.expect("get").expect("exists");
    assert_eq!(stored.review_status, "flagged");
    assert_eq!(stored.review_comment.as_deref(), Some(comment));

    // Encoder corrects and re-submits; the record's review fields reset.
    let snap = db::get_review_snapshot(&pool, RecordKind::Disbursement, &record.id)
        .await
        .expect("snapshot")
        .expect("record exists");
    let effect = review::evaluate(Role::Encoder, ReviewAction::Resubmit, snap.state, None).expect("resubmit allowed");
    let applied = db::apply_review(&pool, RecordKind::Disbursement, &record.id, snap.state.status, effect, "encoder1", None, Utc::now())
        .await
        .expect("apply resubmit");
    assert!(applied);
    log_for(&pool, &txid, RecordKind::Disbursement, snap.amount, &snap.category, "pending", None, "encoder1").await;

    let stored = db::get_disbursement(&pool, &record.id).await.expect("get").expect("exists");
    assert_eq!(stored.review_status, "pending");
    assert!(stored.review_comment.is_none());
    assert!(stored.reviewed_by.is_none());
    assert!(stored.checked_by.is_none());

    // The activity log still holds the checker's comment.
    let entries = db::list_activity(&pool, None).await.expect("list_activity");
    let flagged: Vec<_> = entries
        .iter()
        .filter(|e| e.transaction_id == txid && e.status == "flagged")
        .collect();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].comment.as_deref(), Some(comment));
    assert_eq!(flagged[0].actor, "checker1");
}

#[tokio::test]
async fn admin_cannot_modify_superadmin_account() {
    setup_db_env();
    let pool = db::init_pool().await.expect("init pool");
    let state = AppState { db: pool.clone() };

    let account = User {
        id: Uuid::new_v4().to_string(),
        username: format!("root-{}", Uuid::new_v4()),
        password: auth::hash_password("original-pass"),
        role: Role::Superadmin.as_str().to_string(),
        full_name: "System Administrator".to_string(),
        position: "Administrator".to_string(),
        is_active: true,
        created_at: Utc::now(),
        last_login: None,
    };
    db::create_user(&pool, &account).await.expect("seed superadmin");

    // A plain admin omitting the role field must still be rejected; the
    // request would otherwise reset the password and deactivate the account.
    let resp = routes::users::update_user(
        Path(account.id.clone()),
        State(state.clone()),
        user_with(Role::Admin, "admin1"),
        Json(routes::users::UpdateUserRequest {
            role: None,
            full_name: None,
            position: None,
            is_active: Some(false),
            password: Some("hijacked-pass".to_string()),
        }),
    )
    .await
    .into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let stored = db::get_user(&pool, &account.id).await.expect("get").expect("exists");
    assert!(stored.is_active);
    assert!(auth::verify_password("original-pass", &stored.password));
    assert!(!auth::verify_password("hijacked-pass", &stored.password));

    // Promoting another user to superadmin is equally off limits to admins.
    let target = User {
        id: Uuid::new_v4().to_string(),
        username: format!("enc-{}", Uuid::new_v4()),
        password: auth::hash_password("encoder-pass"),
        role: Role::Encoder.as_str().to_string(),
        full_name: "Field Encoder".to_string(),
        position: "Clerk".to_string(),
        is_active: true,
        created_at: Utc::now(),
        last_login: None,
    };
    db::create_user(&pool, &target).await.expect("seed encoder");
    let resp = routes::users::update_user(
        Path(target.id.clone()),
        State(state.clone()),
        user_with(Role::Admin, "admin1"),
        Json(routes::users::UpdateUserRequest {
            role: Some(Role::Superadmin.as_str().to_string()),
            full_name: None,
            position: None,
            is_active: None,
            password: None,
        }),
    )
    .await
    .into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // A superadmin may still manage the account.
    let resp = routes::users::update_user(
        Path(account.id.clone()),
        State(state),
        user_with(Role::Superadmin, "root"),
        Json(routes::users::UpdateUserRequest {
            role: None,
            full_name: None,
            position: None,
            is_active: None,
            password: Some("rotated-pass".to_string()),
        }),
    )
    .await
    .into_response();
    assert_eq!(resp.status(), StatusCode::OK);
    let stored = db::get_user(&pool, &account.id).await.expect("get").expect("exists");
    assert!(auth::verify_password("rotated-pass", &stored.password));
}

#[tokio::test]
async fn activity_export_rejects_malformed_since() {
    setup_db_env();
    let pool = db::init_pool().await.expect("init pool");
    let state = AppState { db: pool };

    let resp = routes::activity::export_activity_csv(
        State(state.clone()),
        user_with(Role::Admin, "admin1"),
        Query(routes::activity::ActivityParams { since: Some("not-a-timestamp".to_string()) }),
    )
    .await
    .into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // A well-formed bound still exports.
    let resp = routes::activity::export_activity_csv(
        State(state),
        user_with(Role::Admin, "admin1"),
        Query(routes::activity::ActivityParams {
            since: Some("2026-01-01T00:00:00+00:00".to_string()),
        }),
    )
    .await
    .into_response();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn comment_length_counts_characters_not_bytes() {
    setup_db_env();
    let pool = db::init_pool().await.expect("init pool");
    let state = AppState { db: pool };

    // 600 characters, 1200 bytes; within the 1000-character limit.
    let resp = routes::comments::create_comment(
        State(state.clone()),
        Json(routes::comments::CreateCommentRequest {
            name: None,
            contact_info: None,
            message: "ñ".repeat(600),
            context_type: None,
            context_id: None,
        }),
    )
    .await
    .into_response();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // 1001 characters is over the limit regardless of encoding width.
    let resp = routes::comments::create_comment(
        State(state),
        Json(routes::comments::CreateCommentRequest {
            name: None,
            contact_info: None,
            message: "ñ".repeat(1001),
            context_type: None,
            context_id: None,
        }),
    )
    .await
    .into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
