//! User administration. Admin/superadmin only; password hashes never leave
//! the db layer serialized.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{self, AuthenticatedUser};
use crate::db::{self, models::User};
use crate::review::Role;
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: String,
    pub full_name: String,
    pub position: String,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub is_active: Option<bool>,
    /// Plaintext replacement password; hashed before storage.
    pub password: Option<String>,
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    if let Err(e) = super::require_admin(&user) {
        return e.into_response();
    }

    let checks = (|| {
        let username = super::non_empty("username", &req.username)?;
        if username.len() < 3 {
            return Err((
                StatusCode::BAD_REQUEST,
                "username: must be at least 3 characters".to_string(),
            ));
        }
        if req.password.len() < 6 {
            return Err((
                StatusCode::BAD_REQUEST,
                "password: must be at least 6 characters".to_string(),
            ));
        }
        let full_name = super::non_empty("full_name", &req.full_name)?;
        let position = super::non_empty("position", &req.position)?;
        let Some(role) = Role::parse(&req.role) else {
            return Err((StatusCode::BAD_REQUEST, "role: unknown role".to_string()));
        };
        Ok((username, full_name, position, role))
    })();
    let (username, full_name, position, role) = match checks {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };

    // Only a superadmin may mint another superadmin.
    if role == Role::Superadmin && user.role != Role::Superadmin {
        return (StatusCode::FORBIDDEN, "Only a superadmin can create superadmins")
            .into_response();
    }

    let record = User {
        id: Uuid::new_v4().to_string(),
        username,
        password: auth::hash_password(&req.password),
        role: role.as_str().to_string(),
        full_name,
        position,
        is_active: true,
        created_at: Utc::now(),
        last_login: None,
    };

    if let Err(e) = db::create_user(&state.db, &record).await {
        if db::is_unique_violation(&e) {
            return (StatusCode::CONFLICT, "username already exists").into_response();
        }
        tracing::error!("User insert failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    (
        StatusCode::CREATED,
        AxumJson(serde_json::json!({ "status": "created", "id": record.id })),
    )
        .into_response()
}

pub async fn list_users(State(state): State<AppState>, user: AuthenticatedUser) -> impl IntoResponse {
    if let Err(e) = super::require_admin(&user) {
        return e.into_response();
    }
    match db::list_users(&state.db).await {
        Ok(list) => AxumJson(serde_json::json!({ "users": list })).into_response(),
        Err(e) => {
            tracing::error!("User query error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn update_user(
    Path(id): Path<String>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<UpdateUserRequest>,
) -> impl IntoResponse {
    if let Err(e) = super::require_admin(&user) {
        return e.into_response();
    }

    let mut record = match db::get_user(&state.db, &id).await {
        Ok(Some(u)) => u,
        Ok(None) => return (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("User lookup error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    // Superadmin accounts, and promotions to superadmin, are off limits to
    // plain admins no matter which fields the request touches.
    if (record.role == Role::Superadmin.as_str()
        || req.role.as_deref() == Some(Role::Superadmin.as_str()))
        && user.role != Role::Superadmin
    {
        return (StatusCode::FORBIDDEN, "Only a superadmin can modify superadmin accounts")
            .into_response();
    }

    if let Some(role_raw) = req.role.as_deref() {
        let Some(role) = Role::parse(role_raw) else {
            return (StatusCode::BAD_REQUEST, "role: unknown role".to_string()).into_response();
        };
        record.role = role.as_str().to_string();
    }
    if let Some(v) = req.full_name.as_deref() {
        record.full_name = match super::non_empty("full_name", v) {
            Ok(s) => s,
            Err(e) => return e.into_response(),
        };
    }
    if let Some(v) = req.position.as_deref() {
        record.position = match super::non_empty("position", v) {
            Ok(s) => s,
            Err(e) => return e.into_response(),
        };
    }
    if let Some(active) = req.is_active {
        record.is_active = active;
    }
    let new_hash = match req.password.as_deref() {
        Some(p) if p.len() < 6 => {
            return (
                StatusCode::BAD_REQUEST,
                "password: must be at least 6 characters".to_string(),
            )
                .into_response();
        }
        Some(p) => Some(auth::hash_password(p)),
        None => None,
    };

    match db::update_user(
        &state.db,
        &id,
        &record.role,
        &record.full_name,
        &record.position,
        record.is_active,
        new_hash.as_deref(),
    )
    .await
    {
        Ok(true) => AxumJson(serde_json::json!({ "status": "updated", "id": id })).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("User update error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
