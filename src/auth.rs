use std::env;
use std::future::Future;

use axum::{
    extract::{FromRequestParts, Json, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::review::Role;
use crate::AppState;

const AUTH_COOKIE_NAME: &str = "auth_token";

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    user: UserProfile,
}

#[derive(Serialize, Clone)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub position: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    username: String,
    role: String,
    iss: Option<String>,
    aud: Option<String>,
}

/// Request identity decoded from the JWT. The role here is whatever the token
/// was minted with; deactivating a user invalidates their next login, not
/// tokens already issued (tokens expire after a day).
pub struct AuthenticatedUser {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync + 'static,
{
    type Rejection = (StatusCode, String);

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let token = extract_token_from_headers(&parts.headers)
                .ok_or((StatusCode::UNAUTHORIZED, "Missing auth token".to_string()))?;
            let claims = validate_token_str(&token).map_err(|e| {
                tracing::warn!("Token error: {}", e);
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            })?;
            let role = Role::parse(&claims.role)
                .ok_or((StatusCode::UNAUTHORIZED, "Unknown role".to_string()))?;

            Ok(AuthenticatedUser { id: claims.sub, username: claims.username, role })
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    let user = match crate::db::find_user_by_username(&state.db, &payload.username).await {
        Ok(Some(u)) => u,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response(),
        Err(e) => {
            tracing::error!("Login lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    if !user.is_active {
        return (StatusCode::FORBIDDEN, "Account is deactivated").into_response();
    }
    if !verify_password(&payload.password, &user.password) {
        return (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response();
    }
    let Some(role) = Role::parse(&user.role) else {
        tracing::error!("User {} has unrecognized role {}", user.username, user.role);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Invalid account").into_response();
    };

    if let Err(e) = crate::db::touch_last_login(&state.db, &user.id, Utc::now()).await {
        tracing::warn!("Failed to stamp last_login for {}: {}", user.username, e);
    }

    let profile = UserProfile {
        id: user.id,
        username: user.username,
        full_name: user.full_name,
        position: user.position,
        role,
    };

    match create_jwt(&profile) {
        Ok(token) => {
            let cookie = build_auth_cookie(&token);
            let mut response = Json(AuthResponse { user: profile }).into_response();
            response
                .headers_mut()
                .insert(header::SET_COOKIE, HeaderValue::from_str(&cookie).unwrap());
            response
        }
        Err(e) => {
            tracing::error!("JWT creation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Auth failed").into_response()
        }
    }
}

pub async fn logout() -> impl IntoResponse {
    let cookie = clear_auth_cookie();
    let mut response = (StatusCode::OK, "OK").into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, HeaderValue::from_str(&cookie).unwrap());
    response
}

pub async fn me(State(state): State<AppState>, user: AuthenticatedUser) -> impl IntoResponse {
    match crate::db::get_user(&state.db, &user.id).await {
        Ok(Some(u)) => Json(UserProfile {
            id: u.id,
            username: u.username,
            full_name: u.full_name,
            position: u.position,
            role: user.role,
        })
        .into_response(),
        Ok(None) => (StatusCode::UNAUTHORIZED, "Unknown user").into_response(),
        Err(e) => {
            tracing::error!("Profile lookup failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

fn create_jwt(user: &UserProfile) -> anyhow::Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| anyhow::anyhow!("timestamp overflow"))?
        .timestamp();

    let claims = Claims {
        sub: user.id.clone(),
        username: user.username.clone(),
        role: user.role.as_str().to_string(),
        exp: expiration as usize,
        iss: env::var("JWT_ISSUER").ok(),
        aud: env::var("JWT_AUDIENCE").ok(),
    };

    let secret = env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))?;
    Ok(token)
}

fn validate_token_str(token: &str) -> anyhow::Result<Claims> {
    let secret = env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

    let mut validation = Validation::default();
    validation.validate_exp = true;
    if let Ok(issuer) = env::var("JWT_ISSUER") {
        validation.set_issuer(&[issuer.as_str()]);
    }
    if let Ok(audience) = env::var("JWT_AUDIENCE") {
        validation.set_audience(&[audience.as_str()]);
    }

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_ref()), &validation)?;
    Ok(data.claims)
}

/// Used by the router-level guard; handlers get the full claims through the
/// `AuthenticatedUser` extractor.
pub fn token_is_valid(token: &str) -> bool {
    validate_token_str(token).is_ok()
}

pub fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|h| h.to_str().ok()) {
        for cookie in cookie_header.split(';') {
            let cookie = cookie.trim();
            if let Some((k, v)) = cookie.split_once('=') {
                if k == AUTH_COOKIE_NAME {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

fn build_auth_cookie(token: &str) -> String {
    let secure = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production";
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=86400",
        AUTH_COOKIE_NAME, token
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_auth_cookie() -> String {
    let secure = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production";
    let mut cookie =
        format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", AUTH_COOKIE_NAME);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

// Password hashing: random 16-byte salt, SHA-256 over salt || password,
// stored as "salt$digest" hex.

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = salted_digest(&salt, password);
    format!("{}${}", hex::encode(salt), digest)
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    salted_digest(&salt, password) == digest
}

fn salted_digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let stored = hash_password("kapitan123");
        assert!(verify_password("kapitan123", &stored));
        assert!(!verify_password("kapitan124", &stored));
    }

    #[test]
    fn distinct_salts() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn malformed_hash_rejected() {
        assert!(!verify_password("x", "not-a-hash"));
        assert!(!verify_password("x", "zz$aa"));
    }
}
