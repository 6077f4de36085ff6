use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::{from_fn, Next},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use barangay_fms::{auth, db, routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    // Ensure critical environment variables are set
    env::var("JWT_SECRET").expect("JWT_SECRET must be set");

    // Initialize Tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "barangay_fms=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting barangay financial monitoring service...");

    tracing::info!("Initializing database connection pool...");
    let db_pool = db::init_pool().await?;
    tracing::info!("Database connection pool initialized successfully");

    let state = AppState { db: db_pool };

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(
                env::var("RATE_LIMIT_PER_SECOND")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1200),
            )
            .burst_size(
                env::var("RATE_LIMIT_BURST")
                    .ok()
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(2400),
            )
            .finish()
            .expect("governor config"),
    );

    // CORS configuration (no permissive mode)
    let cors = {
        let env_mode = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());
        let origins = env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|v| {
                v.split(',')
                    .filter_map(|s| {
                        let trimmed = s.trim();
                        if trimmed.is_empty() {
                            return None;
                        }
                        match trimmed.parse::<HeaderValue>() {
                            Ok(value) => Some(value),
                            Err(_) => {
                                tracing::warn!(
                                    "Ignoring invalid ALLOWED_ORIGINS entry: {}",
                                    trimmed
                                );
                                None
                            }
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| {
                if env_mode == "production" {
                    panic!("ALLOWED_ORIGINS must be set in production")
                }
                vec![
                    HeaderValue::from_static("http://localhost:3000"),
                    HeaderValue::from_static("http://127.0.0.1:3000"),
                ]
            });

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .allow_credentials(true)
    };

    // Router Setup
    let app = Router::new()
        .route("/health", get(health_check))
        // Auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/me", get(auth::me))
        // Collections (receipts)
        .route(
            "/api/collections",
            get(routes::collections::list_collections)
                .post(routes::collections::create_collection),
        )
        .route("/api/collections/{id}", axum::routing::put(routes::collections::update_collection))
        .route("/api/collections/{id}/review", post(routes::collections::review_collection))
        // Disbursements (expenditures)
        .route(
            "/api/disbursements",
            get(routes::disbursements::list_disbursements)
                .post(routes::disbursements::create_disbursement),
        )
        .route(
            "/api/disbursements/{id}",
            axum::routing::put(routes::disbursements::update_disbursement),
        )
        .route("/api/disbursements/{id}/review", post(routes::disbursements::review_disbursement))
        // DFUR projects
        .route(
            "/api/dfur-projects",
            get(routes::dfur::list_dfur_projects).post(routes::dfur::create_dfur_project),
        )
        .route("/api/dfur-projects/{id}", axum::routing::put(routes::dfur::update_dfur_project))
        .route("/api/dfur-projects/{id}/review", post(routes::dfur::review_dfur_project))
        // ABO budget entries and allocations
        .route(
            "/api/budget-entries",
            get(routes::budget::list_budget_entries).post(routes::budget::create_budget_entry),
        )
        .route("/api/budget-entries/{id}", axum::routing::put(routes::budget::update_budget_entry))
        .route(
            "/api/budget-allocations",
            get(routes::budget::list_budget_allocations)
                .post(routes::budget::create_budget_allocation),
        )
        // Fund operations
        .route(
            "/api/fund-operations",
            get(routes::funds::list_fund_operations).post(routes::funds::create_fund_operation),
        )
        // Users (admin)
        .route("/api/users", get(routes::users::list_users).post(routes::users::create_user))
        .route("/api/users/{id}", axum::routing::put(routes::users::update_user))
        // Viewer comments
        .route(
            "/api/comments",
            get(routes::comments::list_comments).post(routes::comments::create_comment),
        )
        .route("/api/comments/{id}/review", post(routes::comments::moderate_comment))
        // Activity log and reports
        .route("/api/activity", get(routes::activity::list_activity))
        .route("/api/activity/export", get(routes::activity::export_activity_csv))
        .route("/api/reports/summary", get(routes::reports::summary))
        .route("/api/reports/sre/export", get(routes::reports::export_sre_csv))
        .layer(from_fn(require_auth))
        .layer(cors)
        .layer(GovernorLayer::new(governor_config))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .with_state(state);

    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}

async fn health_check() -> &'static str {
    "OK"
}

/// Endpoints reachable without a token: login, logout, and public viewer
/// comment submission. Everything else under /api/ requires a valid JWT.
fn is_public(path: &str, method: &axum::http::Method) -> bool {
    matches!(path, "/api/auth/login" | "/api/auth/logout")
        || (path == "/api/comments" && method == axum::http::Method::POST)
}

async fn require_auth(req: Request<Body>, next: Next) -> impl IntoResponse {
    let path = req.uri().path();
    if req.method() == axum::http::Method::OPTIONS
        || !path.starts_with("/api/")
        || is_public(path, req.method())
    {
        return next.run(req).await;
    }

    let headers: &HeaderMap = req.headers();
    if let Some(token) = auth::extract_token_from_headers(headers) {
        if auth::token_is_valid(&token) {
            return next.run(req).await;
        }
    }

    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}
