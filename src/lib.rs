pub mod auth;
pub mod db;
pub mod review;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db: db::DbPool,
}
