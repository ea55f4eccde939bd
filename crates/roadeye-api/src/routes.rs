use axum::{
    Router,
    routing::{get, post},
};

use crate::{AppState, auth, hazards};

/// Every endpoint. Handlers that need a caller identity take the
/// `Authenticated` extractor; the rest are public.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/profile", get(auth::profile))
        .route("/hazards", get(hazards::nearby))
        .route("/hazards/report", post(hazards::report))
        .route("/hazards/{id}", get(hazards::get_by_id).delete(hazards::delete))
        .route("/hazards/{id}/verify", post(hazards::verify))
        .with_state(state)
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}
