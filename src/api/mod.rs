pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::alerts::AlertService;

/// Everything handlers need: the store plus the alert pipeline (which
/// carries the push transport and the cooldown gate).
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub alerts: AlertService,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/sensors/current", get(handlers::get_current_reading))
        .route("/sensors/reading", post(handlers::post_reading))
        .route("/status", get(handlers::get_status))
        .route(
            "/thresholds",
            get(handlers::get_thresholds).put(handlers::put_thresholds),
        )
        .route("/notifications/send", post(handlers::send_notification))
        .route("/notifications/subscribe", post(handlers::subscribe))
        .route("/logs", get(handlers::get_logs).delete(handlers::clear_logs))
        .route("/logs/export", get(handlers::export_logs))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
