// HTTP API routes (demon catalog, player roster, leaderboard).

pub mod demons;
pub mod players;

use std::path::Path;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequest, Request},
    handler::HandlerWithoutStateExt,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::error::{AppError, StoreError};
use crate::metrics;
use crate::store::Repository;

const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
}

// ── JSON body extractor ───────────────────────────────────────────────

/// `Json` whose rejections are reported as `{ "error": ... }` like every
/// other API error.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

// ── Error helper ──────────────────────────────────────────────────────

/// Map a failed save to the message the caller sees.
fn save_failed(context: &'static str) -> impl FnOnce(StoreError) -> AppError {
    move |source| AppError::Persistence { context, source }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(repo: Repository) -> Router {
    let state = AppState { repo };

    Router::new()
        // Demons
        .route(
            "/api/demons",
            get(demons::list_demons).post(demons::create_demon),
        )
        .route(
            "/api/demons/{id}",
            get(demons::get_demon)
                .put(demons::update_demon)
                .delete(demons::delete_demon),
        )
        // Players
        .route(
            "/api/players",
            get(players::list_players).post(players::create_player),
        )
        .route(
            "/api/players/{id}",
            get(players::get_player)
                .put(players::update_player)
                .delete(players::delete_player),
        )
        .route("/api/players/{id}/demons", put(players::update_progress))
        .with_state(state)
}

/// The full application: API routes, health and metrics endpoints, optional
/// static front-end, and the shared middleware stack.
pub fn app(repo: Repository, static_dir: Option<&Path>) -> Router {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .merge(router(repo));

    let app = match static_dir {
        Some(dir) => app.fallback_service(
            ServeDir::new(dir)
                .call_fallback_on_method_not_allowed(true)
                .not_found_service(route_not_found.into_service()),
        ),
        None => app.fallback(route_not_found),
    };

    app.layer(axum::middleware::from_fn(metrics::track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "message": "Geometry Dash Demon List API is running!",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

async fn route_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Route not found" })),
    )
}
