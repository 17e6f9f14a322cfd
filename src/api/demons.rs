// Demon catalog handlers. A demon's rank is its position in the stored list.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use super::{save_failed, ApiJson, AppState};
use crate::error::AppError;
use crate::leaderboard::ranked_demons;
use crate::models::{Demon, DemonUpdate, NewDemon};

pub async fn list_demons(State(state): State<AppState>) -> impl IntoResponse {
    let demons = state.repo.demons().await;
    Json(json!({ "demons": ranked_demons(&demons) }))
}

pub async fn get_demon(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let demons = state.repo.demons().await;
    let ranked = ranked_demons(&demons);
    let demon = ranked
        .into_iter()
        .find(|d| d.demon.id == id)
        .ok_or(AppError::NotFound("Demon"))?;
    Ok(Json(demon))
}

pub async fn create_demon(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewDemon>,
) -> Result<impl IntoResponse, AppError> {
    let demon = Demon::new(req, Utc::now())?;

    let mut demons = state.repo.demons().await;
    demons.push(demon.clone());
    state
        .repo
        .save_demons(&demons)
        .await
        .map_err(save_failed("Failed to save demon"))?;

    tracing::info!(demon_id = %demon.id, rank = demons.len(), "Demon created");
    Ok((StatusCode::CREATED, Json(demon)))
}

pub async fn update_demon(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<DemonUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let mut demons = state.repo.demons().await;
    let index = demons
        .iter()
        .position(|d| d.id == id)
        .ok_or(AppError::NotFound("Demon"))?;

    demons[index].apply(update, Utc::now())?;
    state
        .repo
        .save_demons(&demons)
        .await
        .map_err(save_failed("Failed to update demon"))?;

    Ok(Json(demons.swap_remove(index)))
}

/// Removes the demon from the catalog. Players keep their references to it;
/// scoring skips ids that no longer resolve.
pub async fn delete_demon(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut demons = state.repo.demons().await;
    let index = demons
        .iter()
        .position(|d| d.id == id)
        .ok_or(AppError::NotFound("Demon"))?;

    demons.remove(index);
    state
        .repo
        .save_demons(&demons)
        .await
        .map_err(save_failed("Failed to delete demon"))?;

    tracing::info!(demon_id = %id, "Demon deleted");
    Ok(Json(json!({ "message": "Demon deleted successfully" })))
}
