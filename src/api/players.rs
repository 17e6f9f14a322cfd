// Player roster handlers, per-player stats and the leaderboard.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use super::{save_failed, ApiJson, AppState};
use crate::error::AppError;
use crate::leaderboard::{compute_totals, player_rank, rank_players, PlayerStats};
use crate::models::{validate_progress, NewPlayer, Player, PlayerUpdate, ProgressUpdate};

/// Player detail: stored fields plus derived stats and leaderboard position.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDetail {
    #[serde(flatten)]
    pub player: Player,
    #[serde(flatten)]
    pub stats: PlayerStats,
    pub rank: usize,
}

/// Full leaderboard, zero-point players included.
pub async fn list_players(State(state): State<AppState>) -> impl IntoResponse {
    let players = state.repo.players().await;
    let demons = state.repo.demons().await;
    Json(json!({ "players": rank_players(&players, &demons) }))
}

pub async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let players = state.repo.players().await;
    let demons = state.repo.demons().await;

    let player = players
        .iter()
        .find(|p| p.id == id)
        .ok_or(AppError::NotFound("Player"))?;
    let stats = compute_totals(player, &demons).into_stats();
    let rank = player_rank(&players, &demons, &id);

    Ok(Json(PlayerDetail {
        player: player.clone(),
        stats,
        rank,
    }))
}

pub async fn create_player(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewPlayer>,
) -> Result<impl IntoResponse, AppError> {
    let player = Player::new(req, Utc::now())?;

    let mut players = state.repo.players().await;
    players.push(player.clone());
    state
        .repo
        .save_players(&players)
        .await
        .map_err(save_failed("Failed to save player"))?;

    tracing::info!(player_id = %player.id, "Player created");
    Ok((StatusCode::CREATED, Json(player)))
}

pub async fn update_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<PlayerUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let mut players = state.repo.players().await;
    let index = players
        .iter()
        .position(|p| p.id == id)
        .ok_or(AppError::NotFound("Player"))?;

    players[index].apply(update, Utc::now())?;
    state
        .repo
        .save_players(&players)
        .await
        .map_err(save_failed("Failed to update player"))?;

    Ok(Json(players.swap_remove(index)))
}

pub async fn delete_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut players = state.repo.players().await;
    let index = players
        .iter()
        .position(|p| p.id == id)
        .ok_or(AppError::NotFound("Player"))?;

    players.remove(index);
    state
        .repo
        .save_players(&players)
        .await
        .map_err(save_failed("Failed to delete player"))?;

    tracing::info!(player_id = %id, "Player deleted");
    Ok(Json(json!({ "message": "Player deleted successfully" })))
}

/// Record progress on one demon. The demon id is not checked against the
/// catalog; unknown ids are stored and simply never score.
pub async fn update_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ProgressUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(demon_id), Some(progress)) = (req.demon_id.filter(|d| !d.is_empty()), req.progress)
    else {
        return Err(AppError::validation("Demon ID and progress are required"));
    };
    validate_progress(progress)?;

    let mut players = state.repo.players().await;
    let index = players
        .iter()
        .position(|p| p.id == id)
        .ok_or(AppError::NotFound("Player"))?;

    players[index].record_progress(&demon_id, progress, Utc::now())?;
    state
        .repo
        .save_players(&players)
        .await
        .map_err(save_failed("Failed to update player progress"))?;

    tracing::info!(player_id = %id, demon_id = %demon_id, progress, "Progress recorded");
    Ok(Json(players.swap_remove(index)))
}
