use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use tandem_pipeline::TurnError;
use tandem_types::api::{
    ActionRequest, ActionResponse, Claims, CreateGameRequest, CreateGameResponse,
    RandomizeResponse,
};

use crate::AppState;

pub async fn list_games(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let games = state
        .pipeline
        .list_games(claims.sub)
        .await
        .map_err(turn_error_status)?;

    Ok(Json(games))
}

/// StartGame: creates the game and seeds both lanes with an opening scene.
pub async fn create_game(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGameRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.title.trim().is_empty() || req.system_prompt.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let start = state
        .pipeline
        .start_game(claims.sub, &req.title, &req.system_prompt)
        .await
        .map_err(turn_error_status)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateGameResponse {
            game: start.game,
            messages: start.messages,
        }),
    ))
}

pub async fn delete_game(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    state
        .pipeline
        .delete_game(claims.sub, game_id)
        .await
        .map_err(turn_error_status)?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let messages = state
        .pipeline
        .history(claims.sub, game_id)
        .await
        .map_err(turn_error_status)?;

    Ok(Json(messages))
}

/// SubmitAction: one turn against both DMs; responds with the full updated
/// transcript.
pub async fn submit_action(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ActionRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.action.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let responses = state
        .pipeline
        .submit_action(claims.sub, game_id, &req.action)
        .await
        .map_err(turn_error_status)?;

    Ok(Json(ActionResponse { responses }))
}

/// One-shot adventure concept, independent of any game. Unlike narration
/// there is no transcript to absorb a placeholder, so provider failure is
/// a hard 502.
pub async fn randomize(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let concept = state.narrator.improvise().await.map_err(|e| {
        error!("adventure concept generation failed: {}", e);
        StatusCode::BAD_GATEWAY
    })?;

    Ok(Json(RandomizeResponse {
        title: concept.title,
        prompt: concept.prompt,
    }))
}

fn turn_error_status(err: TurnError) -> StatusCode {
    match err {
        TurnError::NotFound => StatusCode::NOT_FOUND,
        TurnError::Storage(e) => {
            error!("storage failure: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
