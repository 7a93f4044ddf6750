pub mod auth;
pub mod games;
pub mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};

use tandem_db::Database;
use tandem_gateway::Narrator;
use tandem_pipeline::TurnPipeline;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub pipeline: TurnPipeline,
    pub narrator: Arc<dyn Narrator>,
    pub jwt_secret: String,
}

/// Full application router. Lives here rather than in the binary so
/// integration tests can drive it in-process.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/games", get(games::list_games).post(games::create_game))
        .route("/games/randomize", post(games::randomize))
        .route("/games/{game_id}", delete(games::delete_game))
        .route("/games/{game_id}/history", get(games::get_history))
        .route("/games/{game_id}/action", post(games::submit_action))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
