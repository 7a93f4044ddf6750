use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Game, Message, User};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the auth handlers.
/// Canonical definition lives here in tandem-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

// -- Games --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGameRequest {
    pub title: String,
    pub system_prompt: String,
}

/// StartGame snapshot: the created game plus each lane's opening message.
#[derive(Debug, Serialize)]
pub struct CreateGameResponse {
    pub game: Game,
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionRequest {
    pub action: String,
}

/// The full updated transcript after a turn. The server response is the
/// single source of truth post-submit; clients re-derive, never merge.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub responses: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RandomizeResponse {
    pub title: String,
    pub prompt: String,
}
