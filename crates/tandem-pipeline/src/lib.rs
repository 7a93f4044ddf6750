//! The turn pipeline: one user action in, one consistent dual-lane
//! transcript update out.
//!
//! Each entry point is a single atomic commit against the store plus two
//! concurrent Model Gateway calls. The gateway never fails hard (degraded
//! replies commit as placeholder text), so a turn that passes its ownership
//! check always completes unless storage itself fails.

pub mod convert;

use std::sync::Arc;

use anyhow::anyhow;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use tandem_db::Database;
use tandem_gateway::Narrator;
use tandem_types::models::{Game, Lane, Message};

/// Fixed opening prompt for a freshly created game.
const OPENING_PROMPT: &str = "Begin the adventure by describing the opening scene.";

#[derive(Debug, Error)]
pub enum TurnError {
    /// Game absent or owned by someone else; callers cannot tell which.
    #[error("game not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// StartGame snapshot: the created game and each lane's opening message.
#[derive(Debug)]
pub struct GameStart {
    pub game: Game,
    pub messages: Vec<Message>,
}

/// Orchestrates game turns over the store and the model seam. Holds no
/// per-game state: every call re-reads history, so nothing spans requests.
pub struct TurnPipeline {
    db: Arc<Database>,
    narrator: Arc<dyn Narrator>,
}

impl TurnPipeline {
    pub fn new(db: Arc<Database>, narrator: Arc<dyn Narrator>) -> Self {
        Self { db, narrator }
    }

    pub async fn list_games(&self, user_id: Uuid) -> Result<Vec<Game>, TurnError> {
        let db = self.db.clone();
        let uid = user_id.to_string();

        let rows = run_blocking(move || db.list_games(&uid)).await?;
        Ok(rows.into_iter().map(convert::game).collect())
    }

    /// StartGame: create the game row, ask both DMs for an opening scene
    /// concurrently, store both openings, return one snapshot.
    ///
    /// A failed game insert aborts before any model call. A degraded reply
    /// is stored as that lane's opening like any other text; no retry.
    pub async fn start_game(
        &self,
        user_id: Uuid,
        title: &str,
        system_prompt: &str,
    ) -> Result<GameStart, TurnError> {
        let game_id = Uuid::new_v4();

        let row = {
            let db = self.db.clone();
            let (gid, uid) = (game_id.to_string(), user_id.to_string());
            let (title, prompt) = (title.to_string(), system_prompt.to_string());
            run_blocking(move || db.insert_game(&gid, &uid, &title, &prompt)).await?
        };
        let game = convert::game(row);

        let (first, second) = tokio::join!(
            self.narrator
                .narrate(Lane::One, system_prompt, &[], OPENING_PROMPT),
            self.narrator
                .narrate(Lane::Two, system_prompt, &[], OPENING_PROMPT),
        );

        let openings = [
            (Lane::One, first.transcript_text()),
            (Lane::Two, second.transcript_text()),
        ];
        {
            let db = self.db.clone();
            let gid = game_id.to_string();
            run_blocking(move || db.append_opening(&gid, &openings)).await?;
        }

        info!(game_id = %game_id, "game created with both opening scenes");

        let messages = self.load_transcript(game_id).await?;
        Ok(GameStart { game, messages })
    }

    /// SubmitAction: one turn against both lanes.
    ///
    /// The ownership check runs before any model call; each lane's stored
    /// history replays independently; the action plus both replies commit
    /// as a single four-insert transaction (re-checked against deletion).
    /// Returns the full updated transcript.
    pub async fn submit_action(
        &self,
        user_id: Uuid,
        game_id: Uuid,
        action: &str,
    ) -> Result<Vec<Message>, TurnError> {
        let (game, history) = {
            let db = self.db.clone();
            let (gid, uid) = (game_id.to_string(), user_id.to_string());
            run_blocking(move || {
                let Some(game) = db.get_game_owned(&gid, &uid)? else {
                    return Ok(None);
                };
                let history = db.get_messages(&gid)?;
                Ok(Some((game, history)))
            })
            .await?
            .ok_or(TurnError::NotFound)?
        };

        let lane_one = convert::lane_turns(&history, Lane::One);
        let lane_two = convert::lane_turns(&history, Lane::Two);

        let (first, second) = tokio::join!(
            self.narrator
                .narrate(Lane::One, &game.system_prompt, &lane_one, action),
            self.narrator
                .narrate(Lane::Two, &game.system_prompt, &lane_two, action),
        );

        let replies = [
            (Lane::One, first.transcript_text()),
            (Lane::Two, second.transcript_text()),
        ];
        let committed = {
            let db = self.db.clone();
            let (gid, uid) = (game_id.to_string(), user_id.to_string());
            let action = action.to_string();
            run_blocking(move || db.append_turn(&gid, &uid, &action, &replies)).await?
        };
        if !committed {
            // Deleted out from under us while the models were generating
            return Err(TurnError::NotFound);
        }

        self.load_transcript(game_id).await
    }

    /// Ownership-checked full history, both lanes in creation order.
    pub async fn history(&self, user_id: Uuid, game_id: Uuid) -> Result<Vec<Message>, TurnError> {
        let db = self.db.clone();
        let (gid, uid) = (game_id.to_string(), user_id.to_string());

        run_blocking(move || {
            if db.get_game_owned(&gid, &uid)?.is_none() {
                return Ok(None);
            }
            let rows = db.get_messages(&gid)?;
            Ok(Some(rows))
        })
        .await?
        .ok_or(TurnError::NotFound)
        .map(|rows| rows.into_iter().map(convert::message).collect())
    }

    /// Delete a game and its transcript in one transaction.
    pub async fn delete_game(&self, user_id: Uuid, game_id: Uuid) -> Result<(), TurnError> {
        let db = self.db.clone();
        let (gid, uid) = (game_id.to_string(), user_id.to_string());

        let deleted = run_blocking(move || db.delete_game(&gid, &uid)).await?;
        if !deleted {
            return Err(TurnError::NotFound);
        }

        info!(game_id = %game_id, "game deleted");
        Ok(())
    }

    async fn load_transcript(&self, game_id: Uuid) -> Result<Vec<Message>, TurnError> {
        let db = self.db.clone();
        let gid = game_id.to_string();

        let rows = run_blocking(move || db.get_messages(&gid)).await?;
        Ok(rows.into_iter().map(convert::message).collect())
    }
}

/// Run blocking rusqlite work off the async runtime.
async fn run_blocking<T, F>(f: F) -> Result<T, TurnError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TurnError::Storage(anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(TurnError::Storage)
}
