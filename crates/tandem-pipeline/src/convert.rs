//! Row-to-wire conversions. SQLite hands back strings; corrupt values are
//! logged and defaulted rather than failing a whole transcript read.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use tandem_db::models::{GameRow, MessageRow};
use tandem_gateway::Turn;
use tandem_types::models::{Game, Lane, Message, Sender};

pub fn game(row: GameRow) -> Game {
    Game {
        id: parse_uuid(&row.id, "game id"),
        user_id: parse_uuid(&row.user_id, "game user_id"),
        title: row.title,
        system_prompt: row.system_prompt,
        created_at: parse_timestamp(&row.created_at),
    }
}

pub fn message(row: MessageRow) -> Message {
    let dm_version = Lane::try_from(row.dm_version as u8).unwrap_or_else(|e| {
        warn!("Corrupt lane on message '{}': {}", row.id, e);
        Lane::One
    });

    let sender = match row.sender.as_str() {
        "user" => Sender::User,
        "ai" => Sender::Ai,
        other => {
            warn!("Corrupt sender '{}' on message '{}'", other, row.id);
            Sender::Ai
        }
    };

    Message {
        id: parse_uuid(&row.id, "message id"),
        game_id: parse_uuid(&row.game_id, "message game_id"),
        dm_version,
        sender,
        text: row.text,
        created_at: parse_timestamp(&row.created_at),
    }
}

/// One lane's stored history as the alternating turn sequence the model
/// replays: sender `user` -> role "user", sender `ai` -> role "model".
pub fn lane_turns(rows: &[MessageRow], lane: Lane) -> Vec<Turn> {
    rows.iter()
        .filter(|m| m.dm_version == lane.dm_version() as i64)
        .map(|m| match m.sender.as_str() {
            "user" => Turn::user(m.text.clone()),
            _ => Turn::model(m.text.clone()),
        })
        .collect()
}

fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            // Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
