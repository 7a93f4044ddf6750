use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub system_prompt: String,
    pub created_at: DateTime<Utc>,
}

/// One of the two parallel DM conversations within a game.
///
/// Every game carries two independent transcripts over the same player
/// actions; on the wire a lane is the `dm_version` integer (1 or 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Lane {
    One,
    Two,
}

impl Lane {
    pub const ALL: [Lane; 2] = [Lane::One, Lane::Two];

    pub fn dm_version(self) -> u8 {
        match self {
            Lane::One => 1,
            Lane::Two => 2,
        }
    }
}

impl From<Lane> for u8 {
    fn from(lane: Lane) -> u8 {
        lane.dm_version()
    }
}

impl TryFrom<u8> for Lane {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Lane::One),
            2 => Ok(Lane::Two),
            other => Err(format!("invalid dm_version: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub game_id: Uuid,
    pub dm_version: Lane,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_round_trips_as_dm_version_integer() {
        let json = serde_json::to_string(&Lane::Two).unwrap();
        assert_eq!(json, "2");

        let lane: Lane = serde_json::from_str("1").unwrap();
        assert_eq!(lane, Lane::One);

        assert!(serde_json::from_str::<Lane>("3").is_err());
    }

    #[test]
    fn sender_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Sender::Ai).unwrap(), "\"ai\"");
        let s: Sender = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(s, Sender::User);
    }
}
