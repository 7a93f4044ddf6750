use crate::Database;
use crate::models::{GameRow, MessageRow, UserRow};
use anyhow::{Result, anyhow};
use rusqlite::Connection;
use tandem_types::models::Lane;
use uuid::Uuid;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, password, created_at FROM users WHERE username = ?1",
            )?;

            let row = stmt
                .query_row([username], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    // -- Games --

    pub fn insert_game(
        &self,
        id: &str,
        user_id: &str,
        title: &str,
        system_prompt: &str,
    ) -> Result<GameRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO games (id, user_id, title, system_prompt) VALUES (?1, ?2, ?3, ?4)",
                (id, user_id, title, system_prompt),
            )?;

            query_game(conn, id)?.ok_or_else(|| anyhow!("Game vanished after insert: {}", id))
        })
    }

    /// Owner-scoped listing, newest first.
    pub fn list_games(&self, user_id: &str) -> Result<Vec<GameRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, system_prompt, created_at
                 FROM games
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;

            let rows = stmt
                .query_map([user_id], game_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Ownership-scoped lookup. `None` covers both "absent" and "not yours" —
    /// callers must not reveal which.
    pub fn get_game_owned(&self, game_id: &str, user_id: &str) -> Result<Option<GameRow>> {
        self.with_conn(|conn| query_game_owned(conn, game_id, user_id))
    }

    /// Delete a game and its messages in one transaction.
    /// Returns false (nothing deleted) if the game is absent or not owned.
    pub fn delete_game(&self, game_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if query_game_owned(&tx, game_id, user_id)?.is_none() {
                return Ok(false);
            }

            // Messages first (foreign key on games)
            tx.execute("DELETE FROM messages WHERE game_id = ?1", [game_id])?;
            tx.execute("DELETE FROM games WHERE id = ?1", [game_id])?;

            tx.commit()?;
            Ok(true)
        })
    }

    // -- Messages --

    /// All messages across both lanes, in creation order.
    pub fn get_messages(&self, game_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            // rowid breaks ties: one turn's rows share a second-granularity timestamp
            let mut stmt = conn.prepare(
                "SELECT id, game_id, dm_version, sender, text, created_at
                 FROM messages
                 WHERE game_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;

            let rows = stmt
                .query_map([game_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Store both lanes' opening AI messages in one transaction.
    pub fn append_opening(&self, game_id: &str, openings: &[(Lane, String); 2]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            for (lane, text) in openings {
                insert_message(&tx, game_id, *lane, "ai", text)?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Commit one full turn: the player's action into both lanes, then both
    /// AI replies. All four inserts plus the ownership re-check happen in a
    /// single transaction, so a concurrent reader never sees a half-written
    /// turn. Returns false (nothing written) if the game is absent or not
    /// owned — it may have been deleted while the models were generating.
    pub fn append_turn(
        &self,
        game_id: &str,
        user_id: &str,
        action: &str,
        replies: &[(Lane, String); 2],
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if query_game_owned(&tx, game_id, user_id)?.is_none() {
                return Ok(false);
            }

            // User rows before AI rows: each lane reads user -> ai in creation order
            for lane in Lane::ALL {
                insert_message(&tx, game_id, lane, "user", action)?;
            }
            for (lane, text) in replies {
                insert_message(&tx, game_id, *lane, "ai", text)?;
            }

            tx.commit()?;
            Ok(true)
        })
    }
}

fn insert_message(
    conn: &Connection,
    game_id: &str,
    lane: Lane,
    sender: &str,
    text: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, game_id, dm_version, sender, text) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            game_id,
            lane.dm_version(),
            sender,
            text
        ],
    )?;
    Ok(())
}

fn query_game(conn: &Connection, game_id: &str) -> Result<Option<GameRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, title, system_prompt, created_at FROM games WHERE id = ?1",
    )?;

    let row = stmt.query_row([game_id], game_from_row).optional()?;
    Ok(row)
}

fn query_game_owned(conn: &Connection, game_id: &str, user_id: &str) -> Result<Option<GameRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, title, system_prompt, created_at
         FROM games
         WHERE id = ?1 AND user_id = ?2",
    )?;

    let row = stmt.query_row([game_id, user_id], game_from_row).optional()?;
    Ok(row)
}

fn game_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<GameRow, rusqlite::Error> {
    Ok(GameRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        system_prompt: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        game_id: row.get(1)?,
        dm_version: row.get(2)?,
        sender: row.get(3)?,
        text: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, username: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, username, "argon2-hash").unwrap();
        id
    }

    fn seed_game(db: &Database, user_id: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_game(&id, user_id, "The Sunken Keep", "You are the DM.")
            .unwrap();
        id
    }

    #[test]
    fn duplicate_username_rejected() {
        let db = db();
        seed_user(&db, "kaelen");

        let id = Uuid::new_v4().to_string();
        assert!(db.create_user(&id, "kaelen", "other-hash").is_err());
    }

    #[test]
    fn turn_writes_exactly_four_rows() {
        let db = db();
        let user = seed_user(&db, "kaelen");
        let game = seed_game(&db, &user);

        let replies = [
            (Lane::One, "The door creaks open.".to_string()),
            (Lane::Two, "Beyond the door, darkness.".to_string()),
        ];
        assert!(db.append_turn(&game, &user, "open the door", &replies).unwrap());

        let messages = db.get_messages(&game).unwrap();
        assert_eq!(messages.len(), 4);

        for lane in Lane::ALL {
            let lane_rows: Vec<_> = messages
                .iter()
                .filter(|m| m.dm_version == lane.dm_version() as i64)
                .collect();
            assert_eq!(lane_rows.len(), 2);
            assert_eq!(lane_rows[0].sender, "user");
            assert_eq!(lane_rows[0].text, "open the door");
            assert_eq!(lane_rows[1].sender, "ai");
        }
    }

    #[test]
    fn turn_against_foreign_game_writes_nothing() {
        let db = db();
        let owner = seed_user(&db, "kaelen");
        let stranger = seed_user(&db, "mira");
        let game = seed_game(&db, &owner);

        let replies = [
            (Lane::One, "no".to_string()),
            (Lane::Two, "no".to_string()),
        ];
        assert!(!db.append_turn(&game, &stranger, "steal the keep", &replies).unwrap());
        assert!(db.get_messages(&game).unwrap().is_empty());
    }

    #[test]
    fn delete_cascades_to_messages() {
        let db = db();
        let user = seed_user(&db, "kaelen");
        let game = seed_game(&db, &user);
        db.append_opening(
            &game,
            &[
                (Lane::One, "You awaken.".to_string()),
                (Lane::Two, "You stir.".to_string()),
            ],
        )
        .unwrap();

        assert!(db.delete_game(&game, &user).unwrap());
        assert!(db.get_game_owned(&game, &user).unwrap().is_none());
        assert!(db.get_messages(&game).unwrap().is_empty());
    }

    #[test]
    fn delete_rejects_non_owner() {
        let db = db();
        let owner = seed_user(&db, "kaelen");
        let stranger = seed_user(&db, "mira");
        let game = seed_game(&db, &owner);

        assert!(!db.delete_game(&game, &stranger).unwrap());
        assert!(db.get_game_owned(&game, &owner).unwrap().is_some());
    }

    #[test]
    fn listing_is_owner_scoped() {
        let db = db();
        let a = seed_user(&db, "kaelen");
        let b = seed_user(&db, "mira");
        seed_game(&db, &a);
        seed_game(&db, &a);
        seed_game(&db, &b);

        assert_eq!(db.list_games(&a).unwrap().len(), 2);
        assert_eq!(db.list_games(&b).unwrap().len(), 1);
    }

    #[test]
    fn lane_history_reads_in_creation_order() {
        let db = db();
        let user = seed_user(&db, "kaelen");
        let game = seed_game(&db, &user);

        db.append_opening(
            &game,
            &[
                (Lane::One, "opening one".to_string()),
                (Lane::Two, "opening two".to_string()),
            ],
        )
        .unwrap();
        db.append_turn(
            &game,
            &user,
            "draw my sword",
            &[
                (Lane::One, "reply one".to_string()),
                (Lane::Two, "reply two".to_string()),
            ],
        )
        .unwrap();

        let messages = db.get_messages(&game).unwrap();
        assert_eq!(messages.len(), 6);

        for lane in Lane::ALL {
            let senders: Vec<&str> = messages
                .iter()
                .filter(|m| m.dm_version == lane.dm_version() as i64)
                .map(|m| m.sender.as_str())
                .collect();
            assert_eq!(senders, ["ai", "user", "ai"]);
        }
    }
}
