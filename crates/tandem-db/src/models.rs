/// Database row types — these map directly to SQLite rows.
/// Distinct from the tandem-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct GameRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub system_prompt: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub game_id: String,
    pub dm_version: i64,
    pub sender: String,
    pub text: String,
    pub created_at: String,
}
