use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                user_id         INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE rooms (
                room_id         INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT,
                start_datetime  TEXT NOT NULL
            );

            CREATE TABLE room_users (
                room_user_id            INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id                 INTEGER NOT NULL REFERENCES users(user_id),
                room_id                 INTEGER NOT NULL REFERENCES rooms(room_id),
                last_read_message_id    INTEGER,
                UNIQUE(user_id, room_id)
            );

            CREATE INDEX idx_room_users_room ON room_users(room_id);

            CREATE TABLE messages (
                message_id      INTEGER PRIMARY KEY AUTOINCREMENT,
                room_user_id    INTEGER NOT NULL REFERENCES room_users(room_user_id),
                sent_datetime   TEXT NOT NULL,
                text            TEXT
            );

            CREATE INDEX idx_messages_sender
                ON messages(room_user_id, sent_datetime, message_id);

            CREATE TABLE emoji (
                emoji_id        INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL UNIQUE,
                image           TEXT
            );

            CREATE TABLE emoji_message_users (
                emoji_message_user_id   INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id              INTEGER NOT NULL REFERENCES messages(message_id),
                user_id                 INTEGER NOT NULL REFERENCES users(user_id),
                emoji_id                INTEGER NOT NULL REFERENCES emoji(emoji_id),
                UNIQUE(message_id, user_id, emoji_id)
            );

            CREATE INDEX idx_reactions_message ON emoji_message_users(message_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
