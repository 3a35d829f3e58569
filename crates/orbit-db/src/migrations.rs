use rusqlite::Connection;
use tracing::info;

use crate::DbResult;

pub fn run(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            telegram_id     TEXT NOT NULL UNIQUE,
            username        TEXT UNIQUE,
            display_name    TEXT,
            avatar_seed     TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Rows are always written in canonical order (user_a_id < user_b_id),
        -- so this UNIQUE constraint blocks duplicate edges from either
        -- direction of the original request.
        CREATE TABLE IF NOT EXISTS friendships (
            id          TEXT PRIMARY KEY,
            user_a_id   TEXT NOT NULL REFERENCES users(id),
            user_b_id   TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_a_id, user_b_id)
        );

        CREATE INDEX IF NOT EXISTS idx_friendships_user_a
            ON friendships(user_a_id);
        CREATE INDEX IF NOT EXISTS idx_friendships_user_b
            ON friendships(user_b_id);

        -- Append-only history: new outcomes get new rows, old rows are never
        -- deleted. Only the pending -> accepted transition mutates a row.
        CREATE TABLE IF NOT EXISTS friend_requests (
            id              TEXT PRIMARY KEY,
            from_user_id    TEXT NOT NULL REFERENCES users(id),
            to_user_id      TEXT NOT NULL REFERENCES users(id),
            status          TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_friend_requests_to
            ON friend_requests(to_user_id, status);
        CREATE INDEX IF NOT EXISTS idx_friend_requests_from
            ON friend_requests(from_user_id, status);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
