use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use crate::models::UserRow;
use crate::{Database, DbResult};

const USER_COLUMNS: &str = "id, telegram_id, username, display_name, avatar_seed, created_at";

impl Database {
    /// Create or refresh a user keyed by telegram id. Handle, display name
    /// and avatar seed are overwritten on every successful verification.
    pub fn upsert_telegram_user(
        &self,
        telegram_id: &str,
        username: Option<&str>,
        display_name: &str,
        avatar_seed: &str,
    ) -> DbResult<UserRow> {
        self.with_conn(|conn| {
            let id = Uuid::new_v4().to_string();
            let row = conn.query_row(
                &format!(
                    "INSERT INTO users (id, telegram_id, username, display_name, avatar_seed)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(telegram_id) DO UPDATE SET
                         username = excluded.username,
                         display_name = excluded.display_name,
                         avatar_seed = excluded.avatar_seed
                     RETURNING {USER_COLUMNS}"
                ),
                rusqlite::params![id, telegram_id, username, display_name, avatar_seed],
                map_user_row,
            )?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                    [id],
                    map_user_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_handle(&self, handle: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                    [handle],
                    map_user_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Batch-fetch user rows for a set of ids.
    pub fn users_by_ids(&self, ids: &[String]) -> DbResult<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> =
                ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

            let rows = stmt
                .query_map(params.as_slice(), map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Up to `limit` users whose handle starts with `prefix`. Exclusion of
    /// the viewer and their friends happens in the graph service, after the
    /// limit, matching the search contract.
    pub fn search_handle_prefix(&self, prefix: &str, limit: u32) -> DbResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            let pattern = format!("{}%", escape_like(prefix));
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE username LIKE ?1 ESCAPE '\\'
                 ORDER BY username
                 LIMIT ?2"
            ))?;

            let rows = stmt
                .query_map(rusqlite::params![pattern, limit], map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        username: row.get(2)?,
        display_name: row.get(3)?,
        avatar_seed: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Escape LIKE wildcards so a prefix query matches literally.
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
