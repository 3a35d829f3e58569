//! Database row types that map directly to SQLite rows.
//! Distinct from the orbit-types API models to keep the DB layer independent
//! of serialization concerns; `UserRow::into_public` is the only bridge.

use orbit_types::models::UserPublic;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub telegram_id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_seed: String,
    pub created_at: String,
}

impl UserRow {
    pub fn into_public(self) -> UserPublic {
        UserPublic {
            id: self.id,
            telegram_id: self.telegram_id,
            username: self.username,
            display_name: self.display_name,
            avatar_seed: self.avatar_seed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FriendshipRow {
    pub id: String,
    pub user_a_id: String,
    pub user_b_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct FriendRequestRow {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}
