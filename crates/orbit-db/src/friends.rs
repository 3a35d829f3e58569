use rusqlite::{OptionalExtension, Row, Transaction};
use uuid::Uuid;

use orbit_types::models::{RequestStatus, canonical_pair, normalize_handle};

use crate::models::{FriendRequestRow, FriendshipRow};
use crate::{Database, DbError, DbResult};

/// Result of `send_friend_request`. Repeat sends and already-connected pairs
/// are reported as outcomes, not errors; the operation is idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    AlreadyConnected { friendship_id: String },
    Pending,
    Accepted { friendship_id: String },
}

impl SendOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            SendOutcome::AlreadyConnected { .. } => "already_connected",
            SendOutcome::Pending => "pending",
            SendOutcome::Accepted { .. } => "accepted",
        }
    }

    pub fn friendship_id(&self) -> Option<&str> {
        match self {
            SendOutcome::AlreadyConnected { friendship_id }
            | SendOutcome::Accepted { friendship_id } => Some(friendship_id),
            SendOutcome::Pending => None,
        }
    }
}

impl Database {
    /// Send a connection request to the user owning `target_handle`.
    ///
    /// The whole decision runs in one transaction, so two users sending to
    /// each other at the same time cannot both observe "no reciprocal
    /// pending": one of them will see the other's row and auto-accept. The
    /// reciprocal rule means two crossing requests converge on a single
    /// friendship without either side explicitly accepting.
    pub fn send_friend_request(&self, from_id: &str, target_handle: &str) -> DbResult<SendOutcome> {
        let handle = normalize_handle(target_handle);
        if handle.is_empty() {
            return Err(DbError::Validation("username is empty".into()));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let target_id: String = tx
                .query_row("SELECT id FROM users WHERE username = ?1", [&handle], |row| {
                    row.get(0)
                })
                .optional()?
                .ok_or_else(|| DbError::NotFound("target username not found".into()))?;

            if target_id == from_id {
                return Err(DbError::Conflict("cannot connect to yourself".into()));
            }

            let (user_a, user_b) = canonical_pair(from_id, &target_id);

            if let Some(friendship_id) = find_friendship(&tx, user_a, user_b)? {
                return Ok(SendOutcome::AlreadyConnected { friendship_id });
            }

            if find_pending(&tx, from_id, &target_id)?.is_some() {
                return Ok(SendOutcome::Pending);
            }

            if let Some(reciprocal_id) = find_pending(&tx, &target_id, from_id)? {
                mark_accepted(&tx, &reciprocal_id)?;
                insert_request(&tx, from_id, &target_id, RequestStatus::Accepted)?;
                let friendship_id = upsert_friendship(&tx, user_a, user_b)?;
                tx.commit()?;
                return Ok(SendOutcome::Accepted { friendship_id });
            }

            insert_request(&tx, from_id, &target_id, RequestStatus::Pending)?;
            tx.commit()?;
            Ok(SendOutcome::Pending)
        })
    }

    /// Accept a pending request addressed to `accepter_id` and return the
    /// resulting friendship id.
    pub fn accept_friend_request(&self, request_id: &str, accepter_id: &str) -> DbResult<String> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let request: Option<(String, String, String, String)> = tx
                .query_row(
                    "SELECT id, from_user_id, to_user_id, status
                     FROM friend_requests WHERE id = ?1",
                    [request_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            let (id, from_user_id, to_user_id, status) =
                request.ok_or_else(|| DbError::NotFound("request not found".into()))?;

            if to_user_id != accepter_id {
                return Err(DbError::Conflict("you cannot accept this request".into()));
            }
            if RequestStatus::parse(&status) != Some(RequestStatus::Pending) {
                return Err(DbError::Conflict("request is not pending".into()));
            }

            mark_accepted(&tx, &id)?;
            let (user_a, user_b) = canonical_pair(&from_user_id, &to_user_id);
            let friendship_id = upsert_friendship(&tx, user_a, user_b)?;
            tx.commit()?;
            Ok(friendship_id)
        })
    }

    /// Ids of everyone directly connected to `user_id`.
    pub fn direct_friend_ids(&self, user_id: &str) -> DbResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_a_id, user_b_id FROM friendships
                 WHERE user_a_id = ?1 OR user_b_id = ?1",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    let a: String = row.get(0)?;
                    let b: String = row.get(1)?;
                    Ok(if a == user_id { b } else { a })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All friendship rows with at least one endpoint in `ids`.
    pub fn friendships_touching(&self, ids: &[String]) -> DbResult<Vec<FriendshipRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
            let in_clause = placeholders.join(", ");
            let sql = format!(
                "SELECT id, user_a_id, user_b_id, created_at FROM friendships
                 WHERE user_a_id IN ({in_clause}) OR user_b_id IN ({in_clause})"
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> =
                ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

            let rows = stmt
                .query_map(params.as_slice(), map_friendship_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Senders of pending requests addressed to `user_id`.
    pub fn pending_sender_ids(&self, user_id: &str) -> DbResult<Vec<String>> {
        self.pending_peer_ids(user_id, "to_user_id", "from_user_id")
    }

    /// Targets of pending requests sent by `user_id`.
    pub fn pending_target_ids(&self, user_id: &str) -> DbResult<Vec<String>> {
        self.pending_peer_ids(user_id, "from_user_id", "to_user_id")
    }

    fn pending_peer_ids(&self, user_id: &str, match_col: &str, peer_col: &str) -> DbResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT DISTINCT {peer_col} FROM friend_requests
                 WHERE {match_col} = ?1 AND status = 'pending'"
            ))?;
            let rows = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Pending requests addressed to `user_id`, newest first. The client
    /// accepts by request id, so the full rows come back.
    pub fn incoming_pending_requests(&self, user_id: &str) -> DbResult<Vec<FriendRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, from_user_id, to_user_id, status, created_at, updated_at
                 FROM friend_requests
                 WHERE to_user_id = ?1 AND status = 'pending'
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], map_request_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn find_friendship(tx: &Transaction<'_>, user_a: &str, user_b: &str) -> DbResult<Option<String>> {
    let id = tx
        .query_row(
            "SELECT id FROM friendships WHERE user_a_id = ?1 AND user_b_id = ?2",
            [user_a, user_b],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn find_pending(tx: &Transaction<'_>, from_id: &str, to_id: &str) -> DbResult<Option<String>> {
    let id = tx
        .query_row(
            "SELECT id FROM friend_requests
             WHERE from_user_id = ?1 AND to_user_id = ?2 AND status = 'pending'",
            [from_id, to_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn mark_accepted(tx: &Transaction<'_>, request_id: &str) -> DbResult<()> {
    tx.execute(
        "UPDATE friend_requests SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
        [RequestStatus::Accepted.as_str(), request_id],
    )?;
    Ok(())
}

fn insert_request(
    tx: &Transaction<'_>,
    from_id: &str,
    to_id: &str,
    status: RequestStatus,
) -> DbResult<String> {
    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO friend_requests (id, from_user_id, to_user_id, status)
         VALUES (?1, ?2, ?3, ?4)",
        [id.as_str(), from_id, to_id, status.as_str()],
    )?;
    Ok(id)
}

/// Insert the canonical friendship row if absent, then return its id either
/// way. Caller must pass the pair in canonical order.
fn upsert_friendship(tx: &Transaction<'_>, user_a: &str, user_b: &str) -> DbResult<String> {
    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT OR IGNORE INTO friendships (id, user_a_id, user_b_id) VALUES (?1, ?2, ?3)",
        [id.as_str(), user_a, user_b],
    )?;
    find_friendship(tx, user_a, user_b)?
        .ok_or_else(|| DbError::NotFound("friendship row missing after upsert".into()))
}

fn map_friendship_row(row: &Row<'_>) -> rusqlite::Result<FriendshipRow> {
    Ok(FriendshipRow {
        id: row.get(0)?,
        user_a_id: row.get(1)?,
        user_b_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn map_request_row(row: &Row<'_>) -> rusqlite::Result<FriendRequestRow> {
    Ok(FriendRequestRow {
        id: row.get(0)?,
        from_user_id: row.get(1)?,
        to_user_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRow;

    fn seed_user(db: &Database, telegram_id: &str, handle: &str) -> UserRow {
        db.upsert_telegram_user(telegram_id, Some(handle), handle, handle)
            .unwrap()
    }

    fn count(db: &Database, sql: &str) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
            .unwrap()
    }

    #[test]
    fn send_creates_pending_request() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        seed_user(&db, "2", "bob");

        let outcome = db.send_friend_request(&alice.id, "bob").unwrap();
        assert_eq!(outcome, SendOutcome::Pending);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM friend_requests"), 1);
    }

    #[test]
    fn send_normalizes_target_handle() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        seed_user(&db, "2", "bob");

        let outcome = db.send_friend_request(&alice.id, " @Bob ").unwrap();
        assert_eq!(outcome, SendOutcome::Pending);
    }

    #[test]
    fn repeat_send_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        seed_user(&db, "2", "bob");

        assert_eq!(db.send_friend_request(&alice.id, "bob").unwrap(), SendOutcome::Pending);
        assert_eq!(db.send_friend_request(&alice.id, "bob").unwrap(), SendOutcome::Pending);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM friend_requests"), 1);
    }

    #[test]
    fn reciprocal_send_auto_accepts() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        let bob = seed_user(&db, "2", "bob");

        assert_eq!(db.send_friend_request(&alice.id, "bob").unwrap(), SendOutcome::Pending);
        let outcome = db.send_friend_request(&bob.id, "alice").unwrap();
        assert!(matches!(outcome, SendOutcome::Accepted { .. }));

        // Exactly one edge, both request rows accepted.
        assert_eq!(count(&db, "SELECT COUNT(*) FROM friendships"), 1);
        assert_eq!(
            count(&db, "SELECT COUNT(*) FROM friend_requests WHERE status = 'accepted'"),
            2
        );
        assert_eq!(
            count(&db, "SELECT COUNT(*) FROM friend_requests WHERE status = 'pending'"),
            0
        );
    }

    #[test]
    fn send_to_existing_friend_reports_already_connected() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        let bob = seed_user(&db, "2", "bob");

        db.send_friend_request(&alice.id, "bob").unwrap();
        db.send_friend_request(&bob.id, "alice").unwrap();

        // Both directions resolve to the same canonical edge.
        let from_alice = db.send_friend_request(&alice.id, "bob").unwrap();
        let from_bob = db.send_friend_request(&bob.id, "alice").unwrap();
        assert_eq!(from_alice.status(), "already_connected");
        assert_eq!(from_alice.friendship_id(), from_bob.friendship_id());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM friendships"), 1);
    }

    #[test]
    fn send_rejects_empty_and_unknown_and_self() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");

        assert!(matches!(
            db.send_friend_request(&alice.id, "  @ "),
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            db.send_friend_request(&alice.id, "ghost"),
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            db.send_friend_request(&alice.id, "alice"),
            Err(DbError::Conflict(_))
        ));
    }

    #[test]
    fn accept_transitions_pending_to_friendship() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        let bob = seed_user(&db, "2", "bob");

        db.send_friend_request(&alice.id, "bob").unwrap();
        let requests = db.incoming_pending_requests(&bob.id).unwrap();
        assert_eq!(requests.len(), 1);

        let friendship_id = db.accept_friend_request(&requests[0].id, &bob.id).unwrap();
        assert!(!friendship_id.is_empty());
        assert_eq!(db.direct_friend_ids(&alice.id).unwrap(), vec![bob.id.clone()]);
        assert_eq!(db.direct_friend_ids(&bob.id).unwrap(), vec![alice.id.clone()]);
    }

    #[test]
    fn accept_rejects_foreign_request() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        let bob = seed_user(&db, "2", "bob");
        let carol = seed_user(&db, "3", "carol");

        db.send_friend_request(&alice.id, "bob").unwrap();
        let request = &db.incoming_pending_requests(&bob.id).unwrap()[0];

        assert!(matches!(
            db.accept_friend_request(&request.id, &carol.id),
            Err(DbError::Conflict(_))
        ));
    }

    #[test]
    fn accept_rejects_non_pending_request() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        let bob = seed_user(&db, "2", "bob");

        db.send_friend_request(&alice.id, "bob").unwrap();
        let request_id = db.incoming_pending_requests(&bob.id).unwrap()[0].id.clone();

        db.accept_friend_request(&request_id, &bob.id).unwrap();
        assert!(matches!(
            db.accept_friend_request(&request_id, &bob.id),
            Err(DbError::Conflict(_))
        ));
    }

    #[test]
    fn accept_rejects_unknown_request() {
        let db = Database::open_in_memory().unwrap();
        let bob = seed_user(&db, "2", "bob");

        assert!(matches!(
            db.accept_friend_request("no-such-id", &bob.id),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn accepting_twice_from_both_paths_keeps_one_edge() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        let bob = seed_user(&db, "2", "bob");

        db.send_friend_request(&alice.id, "bob").unwrap();
        let request_id = db.incoming_pending_requests(&bob.id).unwrap()[0].id.clone();
        db.accept_friend_request(&request_id, &bob.id).unwrap();

        // A later send in either direction must not create a second edge.
        db.send_friend_request(&bob.id, "alice").unwrap();
        assert_eq!(count(&db, "SELECT COUNT(*) FROM friendships"), 1);
    }

    #[test]
    fn pending_peer_ids_track_direction() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        let bob = seed_user(&db, "2", "bob");

        db.send_friend_request(&alice.id, "bob").unwrap();

        assert_eq!(db.pending_sender_ids(&bob.id).unwrap(), vec![alice.id.clone()]);
        assert_eq!(db.pending_target_ids(&alice.id).unwrap(), vec![bob.id.clone()]);
        assert!(db.pending_sender_ids(&alice.id).unwrap().is_empty());
        assert!(db.pending_target_ids(&bob.id).unwrap().is_empty());
    }
}
