use std::collections::HashSet;

use axum::Json;
use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use tokio::task::spawn_blocking;

use orbit_db::{Database, DbError, DbResult};
use orbit_types::api::FriendGraphBody;
use orbit_types::graph::{GraphEdge, GraphResponse, GraphStats, IncomingRequest};
use orbit_types::models::{UserPublic, normalize_handle};

use crate::AppState;
use crate::current_user::require_user;
use crate::error::ApiError;

/// `GET /friends/graph`: the viewer's neighborhood plus the incoming
/// requests they can accept.
pub async fn friend_graph(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<FriendGraphBody>, ApiError> {
    let user = require_user(&state, &jar).await?;

    let db = state.clone();
    let limit = state.second_degree_limit;
    let body = spawn_blocking(move || {
        let graph = build_graph(&db.db, &user.id, limit)?;
        let pending_incoming_requests = incoming_requests(&db.db, &user.id)?;
        Ok::<_, DbError>(FriendGraphBody {
            graph,
            pending_incoming_requests,
        })
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(body))
}

/// Assemble the viewer's social neighborhood.
///
/// Second degree is a bounded traversal of depth exactly two: every
/// friendship touching a direct friend is examined, the direct friend is the
/// hub, and the far endpoint joins the second-degree set unless it is the
/// viewer or already a direct friend. Accumulation stops the moment the set
/// reaches `second_degree_limit`, before loading any user rows, so the cap
/// bounds work done, not just response size. First-discovered wins; the
/// order is whatever the store returns and callers must not rely on it.
pub fn build_graph(
    db: &Database,
    user_id: &str,
    second_degree_limit: usize,
) -> DbResult<GraphResponse> {
    let me = db
        .get_user_by_id(user_id)?
        .ok_or_else(|| DbError::NotFound("user not found".into()))?
        .into_public();

    let direct_ids = db.direct_friend_ids(user_id)?;
    let direct_set: HashSet<&str> = direct_ids.iter().map(String::as_str).collect();

    let direct_friends: Vec<UserPublic> = db
        .users_by_ids(&direct_ids)?
        .into_iter()
        .map(|row| row.into_public())
        .collect();

    let mut edges: Vec<GraphEdge> = direct_friends
        .iter()
        .map(|friend| GraphEdge {
            source: user_id.to_string(),
            target: friend.id.clone(),
        })
        .collect();

    let mut second_ids: HashSet<String> = HashSet::new();
    if !direct_ids.is_empty() {
        for row in db.friendships_touching(&direct_ids)? {
            let hub = if direct_set.contains(row.user_a_id.as_str()) {
                &row.user_a_id
            } else if direct_set.contains(row.user_b_id.as_str()) {
                &row.user_b_id
            } else {
                continue;
            };
            let other = if hub == &row.user_a_id {
                &row.user_b_id
            } else {
                &row.user_a_id
            };

            if other == user_id || direct_set.contains(other.as_str()) {
                continue;
            }
            if second_ids.len() >= second_degree_limit {
                break;
            }
            second_ids.insert(other.clone());
            edges.push(GraphEdge {
                source: hub.clone(),
                target: other.clone(),
            });
        }
    }

    let second_degree: Vec<UserPublic> = db
        .users_by_ids(&second_ids.iter().cloned().collect::<Vec<_>>())?
        .into_iter()
        .map(|row| row.into_public())
        .collect();

    let pending_incoming: Vec<UserPublic> = db
        .users_by_ids(&db.pending_sender_ids(user_id)?)?
        .into_iter()
        .map(|row| row.into_public())
        .collect();

    let pending_outgoing: Vec<UserPublic> = db
        .users_by_ids(&db.pending_target_ids(user_id)?)?
        .into_iter()
        .map(|row| row.into_public())
        .collect();

    let stats = GraphStats {
        connected: direct_friends.len(),
        pending_incoming: pending_incoming.len(),
    };

    Ok(GraphResponse {
        me,
        direct_friends,
        second_degree,
        edges,
        pending_incoming,
        pending_outgoing,
        stats,
    })
}

/// Pending requests addressed to `user_id`, newest first, joined with the
/// sender's public record. Requests from users that vanished are dropped.
pub fn incoming_requests(db: &Database, user_id: &str) -> DbResult<Vec<IncomingRequest>> {
    let rows = db.incoming_pending_requests(user_id)?;
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let sender_ids: Vec<String> = rows
        .iter()
        .map(|row| row.from_user_id.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let senders: std::collections::HashMap<String, UserPublic> = db
        .users_by_ids(&sender_ids)?
        .into_iter()
        .map(|row| (row.id.clone(), row.into_public()))
        .collect();

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            senders.get(&row.from_user_id).map(|from| IncomingRequest {
                id: row.id,
                from: from.clone(),
            })
        })
        .collect())
}

/// Handle-prefix search, excluding the viewer and their direct friends.
/// Empty or whitespace queries fail soft with no results.
pub fn search_users(db: &Database, viewer_id: &str, query: &str) -> DbResult<Vec<UserPublic>> {
    let normalized = normalize_handle(query);
    if normalized.is_empty() {
        return Ok(vec![]);
    }

    let friend_ids: HashSet<String> = db.direct_friend_ids(viewer_id)?.into_iter().collect();

    Ok(db
        .search_handle_prefix(&normalized, 10)?
        .into_iter()
        .filter(|row| row.id != viewer_id && !friend_ids.contains(&row.id))
        .map(|row| row.into_public())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_db::Database;

    fn seed_user(db: &Database, telegram_id: &str, handle: &str) -> String {
        db.upsert_telegram_user(telegram_id, Some(handle), handle, handle)
            .unwrap()
            .id
    }

    fn connect(db: &Database, a_handle: &str, b_id: &str) {
        db.send_friend_request(b_id, a_handle).unwrap();
        let requests = db.incoming_pending_requests(&target_of(db, a_handle)).unwrap();
        let request = requests.first().expect("pending request");
        db.accept_friend_request(&request.id, &target_of(db, a_handle))
            .unwrap();
    }

    fn target_of(db: &Database, handle: &str) -> String {
        db.get_user_by_handle(handle).unwrap().unwrap().id
    }

    /// alice - bob - carol, alice - dave. From alice's seat: bob and dave are
    /// direct, carol is second degree via hub bob.
    fn diamond() -> (Database, String, String, String, String) {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        let bob = seed_user(&db, "2", "bob");
        let carol = seed_user(&db, "3", "carol");
        let dave = seed_user(&db, "4", "dave");

        connect(&db, "alice", &bob);
        connect(&db, "alice", &dave);
        connect(&db, "bob", &carol);

        (db, alice, bob, carol, dave)
    }

    #[test]
    fn graph_lists_direct_and_second_degree() {
        let (db, alice, bob, carol, dave) = diamond();

        let graph = build_graph(&db, &alice, 60).unwrap();

        let direct: HashSet<_> = graph.direct_friends.iter().map(|u| u.id.clone()).collect();
        assert_eq!(direct, HashSet::from([bob.clone(), dave.clone()]));

        let second: Vec<_> = graph.second_degree.iter().map(|u| u.id.clone()).collect();
        assert_eq!(second, vec![carol.clone()]);

        assert!(graph.edges.iter().any(|e| e.source == bob && e.target == carol));
        assert_eq!(graph.stats.connected, 2);
        assert_eq!(graph.stats.pending_incoming, 0);
    }

    #[test]
    fn second_degree_excludes_viewer_and_direct_friends() {
        let (db, alice, _bob, _carol, dave) = diamond();

        // dave is also friends with bob: both endpoints are direct friends,
        // so neither may show up in second degree and alice must not cycle
        // back in via her own edges.
        db.send_friend_request(&dave, "bob").unwrap();
        let dave_requests = db.incoming_pending_requests(&target_of(&db, "bob")).unwrap();
        db.accept_friend_request(&dave_requests[0].id, &target_of(&db, "bob"))
            .unwrap();

        let graph = build_graph(&db, &alice, 60).unwrap();
        let second: HashSet<_> = graph.second_degree.iter().map(|u| u.id.clone()).collect();
        assert!(!second.contains(&alice));
        for friend in &graph.direct_friends {
            assert!(!second.contains(&friend.id));
        }
    }

    #[test]
    fn second_degree_respects_hard_cap() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        let hub = seed_user(&db, "2", "hub");
        connect(&db, "alice", &hub);

        for i in 0..5 {
            let handle = format!("fan{i}");
            let fan = seed_user(&db, &format!("t{i}"), &handle);
            connect(&db, "hub", &fan);
        }

        let graph = build_graph(&db, &alice, 3).unwrap();
        assert_eq!(graph.second_degree.len(), 3);

        let graph = build_graph(&db, &alice, 0).unwrap();
        assert!(graph.second_degree.is_empty());
    }

    #[test]
    fn graph_fails_for_unknown_user() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            build_graph(&db, "missing", 60),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn graph_surfaces_pending_requests_both_ways() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");
        let bob = seed_user(&db, "2", "bob");
        let carol = seed_user(&db, "3", "carol");

        db.send_friend_request(&bob, "alice").unwrap();
        db.send_friend_request(&alice, "carol").unwrap();

        let graph = build_graph(&db, &alice, 60).unwrap();
        assert_eq!(graph.pending_incoming.len(), 1);
        assert_eq!(graph.pending_incoming[0].id, bob);
        assert_eq!(graph.pending_outgoing.len(), 1);
        assert_eq!(graph.pending_outgoing[0].id, carol);
        assert_eq!(graph.stats.pending_incoming, 1);

        let incoming = incoming_requests(&db, &alice).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].from.id, bob);
    }

    #[test]
    fn search_excludes_viewer_and_friends() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "ally");
        let bob = seed_user(&db, "2", "allen");
        let _carol = seed_user(&db, "3", "allegra");
        connect(&db, "ally", &bob);

        let results = search_users(&db, &alice, "all").unwrap();
        let handles: Vec<_> = results
            .iter()
            .filter_map(|u| u.username.as_deref().map(str::to_string))
            .collect();
        assert_eq!(handles, vec!["allegra"]);
    }

    #[test]
    fn search_soft_fails_on_blank_query() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "1", "alice");

        assert!(search_users(&db, &alice, "   ").unwrap().is_empty());
        assert!(search_users(&db, &alice, "@").unwrap().is_empty());
    }
}
