use axum::Json;
use axum::extract::{Query, State};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tokio::task::spawn_blocking;

use orbit_types::api::SearchResponse;

use crate::AppState;
use crate::current_user::require_user;
use crate::error::ApiError;
use crate::graph::search_users;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// `GET /users/search?q=`: handle-prefix search scoped to the viewer.
/// A blank query returns an empty list rather than an error.
pub async fn search(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let user = require_user(&state, &jar).await?;

    if query.q.trim().is_empty() {
        return Ok(Json(SearchResponse { users: vec![] }));
    }

    let db = state.clone();
    let viewer_id = user.id.clone();
    let users = spawn_blocking(move || search_users(&db.db, &viewer_id, &query.q))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(SearchResponse { users }))
}
