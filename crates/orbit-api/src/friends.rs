use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use tokio::task::spawn_blocking;
use tracing::info;

use orbit_types::api::{
    AcceptRequestBody, AcceptRequestResponse, SendRequestBody, SendRequestResponse,
};

use crate::AppState;
use crate::current_user::require_user;
use crate::error::ApiError;
use crate::rate_limit::client_key;

const REQUEST_RATE_LIMIT: u32 = 20;
const REQUEST_RATE_WINDOW: Duration = Duration::from_secs(60);

/// `POST /friends/request`: send a connection request by handle.
/// Rate limit runs first, before the session is even looked at.
pub async fn send_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(req): Json<SendRequestBody>,
) -> Result<Json<SendRequestResponse>, ApiError> {
    let decision = state.rate_limiter.consume(
        &client_key("request", &headers),
        REQUEST_RATE_LIMIT,
        REQUEST_RATE_WINDOW,
    );
    if !decision.allowed {
        return Err(ApiError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    let user = require_user(&state, &jar).await?;

    let target = req.target_username.trim().to_string();
    if target.is_empty() {
        return Err(ApiError::Validation("targetUsername is required".into()));
    }

    let db = state.clone();
    let from_id = user.id.clone();
    let outcome = spawn_blocking(move || db.db.send_friend_request(&from_id, &target))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    info!(from = %user.id, status = outcome.status(), "friend request");

    Ok(Json(SendRequestResponse {
        status: outcome.status().to_string(),
        friendship_id: outcome.friendship_id().map(str::to_string),
    }))
}

/// `POST /friends/accept`: accept a pending request addressed to the caller.
pub async fn accept_request(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<AcceptRequestBody>,
) -> Result<Json<AcceptRequestResponse>, ApiError> {
    let user = require_user(&state, &jar).await?;

    let request_id = req.request_id.trim().to_string();
    if request_id.is_empty() {
        return Err(ApiError::Validation("requestId is required".into()));
    }

    let db = state.clone();
    let accepter_id = user.id.clone();
    let friendship_id = spawn_blocking(move || db.db.accept_friend_request(&request_id, &accepter_id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    info!(accepter = %user.id, friendship = %friendship_id, "request accepted");

    Ok(Json(AcceptRequestResponse {
        status: "accepted".to_string(),
        friendship_id,
    }))
}
