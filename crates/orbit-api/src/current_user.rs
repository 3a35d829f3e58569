use axum_extra::extract::cookie::CookieJar;
use tokio::task::spawn_blocking;

use orbit_crypto::session::{SESSION_COOKIE, verify_session_token};
use orbit_types::models::UserPublic;

use crate::AppState;
use crate::error::ApiError;

/// Resolve the acting user from the session cookie.
///
/// Runs after any rate-limit check and before everything else in a protected
/// handler. Every failure collapses to [`ApiError::Auth`]: missing cookie,
/// bad token, unknown user, or a telegram id that no longer matches the one
/// the token was minted for.
pub async fn require_user(state: &AppState, jar: &CookieJar) -> Result<UserPublic, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or(ApiError::Auth)?;

    let now = chrono::Utc::now().timestamp();
    let session =
        verify_session_token(&token, &state.session_secret, now).ok_or(ApiError::Auth)?;

    let db = state.clone();
    let uid = session.uid.clone();
    let user = spawn_blocking(move || db.db.get_user_by_id(&uid))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??
        .ok_or(ApiError::Auth)?;

    if user.telegram_id != session.tid {
        return Err(ApiError::Auth);
    }

    Ok(user.into_public())
}
