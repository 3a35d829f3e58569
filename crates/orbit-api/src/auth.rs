use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tokio::task::spawn_blocking;
use tracing::{info, warn};

use orbit_crypto::init_data::verify_init_data;
use orbit_crypto::session::{SESSION_COOKIE, SESSION_TTL_SEC, create_session_token};
use orbit_types::api::{AuthResponse, TelegramAuthRequest};
use orbit_types::graph::GraphStats;

use crate::AppState;
use crate::current_user::require_user;
use crate::error::ApiError;
use crate::graph::build_graph;
use crate::rate_limit::client_key;

const AUTH_RATE_LIMIT: u32 = 20;
const AUTH_RATE_WINDOW: Duration = Duration::from_secs(60);

/// `POST /auth/telegram`: verify a Mini App identity assertion, upsert the
/// user, and seal a session cookie.
pub async fn telegram_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(req): Json<TelegramAuthRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let decision = state.rate_limiter.consume(
        &client_key("auth", &headers),
        AUTH_RATE_LIMIT,
        AUTH_RATE_WINDOW,
    );
    if !decision.allowed {
        return Err(ApiError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    let init_data = req.init_data.trim().to_string();
    if init_data.is_empty() {
        return Err(ApiError::Validation("initData is required".into()));
    }

    let now = chrono::Utc::now().timestamp();
    let verified = verify_init_data(&init_data, &state.bot_token, state.auth_max_age_sec, now)
        .map_err(|e| {
            warn!("init data verification failed: {e}");
            ApiError::Auth
        })?;

    let avatar_seed = verified
        .username
        .clone()
        .unwrap_or_else(|| format!("tg_{}", verified.telegram_id));

    let db = state.clone();
    let limit = state.second_degree_limit;
    let (user, stats) = spawn_blocking(move || {
        let user = db.db.upsert_telegram_user(
            &verified.telegram_id,
            verified.username.as_deref(),
            &verified.display_name,
            &avatar_seed,
        )?;

        // A fresh user has no graph yet; a stats failure must not block login.
        let stats = match build_graph(&db.db, &user.id, limit) {
            Ok(graph) => graph.stats,
            Err(_) => GraphStats {
                connected: 0,
                pending_incoming: 0,
            },
        };

        Ok::<_, orbit_db::DbError>((user, stats))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    info!(telegram_id = %user.telegram_id, "authenticated");

    let token = create_session_token(&user.id, &user.telegram_id, &state.session_secret, now);
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(SESSION_TTL_SEC))
        .build();

    Ok((
        jar.add(cookie),
        Json(AuthResponse {
            user: user.into_public(),
            stats,
        }),
    ))
}

/// `GET /me`: the session's user plus their headline stats.
pub async fn me(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = require_user(&state, &jar).await?;

    let db = state.clone();
    let user_id = user.id.clone();
    let limit = state.second_degree_limit;
    let stats = spawn_blocking(move || build_graph(&db.db, &user_id, limit).map(|g| g.stats))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(AuthResponse { user, stats }))
}
