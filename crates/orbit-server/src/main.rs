mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use orbit_api::rate_limit::RateLimiter;
use orbit_api::{AppState, AppStateInner, auth, friends, graph, users};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orbit=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = orbit_db::Database::open(&config.db_path)?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        bot_token: config.bot_token.clone(),
        session_secret: config.session_secret.clone(),
        auth_max_age_sec: config.auth_max_age_sec,
        second_degree_limit: config.second_degree_limit,
        rate_limiter: RateLimiter::new(),
    });

    // Periodic rate limiter cleanup (every 5 minutes)
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter.purge_expired();
        }
    });

    let app = Router::new()
        .route("/auth/telegram", post(auth::telegram_auth))
        .route("/me", get(auth::me))
        .route("/friends/graph", get(graph::friend_graph))
        .route("/friends/request", post(friends::send_request))
        .route("/friends/accept", post(friends::accept_request))
        .route("/users/search", get(users::search))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Orbit server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
