pub mod auth;
pub mod current_user;
pub mod error;
pub mod friends;
pub mod graph;
pub mod rate_limit;
pub mod users;

use std::sync::Arc;

use orbit_db::Database;

use crate::rate_limit::RateLimiter;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub bot_token: String,
    pub session_secret: String,
    pub auth_max_age_sec: i64,
    pub second_degree_limit: usize,
    pub rate_limiter: RateLimiter,
}
