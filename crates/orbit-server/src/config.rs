//! Server configuration loaded from environment variables.
//!
//! The bot token and session secret are required; the service cannot verify
//! identities or mint sessions without them. Everything else has a default
//! suitable for local development.

use std::path::PathBuf;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token shared with the issuing platform.
    /// Env: `TELEGRAM_BOT_TOKEN` (required)
    pub bot_token: String,

    /// HMAC secret for session tokens. Rotating it invalidates every
    /// outstanding session at once.
    /// Env: `SESSION_SECRET` (required)
    pub session_secret: String,

    /// SQLite database path. Env: `ORBIT_DB_PATH`, default `orbit.db`.
    pub db_path: PathBuf,

    /// Bind host. Env: `ORBIT_HOST`, default `0.0.0.0`.
    pub host: String,

    /// Bind port. Env: `ORBIT_PORT`, default `3000`.
    pub port: u16,

    /// Maximum accepted age of an identity assertion, seconds, in either
    /// direction. Env: `AUTH_MAX_AGE_SEC`, default `300`.
    pub auth_max_age_sec: i64,

    /// Hard cap on second-degree members per graph query.
    /// Env: `SECOND_DEGREE_LIMIT`, default `60`.
    pub second_degree_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .context("missing required environment variable: TELEGRAM_BOT_TOKEN")?;
        let session_secret = std::env::var("SESSION_SECRET")
            .context("missing required environment variable: SESSION_SECRET")?;

        Ok(Self {
            bot_token,
            session_secret,
            db_path: PathBuf::from(env_or("ORBIT_DB_PATH", "orbit.db")),
            host: env_or("ORBIT_HOST", "0.0.0.0"),
            port: parse_or("ORBIT_PORT", 3000),
            auth_max_age_sec: parse_or("AUTH_MAX_AGE_SEC", 300),
            second_degree_limit: parse_or("SECOND_DEGREE_LIMIT", 60),
        })
    }
}

fn env_or(name: &str, fallback: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| fallback.to_string())
}

fn parse_or<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    match std::env::var(name) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %value, "invalid value, using default");
            fallback
        }),
        Err(_) => fallback,
    }
}
