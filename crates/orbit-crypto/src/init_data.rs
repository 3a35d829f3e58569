use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Domain-separation key Telegram uses when deriving the per-bot secret.
const WEB_APP_DATA: &[u8] = b"WebAppData";

#[derive(Debug, Error)]
pub enum InitDataError {
    #[error("init data is not valid urlencoded form data")]
    Malformed,
    #[error("init data is missing hash")]
    MissingHash,
    #[error("init data is missing auth_date")]
    MissingAuthDate,
    #[error("invalid auth_date")]
    InvalidAuthDate,
    #[error("init data is expired")]
    Expired,
    #[error("init data is missing user payload")]
    MissingUser,
    #[error("unable to parse user payload")]
    InvalidUser,
    #[error("user payload is missing id")]
    MissingUserId,
    #[error("invalid init data hash")]
    HashMismatch,
}

/// Verified identity assertion extracted from a Mini App's `initData`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramAuthPayload {
    pub telegram_id: String,
    pub username: Option<String>,
    pub display_name: String,
    pub auth_date: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    #[serde(default)]
    id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

/// Verify a Telegram Mini App `initData` string against the bot token.
///
/// The signed fields are every `key=value` pair except `hash`, sorted
/// lexicographically and joined with newlines. The signing key is
/// HMAC-SHA256("WebAppData", bot_token), and the tag is the hex HMAC of the
/// data-check string under that key. The comparison is constant-time and
/// `auth_date` must be within `max_age_sec` of `now_sec` in either direction,
/// so both stale assertions and future clock skew are rejected.
pub fn verify_init_data(
    init_data: &str,
    bot_token: &str,
    max_age_sec: i64,
    now_sec: i64,
) -> Result<TelegramAuthPayload, InitDataError> {
    let fields: Vec<(String, String)> =
        serde_urlencoded::from_str(init_data).map_err(|_| InitDataError::Malformed)?;

    let received_hash = fields
        .iter()
        .find(|(key, _)| key == "hash")
        .map(|(_, value)| value.as_str())
        .ok_or(InitDataError::MissingHash)?;

    let auth_date_raw = fields
        .iter()
        .find(|(key, _)| key == "auth_date")
        .map(|(_, value)| value.as_str())
        .ok_or(InitDataError::MissingAuthDate)?;

    let auth_date: i64 = auth_date_raw
        .parse()
        .map_err(|_| InitDataError::InvalidAuthDate)?;

    if (now_sec - auth_date).abs() > max_age_sec {
        return Err(InitDataError::Expired);
    }

    let user_raw = fields
        .iter()
        .find(|(key, _)| key == "user")
        .map(|(_, value)| value.as_str())
        .ok_or(InitDataError::MissingUser)?;

    let user: TelegramUser =
        serde_json::from_str(user_raw).map_err(|_| InitDataError::InvalidUser)?;

    if user.id == 0 {
        return Err(InitDataError::MissingUserId);
    }

    let data_check_string = to_data_check_string(&fields);

    let expected = hex::decode(received_hash).map_err(|_| InitDataError::HashMismatch)?;
    let mut mac = HmacSha256::new_from_slice(&derive_secret(bot_token))
        .map_err(|_| InitDataError::HashMismatch)?;
    mac.update(data_check_string.as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| InitDataError::HashMismatch)?;

    Ok(TelegramAuthPayload {
        telegram_id: user.id.to_string(),
        username: user.username.as_deref().map(str::to_lowercase),
        display_name: build_display_name(&user),
        auth_date,
    })
}

fn derive_secret(bot_token: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(WEB_APP_DATA)
        .expect("HMAC accepts keys of any length");
    mac.update(bot_token.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn to_data_check_string(fields: &[(String, String)]) -> String {
    let mut pairs: Vec<String> = fields
        .iter()
        .filter(|(key, _)| key != "hash")
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    pairs.sort();
    pairs.join("\n")
}

fn build_display_name(user: &TelegramUser) -> String {
    let first = user.first_name.as_deref().unwrap_or("").trim();
    let last = user.last_name.as_deref().unwrap_or("").trim();
    let full = format!("{first} {last}");
    let full = full.trim();
    if !full.is_empty() {
        return full.to_string();
    }
    if let Some(username) = &user.username {
        return username.clone();
    }
    format!("user_{}", user.id)
}
