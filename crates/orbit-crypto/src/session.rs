use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "tg_session";
pub const SESSION_TTL_SEC: i64 = 60 * 60 * 24 * 7;

/// Claims carried by a session token. Stateless: expiry is the only
/// invalidation mechanism, and rotating the secret invalidates everything
/// outstanding at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    /// Local user id.
    pub uid: String,
    /// Telegram id the session was minted for.
    pub tid: String,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Mint a session token: `base64url(payload).base64url(signature)`.
pub fn create_session_token(user_id: &str, telegram_id: &str, secret: &str, now_sec: i64) -> String {
    let payload = SessionPayload {
        uid: user_id.to_string(),
        tid: telegram_id.to_string(),
        exp: now_sec + SESSION_TTL_SEC,
    };

    let json = serde_json::to_string(&payload).expect("session payload serializes");
    let encoded = B64URL.encode(json);
    let signature = B64URL.encode(sign(&encoded, secret));
    format!("{encoded}.{signature}")
}

/// Verify a session token and return its payload, or `None` on any failure:
/// wrong shape, bad signature, undecodable payload, or expiry in the past.
/// Callers get no detail about which check failed.
pub fn verify_session_token(token: &str, secret: &str, now_sec: i64) -> Option<SessionPayload> {
    let mut parts = token.split('.');
    let encoded = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() || encoded.is_empty() || signature.is_empty() {
        return None;
    }

    let received = B64URL.decode(signature).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(encoded.as_bytes());
    mac.verify_slice(&received).ok()?;

    let json = B64URL.decode(encoded).ok()?;
    let payload: SessionPayload = serde_json::from_slice(&json).ok()?;

    if payload.exp < now_sec {
        return None;
    }
    Some(payload)
}

fn sign(value: &str, secret: &str) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(value.as_bytes());
    mac.finalize().into_bytes().to_vec()
}
