use serde::{Deserialize, Serialize};

/// User record as exposed to clients. Never carries the session secret or
/// anything derived from raw init data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: String,
    pub telegram_id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_seed: String,
}

/// A symmetric connection between two users, stored as a canonical ordered
/// pair (`user_a_id < user_b_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub id: String,
    pub user_a_id: String,
    pub user_b_id: String,
    pub created_at: String,
}

/// Directed connection request. `Rejected` and `Canceled` are reserved:
/// no current code path sets them, but they are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Canceled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Canceled => "canceled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "rejected" => Some(RequestStatus::Rejected),
            "canceled" => Some(RequestStatus::Canceled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub status: RequestStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Normalize a user-supplied handle: trim, lowercase, strip one leading `@`.
/// Idempotent: normalizing twice yields the same string.
pub fn normalize_handle(value: &str) -> String {
    let trimmed = value.trim().to_lowercase();
    match trimmed.strip_prefix('@') {
        Some(rest) => rest.to_string(),
        None => trimmed,
    }
}

/// Order an unordered user pair into its single canonical representation.
/// Every friendship row is written with this ordering so the
/// `UNIQUE(user_a_id, user_b_id)` constraint catches duplicates regardless
/// of which side initiated.
pub fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a < b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_is_commutative() {
        assert_eq!(canonical_pair("a", "b"), canonical_pair("b", "a"));
        assert_eq!(canonical_pair("zz", "aa"), ("aa", "zz"));
        assert_eq!(canonical_pair("same", "same"), ("same", "same"));
    }

    #[test]
    fn normalize_handle_is_idempotent() {
        let once = normalize_handle("  @Alice ");
        assert_eq!(once, "alice");
        assert_eq!(normalize_handle(&once), once);
    }

    #[test]
    fn normalize_handle_strips_exactly_one_at() {
        assert_eq!(normalize_handle("@@bob"), "@bob");
        assert_eq!(normalize_handle("@bob"), "bob");
    }

    #[test]
    fn normalize_handle_case_folds() {
        assert_eq!(normalize_handle("BoB"), "bob");
    }

    #[test]
    fn request_status_round_trips() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Rejected,
            RequestStatus::Canceled,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("bogus"), None);
    }
}
