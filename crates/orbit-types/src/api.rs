use serde::{Deserialize, Serialize};

use crate::graph::{GraphResponse, GraphStats, IncomingRequest};
use crate::models::UserPublic;

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct TelegramAuthRequest {
    #[serde(rename = "initData")]
    pub init_data: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserPublic,
    pub stats: GraphStats,
}

// -- Friends --

#[derive(Debug, Deserialize)]
pub struct SendRequestBody {
    #[serde(rename = "targetUsername")]
    pub target_username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequestResponse {
    pub status: String,
    pub friendship_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptRequestBody {
    #[serde(rename = "requestId")]
    pub request_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRequestResponse {
    pub status: String,
    pub friendship_id: String,
}

/// Graph payload plus the incoming requests the client can act on.
#[derive(Debug, Serialize)]
pub struct FriendGraphBody {
    #[serde(flatten)]
    pub graph: GraphResponse,
    #[serde(rename = "pendingIncomingRequests")]
    pub pending_incoming_requests: Vec<IncomingRequest>,
}

// -- Search --

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub users: Vec<UserPublic>,
}
