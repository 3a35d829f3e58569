use serde::{Deserialize, Serialize};

use crate::models::UserPublic;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub connected: usize,
    pub pending_incoming: usize,
}

/// A pending request addressed to the viewer, carrying the request id the
/// client needs to call accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingRequest {
    pub id: String,
    pub from: UserPublic,
}

/// The viewer's social neighborhood: direct friends, bounded second-degree
/// contacts, the edge list connecting them, and pending requests in both
/// directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphResponse {
    pub me: UserPublic,
    pub direct_friends: Vec<UserPublic>,
    pub second_degree: Vec<UserPublic>,
    pub edges: Vec<GraphEdge>,
    pub pending_incoming: Vec<UserPublic>,
    pub pending_outgoing: Vec<UserPublic>,
    pub stats: GraphStats,
}
