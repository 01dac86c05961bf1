use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pagination::Pagination;

pub mod handler;

/// Database model for a follow relationship
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// User summary in follow responses and lists
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct FollowUser {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub bio: Option<String>,
}

/// Response for a newly created follow
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub following: FollowUser,
}

#[derive(Debug, Serialize)]
pub struct FollowersResponse {
    pub followers: Vec<FollowUser>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct FollowingResponse {
    pub following: Vec<FollowUser>,
    pub pagination: Pagination,
}
