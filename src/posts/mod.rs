use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{pagination::Pagination, patch};

pub mod handler;

/// Database model for a post. `deleted_at` marks soft deletion; deleted rows
/// are excluded from every read but kept for audit.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePost {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: String,
    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content must be between 1 and 10000 characters"
    ))]
    pub content: String,
    #[validate(url(message = "Image must be a valid URL"))]
    pub image: Option<String>,
}

/// Partial update; `image` distinguishes "omitted" from "set to null".
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePost {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: Option<String>,
    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content must be between 1 and 10000 characters"
    ))]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "patch::nullable")]
    #[validate(url(message = "Image must be a valid URL"))]
    pub image: Option<Option<String>>,
}

/// Author info embedded in post responses.
#[derive(Debug, Serialize)]
pub struct PostAuthor {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub author: PostAuthor,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
    pub is_owner: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<PostResponse>,
    pub pagination: Pagination,
}

/// Query parameters for the post feed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub author_id: Option<Uuid>,
    pub search: Option<String>,
}
