use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::pagination::Pagination;

pub mod handler;

/// Database model for a comment
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateComment {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Comment must be between 1 and 2000 characters"
    ))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateComment {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Comment must be between 1 and 2000 characters"
    ))]
    pub content: String,
}

/// Author info embedded in comment responses
#[derive(Debug, Serialize)]
pub struct CommentAuthor {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub author: CommentAuthor,
    pub likes_count: i64,
    pub is_liked: bool,
    pub is_owner: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentResponse>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_content_bounds_are_enforced() {
        assert!(CreateComment {
            content: String::new()
        }
        .validate()
        .is_err());
        assert!(CreateComment {
            content: "x".repeat(2001)
        }
        .validate()
        .is_err());
        assert!(CreateComment {
            content: "nice post".to_string()
        }
        .validate()
        .is_ok());
    }
}
