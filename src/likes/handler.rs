use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{auth::AuthUser, error::AppError, likes::LikeToggleResponse};

/// Flips the (post, user) like row and returns the resulting state.
///
/// No lock is taken; concurrent toggles are arbitrated by the
/// (post_id, user_id) uniqueness constraint.
async fn toggle_post_like_row(
    pool: &PgPool,
    post_id: Uuid,
    user_id: Uuid,
) -> Result<bool, AppError> {
    let existing = sqlx::query("SELECT id FROM likes WHERE post_id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    if existing.is_some() {
        sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(|_| AppError::InternalServerError)?;
        Ok(false)
    } else {
        sqlx::query(
            r#"
            INSERT INTO likes (post_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (post_id, user_id) DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;
        Ok(true)
    }
}

async fn toggle_comment_like_row(
    pool: &PgPool,
    comment_id: Uuid,
    user_id: Uuid,
) -> Result<bool, AppError> {
    let existing =
        sqlx::query("SELECT id FROM comment_likes WHERE comment_id = $1 AND user_id = $2")
            .bind(comment_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(|_| AppError::InternalServerError)?;

    if existing.is_some() {
        sqlx::query("DELETE FROM comment_likes WHERE comment_id = $1 AND user_id = $2")
            .bind(comment_id)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(|_| AppError::InternalServerError)?;
        Ok(false)
    } else {
        sqlx::query(
            r#"
            INSERT INTO comment_likes (comment_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (comment_id, user_id) DO NOTHING
            "#,
        )
        .bind(comment_id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;
        Ok(true)
    }
}

/// Toggle a like on a post
/// POST /api/likes/posts/:post_id
pub async fn toggle_post_like(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM posts WHERE id = $1 AND deleted_at IS NULL")
        .bind(post_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let liked = toggle_post_like_row(&pool, post_id, user.id).await?;

    Ok(Json(LikeToggleResponse { liked }))
}

/// Toggle a like on a comment
/// POST /api/likes/comments/:comment_id
pub async fn toggle_comment_like(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM comments WHERE id = $1 AND deleted_at IS NULL")
        .bind(comment_id)
        .fetch_optional(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    let liked = toggle_comment_like_row(&pool, comment_id, user.id).await?;

    Ok(Json(LikeToggleResponse { liked }))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_user(pool: &PgPool, name: &str) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO users (name, email) VALUES ($1, $1 || '@example.com') RETURNING id",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn seed_post(pool: &PgPool, author_id: Uuid) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO posts (author_id, title, content) VALUES ($1, 'title', 'body') RETURNING id",
        )
        .bind(author_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn double_toggle_restores_original_state(pool: PgPool) {
        let user_id = seed_user(&pool, "reader").await;
        let post_id = seed_post(&pool, user_id).await;

        assert!(toggle_post_like_row(&pool, post_id, user_id).await.unwrap());
        assert!(!toggle_post_like_row(&pool, post_id, user_id).await.unwrap());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);

        // toggling again from the empty state likes once, not twice
        assert!(toggle_post_like_row(&pool, post_id, user_id).await.unwrap());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    async fn comment_like_toggle_round_trips(pool: PgPool) {
        let user_id = seed_user(&pool, "reader").await;
        let post_id = seed_post(&pool, user_id).await;
        let comment_id: Uuid = sqlx::query_scalar(
            "INSERT INTO comments (post_id, author_id, content) VALUES ($1, $2, 'hi') RETURNING id",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();

        assert!(toggle_comment_like_row(&pool, comment_id, user_id)
            .await
            .unwrap());
        assert!(!toggle_comment_like_row(&pool, comment_id, user_id)
            .await
            .unwrap());
    }
}
