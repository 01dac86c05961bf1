use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    comments::{
        Comment, CommentAuthor, CommentListResponse, CommentResponse, CreateComment, UpdateComment,
    },
    error::AppError,
    pagination::{PageQuery, Pagination},
    storage::Storage,
};

/// Helper struct for fetching comments with author info
#[derive(FromRow)]
struct CommentFromDb {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    author_name: String,
    author_image: Option<String>,
    likes_count: i64,
    is_liked: bool,
}

impl CommentFromDb {
    fn into_response(self, viewer: Option<Uuid>) -> CommentResponse {
        CommentResponse {
            id: self.id,
            post_id: self.post_id,
            content: self.content,
            author: CommentAuthor {
                id: self.author_id,
                name: self.author_name,
                image: self.author_image,
            },
            likes_count: self.likes_count,
            is_liked: self.is_liked,
            is_owner: viewer == Some(self.author_id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

async fn presign_comment(storage: &Storage, mut comment: CommentResponse) -> CommentResponse {
    comment.author.image = storage.resolve_url(comment.author.image).await;
    comment
}

/// Verifies the target post exists and is not soft-deleted.
async fn ensure_live_post(pool: &PgPool, post_id: Uuid) -> Result<(), AppError> {
    sqlx::query("SELECT id FROM posts WHERE id = $1 AND deleted_at IS NULL")
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .map_err(|_| AppError::InternalServerError)?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(())
}

/// Create a comment on a post
/// POST /api/comments/posts/:post_id
pub async fn create_comment(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    user: AuthUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CreateComment>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    ensure_live_post(&pool, post_id).await?;

    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, author_id, content)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(post_id)
    .bind(user.id)
    .bind(&payload.content)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create comment: {:?}", e);
        AppError::InternalServerError
    })?;

    let response = get_comment_response(&pool, &storage, comment.id, Some(user.id)).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// List a post's comments, oldest first
/// GET /api/comments/posts/:post_id
pub async fn get_post_comments(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    viewer: Option<AuthUser>,
    Path(post_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    ensure_live_post(&pool, post_id).await?;

    let (page, limit, offset) = query.clamp();
    let viewer_id = viewer.map(|v| v.id);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND deleted_at IS NULL",
    )
    .bind(post_id)
    .fetch_one(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    let rows = sqlx::query_as::<_, CommentFromDb>(
        r#"
        SELECT
            c.id, c.post_id, c.author_id, c.content, c.created_at, c.updated_at,
            u.name AS author_name, u.image AS author_image,
            (SELECT COUNT(*) FROM comment_likes cl WHERE cl.comment_id = c.id) AS likes_count,
            EXISTS (SELECT 1 FROM comment_likes cl WHERE cl.comment_id = c.id AND cl.user_id = $2) AS is_liked
        FROM comments c
        JOIN users u ON c.author_id = u.id
        WHERE c.post_id = $1 AND c.deleted_at IS NULL
        ORDER BY c.created_at ASC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(post_id)
    .bind(viewer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch comments: {:?}", e);
        AppError::InternalServerError
    })?;

    let mut comments = Vec::with_capacity(rows.len());
    for row in rows {
        comments.push(presign_comment(&storage, row.into_response(viewer_id)).await);
    }

    Ok(Json(CommentListResponse {
        comments,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// Update a comment (author only)
/// PUT /api/comments/:id
pub async fn update_comment(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateComment>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let result = sqlx::query(
        "UPDATE comments SET content = $1, updated_at = NOW() WHERE id = $2 AND author_id = $3 AND deleted_at IS NULL",
    )
    .bind(&payload.content)
    .bind(id)
    .bind(user.id)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Comment not found or unauthorized".to_string(),
        ));
    }

    let response = get_comment_response(&pool, &storage, id, Some(user.id)).await?;

    Ok(Json(response))
}

/// Soft-delete a comment (author only)
/// DELETE /api/comments/:id
pub async fn delete_comment(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        "UPDATE comments SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND author_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(user.id)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Comment not found or unauthorized".to_string(),
        ));
    }

    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}

/// Fetches a single live comment with author info and viewer flags.
async fn get_comment_response(
    pool: &PgPool,
    storage: &Storage,
    comment_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<CommentResponse, AppError> {
    let row = sqlx::query_as::<_, CommentFromDb>(
        r#"
        SELECT
            c.id, c.post_id, c.author_id, c.content, c.created_at, c.updated_at,
            u.name AS author_name, u.image AS author_image,
            (SELECT COUNT(*) FROM comment_likes cl WHERE cl.comment_id = c.id) AS likes_count,
            EXISTS (SELECT 1 FROM comment_likes cl WHERE cl.comment_id = c.id AND cl.user_id = $2) AS is_liked
        FROM comments c
        JOIN users u ON c.author_id = u.id
        WHERE c.id = $1 AND c.deleted_at IS NULL
        "#,
    )
    .bind(comment_id)
    .bind(viewer)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch comment: {:?}", e);
        AppError::InternalServerError
    })?
    .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    Ok(presign_comment(storage, row.into_response(viewer)).await)
}
