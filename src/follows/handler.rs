use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    follows::{Follow, FollowResponse, FollowUser, FollowersResponse, FollowingResponse},
    pagination::{PageQuery, Pagination},
    storage::Storage,
};

async fn presign_user(storage: &Storage, mut user: FollowUser) -> FollowUser {
    user.image = storage.resolve_url(user.image).await;
    user
}

/// Follow a user
/// POST /api/follows/:user_id
pub async fn follow_user(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if user.id == user_id {
        return Err(AppError::BadRequest("Cannot follow yourself".to_string()));
    }

    let target = sqlx::query_as::<_, FollowUser>(
        "SELECT id, name, image, bio FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let existing =
        sqlx::query("SELECT id FROM follows WHERE follower_id = $1 AND following_id = $2")
            .bind(user.id)
            .bind(user_id)
            .fetch_optional(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?;

    if existing.is_some() {
        return Err(AppError::BadRequest(
            "Already following this user".to_string(),
        ));
    }

    let follow = sqlx::query_as::<_, Follow>(
        r#"
        INSERT INTO follows (follower_id, following_id)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create follow: {:?}", e);
        AppError::InternalServerError
    })?;

    let response = FollowResponse {
        id: follow.id,
        follower_id: follow.follower_id,
        following_id: follow.following_id,
        created_at: follow.created_at,
        following: presign_user(&storage, target).await,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Unfollow a user
/// DELETE /api/follows/:user_id
pub async fn unfollow_user(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(user.id)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    if result.rows_affected() == 0 {
        return Err(AppError::BadRequest(
            "Not following this user".to_string(),
        ));
    }

    Ok(Json(json!({ "success": true })))
}

/// Get a user's followers, most recent follow first
/// GET /api/follows/:user_id/followers
pub async fn get_followers(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = query.clamp();

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE following_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    let rows = sqlx::query_as::<_, FollowUser>(
        r#"
        SELECT u.id, u.name, u.image, u.bio
        FROM follows f
        JOIN users u ON f.follower_id = u.id
        WHERE f.following_id = $1
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    let mut followers = Vec::with_capacity(rows.len());
    for row in rows {
        followers.push(presign_user(&storage, row).await);
    }

    Ok(Json(FollowersResponse {
        followers,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// Get the users a user is following
/// GET /api/follows/:user_id/following
pub async fn get_following(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = query.clamp();

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .map_err(|_| AppError::InternalServerError)?;

    let rows = sqlx::query_as::<_, FollowUser>(
        r#"
        SELECT u.id, u.name, u.image, u.bio
        FROM follows f
        JOIN users u ON f.following_id = u.id
        WHERE f.follower_id = $1
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    let mut following = Vec::with_capacity(rows.len());
    for row in rows {
        following.push(presign_user(&storage, row).await);
    }

    Ok(Json(FollowingResponse {
        following,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// Check whether the current user follows a target user
/// GET /api/follows/:user_id/check
pub async fn check_follow(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let is_following =
        sqlx::query("SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2")
            .bind(user.id)
            .bind(user_id)
            .fetch_optional(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?
            .is_some();

    Ok(Json(json!({ "isFollowing": is_following })))
}
