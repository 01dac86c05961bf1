use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    error::AppError,
    pagination::{PageQuery, Pagination},
    posts::PostListResponse,
    storage::Storage,
    users::{UpdateUser, UserProfileResponse},
};

/// Helper struct for fetching a user with aggregate counts
#[derive(FromRow)]
struct UserFromDb {
    id: Uuid,
    name: String,
    email: String,
    image: Option<String>,
    bio: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    posts_count: i64,
    followers_count: i64,
    following_count: i64,
}

impl UserFromDb {
    /// `include_email` is true only when the caller is the profile owner.
    fn into_response(self, include_email: bool) -> UserProfileResponse {
        UserProfileResponse {
            id: self.id,
            name: self.name,
            email: include_email.then_some(self.email),
            image: self.image,
            bio: self.bio,
            posts_count: self.posts_count,
            followers_count: self.followers_count,
            following_count: self.following_count,
            created_at: self.created_at,
        }
    }
}

async fn fetch_profile(pool: &PgPool, user_id: Uuid) -> Result<UserFromDb, AppError> {
    sqlx::query_as::<_, UserFromDb>(
        r#"
        SELECT
            u.id, u.name, u.email, u.image, u.bio, u.created_at,
            (SELECT COUNT(*) FROM posts p WHERE p.author_id = u.id AND p.deleted_at IS NULL) AS posts_count,
            (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.id) AS followers_count,
            (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id) AS following_count
        FROM users u
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch user: {:?}", e);
        AppError::InternalServerError
    })?
    .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Applies a partial profile update in a single statement so a failure
/// cannot leave some fields written and others not.
async fn apply_profile_update(
    pool: &PgPool,
    user_id: Uuid,
    payload: &UpdateUser,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE users
        SET name = COALESCE($1, name),
            bio = CASE WHEN $2 THEN $3 ELSE bio END,
            image = CASE WHEN $4 THEN $5 ELSE image END,
            updated_at = NOW()
        WHERE id = $6
        "#,
    )
    .bind(&payload.name)
    .bind(payload.bio.is_some())
    .bind(payload.bio.clone().flatten())
    .bind(payload.image.is_some())
    .bind(payload.image.clone().flatten())
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    Ok(())
}

async fn presign_profile(
    storage: &Storage,
    mut profile: UserProfileResponse,
) -> UserProfileResponse {
    profile.image = storage.resolve_url(profile.image).await;
    profile
}

/// Get the current user's profile
/// GET /api/users/me
pub async fn get_me(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let profile = fetch_profile(&pool, user.id).await?.into_response(true);

    Ok(Json(presign_profile(&storage, profile).await))
}

/// Update the current user's profile
/// PUT /api/users/me
pub async fn update_me(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    user: AuthUser,
    Json(payload): Json<UpdateUser>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    apply_profile_update(&pool, user.id, &payload).await?;

    let profile = fetch_profile(&pool, user.id).await?.into_response(true);

    Ok(Json(presign_profile(&storage, profile).await))
}

/// Get a user's profile; email is included only for the owner
/// GET /api/users/:id
pub async fn get_user(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    viewer: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let is_own_profile = viewer.map(|v| v.id) == Some(id);
    let profile = fetch_profile(&pool, id)
        .await?
        .into_response(is_own_profile);

    Ok(Json(presign_profile(&storage, profile).await))
}

/// Get a user's posts, newest first
/// GET /api/users/:id/posts
pub async fn get_user_posts(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    viewer: Option<AuthUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = query.clamp();
    let viewer_id = viewer.map(|v| v.id);

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_one(&pool)
            .await
            .map_err(|_| AppError::InternalServerError)?;

    let rows = sqlx::query_as::<_, crate::posts::handler::PostFromDb>(
        r#"
        SELECT
            p.id, p.title, p.content, p.image, p.created_at, p.updated_at, p.author_id,
            u.name AS author_name, u.image AS author_image, u.bio AS author_bio,
            (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count,
            (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id AND c.deleted_at IS NULL) AS comments_count,
            EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $2) AS is_liked
        FROM posts p
        JOIN users u ON p.author_id = u.id
        WHERE p.author_id = $1 AND p.deleted_at IS NULL
        ORDER BY p.created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(id)
    .bind(viewer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch user posts: {:?}", e);
        AppError::InternalServerError
    })?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in rows {
        posts.push(
            crate::posts::handler::presign_post(&storage, row.into_response(viewer_id)).await,
        );
    }

    Ok(Json(PostListResponse {
        posts,
        pagination: Pagination::new(page, limit, total),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_user(pool: &PgPool, name: &str) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO users (name, email, bio, image) VALUES ($1, $1 || '@example.com', 'old bio', 'https://b.s3.amazonaws.com/a.png') RETURNING id",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn profile_update_distinguishes_absent_from_null(pool: PgPool) {
        let user_id = seed_user(&pool, "ada").await;

        // absent bio and image stay untouched
        let payload = UpdateUser {
            name: Some("ada lovelace".to_string()),
            bio: None,
            image: None,
        };
        apply_profile_update(&pool, user_id, &payload).await.unwrap();

        let row = fetch_profile(&pool, user_id).await.unwrap();
        assert_eq!(row.name, "ada lovelace");
        assert_eq!(row.bio.as_deref(), Some("old bio"));
        assert!(row.image.is_some());

        // explicit nulls clear them, still in a single statement
        let payload = UpdateUser {
            name: None,
            bio: Some(None),
            image: Some(None),
        };
        apply_profile_update(&pool, user_id, &payload).await.unwrap();

        let row = fetch_profile(&pool, user_id).await.unwrap();
        assert_eq!(row.name, "ada lovelace");
        assert_eq!(row.bio, None);
        assert_eq!(row.image, None);
    }
}
