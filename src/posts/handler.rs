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
    error::AppError,
    pagination::{self, Pagination},
    posts::{CreatePost, Post, PostAuthor, PostListQuery, PostListResponse, PostResponse, UpdatePost},
    storage::Storage,
};

/// Helper struct for fetching posts with author info and counts
#[derive(FromRow)]
pub(crate) struct PostFromDb {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    // author fields
    pub author_id: Uuid,
    pub author_name: String,
    pub author_image: Option<String>,
    pub author_bio: Option<String>,
    // aggregates
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
}

impl PostFromDb {
    pub(crate) fn into_response(self, viewer: Option<Uuid>) -> PostResponse {
        PostResponse {
            id: self.id,
            title: self.title,
            content: self.content,
            image: self.image,
            author: PostAuthor {
                id: self.author_id,
                name: self.author_name,
                image: self.author_image,
                bio: self.author_bio,
            },
            likes_count: self.likes_count,
            comments_count: self.comments_count,
            is_liked: self.is_liked,
            is_owner: viewer == Some(self.author_id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Escapes LIKE metacharacters so user-supplied search text matches literally.
fn escape_like(pattern: &str) -> String {
    pattern
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Rewrites stored media references into presigned read URLs.
pub(crate) async fn presign_post(storage: &Storage, mut post: PostResponse) -> PostResponse {
    post.image = storage.resolve_url(post.image).await;
    post.author.image = storage.resolve_url(post.author.image).await;
    post
}

async fn fetch_post(
    pool: &PgPool,
    post_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<Option<PostFromDb>, sqlx::Error> {
    sqlx::query_as::<_, PostFromDb>(
        r#"
        SELECT
            p.id, p.title, p.content, p.image, p.created_at, p.updated_at, p.author_id,
            u.name AS author_name, u.image AS author_image, u.bio AS author_bio,
            (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count,
            (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id AND c.deleted_at IS NULL) AS comments_count,
            EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $2) AS is_liked
        FROM posts p
        JOIN users u ON p.author_id = u.id
        WHERE p.id = $1 AND p.deleted_at IS NULL
        "#,
    )
    .bind(post_id)
    .bind(viewer)
    .fetch_optional(pool)
    .await
}

async fn count_posts(
    pool: &PgPool,
    author_id: Option<Uuid>,
    search: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let search = search.map(escape_like);

    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM posts p
        WHERE p.deleted_at IS NULL
          AND ($1::uuid IS NULL OR p.author_id = $1)
          AND ($2::text IS NULL
               OR p.title ILIKE '%' || $2 || '%'
               OR p.content ILIKE '%' || $2 || '%')
        "#,
    )
    .bind(author_id)
    .bind(search)
    .fetch_one(pool)
    .await
}

async fn fetch_posts_page(
    pool: &PgPool,
    author_id: Option<Uuid>,
    search: Option<&str>,
    viewer: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostFromDb>, sqlx::Error> {
    let search = search.map(escape_like);

    sqlx::query_as::<_, PostFromDb>(
        r#"
        SELECT
            p.id, p.title, p.content, p.image, p.created_at, p.updated_at, p.author_id,
            u.name AS author_name, u.image AS author_image, u.bio AS author_bio,
            (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count,
            (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id AND c.deleted_at IS NULL) AS comments_count,
            EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $3) AS is_liked
        FROM posts p
        JOIN users u ON p.author_id = u.id
        WHERE p.deleted_at IS NULL
          AND ($1::uuid IS NULL OR p.author_id = $1)
          AND ($2::text IS NULL
               OR p.title ILIKE '%' || $2 || '%'
               OR p.content ILIKE '%' || $2 || '%')
        ORDER BY p.created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(author_id)
    .bind(search)
    .bind(viewer)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Applies a partial update in a single statement; the ownership filter
/// doubles as the not-found check, so a half-updated row can never be
/// observed by a concurrent reader or left behind on failure.
async fn apply_post_update(
    pool: &PgPool,
    post_id: Uuid,
    user_id: Uuid,
    payload: &UpdatePost,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE posts
        SET title = COALESCE($1, title),
            content = COALESCE($2, content),
            image = CASE WHEN $3 THEN $4 ELSE image END,
            updated_at = NOW()
        WHERE id = $5 AND author_id = $6 AND deleted_at IS NULL
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.content)
    .bind(payload.image.is_some())
    .bind(payload.image.clone().flatten())
    .bind(post_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Post not found or unauthorized".to_string(),
        ));
    }

    Ok(())
}

/// Create a post
/// POST /api/posts
pub async fn create_post(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    user: AuthUser,
    Json(payload): Json<CreatePost>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (author_id, title, content, image)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&payload.title)
    .bind(&payload.content)
    .bind(&payload.image)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::InternalServerError
    })?;

    let response = get_post_response(&pool, &storage, post.id, Some(user.id)).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// List posts, newest first, with optional author and search filters
/// GET /api/posts
pub async fn get_posts(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    viewer: Option<AuthUser>,
    Query(query): Query<PostListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = pagination::clamp(query.page, query.limit);
    let viewer_id = viewer.map(|v| v.id);

    let total = count_posts(&pool, query.author_id, query.search.as_deref())
        .await
        .map_err(|_| AppError::InternalServerError)?;

    let rows = fetch_posts_page(
        &pool,
        query.author_id,
        query.search.as_deref(),
        viewer_id,
        limit,
        offset,
    )
    .await
    .map_err(|e| {
        tracing::error!("Feed error: {:?}", e);
        AppError::InternalServerError
    })?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in rows {
        posts.push(presign_post(&storage, row.into_response(viewer_id)).await);
    }

    Ok(Json(PostListResponse {
        posts,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// Get a post by id
/// GET /api/posts/:id
pub async fn get_post(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    viewer: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let response = get_post_response(&pool, &storage, id, viewer.map(|v| v.id)).await?;

    Ok(Json(response))
}

/// Update a post (owner only)
/// PUT /api/posts/:id
pub async fn update_post(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePost>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    apply_post_update(&pool, id, user.id, &payload).await?;

    let response = get_post_response(&pool, &storage, id, Some(user.id)).await?;

    Ok(Json(response))
}

/// Soft-delete a post (owner only)
/// DELETE /api/posts/:id
pub async fn delete_post(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        "UPDATE posts SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND author_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(user.id)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Post not found or unauthorized".to_string(),
        ));
    }

    Ok(Json(json!({ "message": "Post deleted successfully" })))
}

/// Fetches a single live post with author, counts, and viewer flags.
pub(crate) async fn get_post_response(
    pool: &PgPool,
    storage: &Storage,
    post_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<PostResponse, AppError> {
    let row = fetch_post(pool, post_id, viewer)
        .await
        .map_err(|e| {
            tracing::error!("Fetch post error: {:?}", e);
            AppError::InternalServerError
        })?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(presign_post(storage, row.into_response(viewer)).await)
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

    async fn seed_post(pool: &PgPool, author_id: Uuid, title: &str) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO posts (author_id, title, content) VALUES ($1, $2, 'body') RETURNING id",
        )
        .bind(author_id)
        .bind(title)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[sqlx::test]
    async fn search_matches_metacharacters_literally(pool: PgPool) {
        let author = seed_user(&pool, "author").await;
        seed_post(&pool, author, "sale: 50% off").await;
        seed_post(&pool, author, "nothing to see").await;

        // "%" must not act as a match-anything wildcard
        assert_eq!(count_posts(&pool, None, Some("50% off")).await.unwrap(), 1);
        assert_eq!(count_posts(&pool, None, Some("50%x")).await.unwrap(), 0);
    }

    #[sqlx::test]
    async fn non_owner_update_yields_not_found(pool: PgPool) {
        let author = seed_user(&pool, "author").await;
        let other = seed_user(&pool, "other").await;
        let post_id = seed_post(&pool, author, "mine").await;

        let payload = UpdatePost {
            title: Some("taken over".to_string()),
            content: None,
            image: None,
        };
        let err = apply_post_update(&pool, post_id, other, &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let title: String = sqlx::query_scalar("SELECT title FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(title, "mine");
    }

    #[sqlx::test]
    async fn partial_update_preserves_unspecified_fields(pool: PgPool) {
        let author = seed_user(&pool, "author").await;
        let post_id = seed_post(&pool, author, "before").await;
        sqlx::query("UPDATE posts SET image = 'https://b.s3.amazonaws.com/k.png' WHERE id = $1")
            .bind(post_id)
            .execute(&pool)
            .await
            .unwrap();

        let payload = UpdatePost {
            title: Some("after".to_string()),
            content: None,
            image: None,
        };
        apply_post_update(&pool, post_id, author, &payload)
            .await
            .unwrap();

        let row = fetch_post(&pool, post_id, None).await.unwrap().unwrap();
        assert_eq!(row.title, "after");
        assert_eq!(row.content, "body");
        assert_eq!(row.image.as_deref(), Some("https://b.s3.amazonaws.com/k.png"));

        // explicit null clears the image without touching anything else
        let payload = UpdatePost {
            title: None,
            content: None,
            image: Some(None),
        };
        apply_post_update(&pool, post_id, author, &payload)
            .await
            .unwrap();

        let row = fetch_post(&pool, post_id, None).await.unwrap().unwrap();
        assert_eq!(row.image, None);
        assert_eq!(row.title, "after");
    }

    #[sqlx::test]
    async fn soft_deleted_posts_disappear_from_reads(pool: PgPool) {
        let author = seed_user(&pool, "author").await;
        let post_id = seed_post(&pool, author, "ghost").await;

        assert!(fetch_post(&pool, post_id, None).await.unwrap().is_some());
        assert_eq!(count_posts(&pool, None, None).await.unwrap(), 1);

        sqlx::query("UPDATE posts SET deleted_at = NOW() WHERE id = $1")
            .bind(post_id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(fetch_post(&pool, post_id, None).await.unwrap().is_none());
        assert_eq!(count_posts(&pool, None, None).await.unwrap(), 0);
        assert!(fetch_posts_page(&pool, None, None, None, 10, 0)
            .await
            .unwrap()
            .is_empty());
    }
}
