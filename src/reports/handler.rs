use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    error::AppError,
    pagination::{self, Pagination},
    reports::{
        CreateReport, ReportListQuery, ReportListResponse, ReportResponse, ReportStatus,
        ReportTarget, ReportType, ReportedComment, ReportedPost, Reporter, UpdateReportStatus,
    },
};

/// Helper struct for fetching reports with reporter and target summaries
#[derive(FromRow)]
struct ReportFromDb {
    id: Uuid,
    reason: String,
    #[sqlx(rename = "type")]
    kind: ReportType,
    status: ReportStatus,
    notes: Option<String>,
    post_id: Option<Uuid>,
    comment_id: Option<Uuid>,
    reporter_id: Uuid,
    reviewed_by: Option<Uuid>,
    reviewed_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    post_title: Option<String>,
    comment_content: Option<String>,
    reporter_name: String,
}

impl From<ReportFromDb> for ReportResponse {
    fn from(r: ReportFromDb) -> Self {
        ReportResponse {
            id: r.id,
            reason: r.reason,
            kind: r.kind,
            status: r.status,
            notes: r.notes,
            post: r
                .post_id
                .zip(r.post_title)
                .map(|(id, title)| ReportedPost { id, title }),
            comment: r
                .comment_id
                .zip(r.comment_content)
                .map(|(id, content)| ReportedComment { id, content }),
            reporter: Reporter {
                id: r.reporter_id,
                name: r.reporter_name,
            },
            reviewed_by: r.reviewed_by,
            reviewed_at: r.reviewed_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const REPORT_SELECT: &str = r#"
    SELECT
        r.id, r.reason, r.type, r.status, r.notes, r.post_id, r.comment_id,
        r.reporter_id, r.reviewed_by, r.reviewed_at, r.created_at, r.updated_at,
        p.title AS post_title, c.content AS comment_content,
        u.name AS reporter_name
    FROM reports r
    JOIN users u ON r.reporter_id = u.id
    LEFT JOIN posts p ON r.post_id = p.id
    LEFT JOIN comments c ON r.comment_id = c.id
"#;

/// Validates the target and inserts the report row.
///
/// Both ids are persisted as submitted; `type` names which one is the
/// subject of the report, the other is kept as context.
async fn insert_report(
    pool: &PgPool,
    reporter_id: Uuid,
    payload: &CreateReport,
) -> Result<Uuid, AppError> {
    let target = payload.target().ok_or(AppError::BadRequest(
        "postId is required for POST type, commentId is required for COMMENT type".to_string(),
    ))?;

    // The reported content must exist and not be soft-deleted
    match target {
        ReportTarget::Post(id) => {
            sqlx::query("SELECT id FROM posts WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(|_| AppError::InternalServerError)?
                .ok_or(AppError::NotFound("Content not found".to_string()))?;
        }
        ReportTarget::Comment(id) => {
            sqlx::query("SELECT id FROM comments WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(|_| AppError::InternalServerError)?
                .ok_or(AppError::NotFound("Content not found".to_string()))?;
        }
    }

    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO reports (reason, type, post_id, comment_id, reporter_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(&payload.reason)
    .bind(payload.kind)
    .bind(payload.post_id)
    .bind(payload.comment_id)
    .bind(reporter_id)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create report: {:?}", e);
        AppError::InternalServerError
    })
}

/// Report a post or a comment
/// POST /api/reports
pub async fn create_report(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreateReport>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let report_id = insert_report(&pool, user.id, &payload).await?;

    let response = get_report_response(&pool, report_id).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// List reports, newest first, optionally filtered by status
/// GET /api/reports
pub async fn get_reports(
    State(pool): State<PgPool>,
    _user: AuthUser,
    Query(query): Query<ReportListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = pagination::clamp(query.page, query.limit);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reports r WHERE ($1::report_status IS NULL OR r.status = $1)",
    )
    .bind(query.status)
    .fetch_one(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    let query_str = format!(
        r#"
        {}
        WHERE ($1::report_status IS NULL OR r.status = $1)
        ORDER BY r.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        REPORT_SELECT
    );

    let rows = sqlx::query_as::<_, ReportFromDb>(&query_str)
        .bind(query.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch reports: {:?}", e);
            AppError::InternalServerError
        })?;

    Ok(Json(ReportListResponse {
        reports: rows.into_iter().map(ReportResponse::from).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}

/// Review a report: set its status and stamp the reviewer
/// PUT /api/reports/:id
pub async fn update_report_status(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReportStatus>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let result = sqlx::query(
        r#"
        UPDATE reports
        SET status = $1,
            notes = COALESCE($2, notes),
            reviewed_by = $3,
            reviewed_at = NOW(),
            updated_at = NOW()
        WHERE id = $4
        "#,
    )
    .bind(payload.status)
    .bind(&payload.notes)
    .bind(user.id)
    .bind(id)
    .execute(&pool)
    .await
    .map_err(|_| AppError::InternalServerError)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Report not found".to_string()));
    }

    let response = get_report_response(&pool, id).await?;

    Ok(Json(response))
}

async fn get_report_response(pool: &PgPool, report_id: Uuid) -> Result<ReportResponse, AppError> {
    let query_str = format!("{} WHERE r.id = $1", REPORT_SELECT);

    let row = sqlx::query_as::<_, ReportFromDb>(&query_str)
        .bind(report_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch report: {:?}", e);
            AppError::InternalServerError
        })?
        .ok_or(AppError::NotFound("Report not found".to_string()))?;

    Ok(ReportResponse::from(row))
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

    async fn seed_post_with_comment(pool: &PgPool, author_id: Uuid) -> (Uuid, Uuid) {
        let post_id: Uuid = sqlx::query_scalar(
            "INSERT INTO posts (author_id, title, content) VALUES ($1, 'title', 'body') RETURNING id",
        )
        .bind(author_id)
        .fetch_one(pool)
        .await
        .unwrap();
        let comment_id: Uuid = sqlx::query_scalar(
            "INSERT INTO comments (post_id, author_id, content) VALUES ($1, $2, 'hi') RETURNING id",
        )
        .bind(post_id)
        .bind(author_id)
        .fetch_one(pool)
        .await
        .unwrap();
        (post_id, comment_id)
    }

    #[sqlx::test]
    async fn report_keeps_both_target_ids(pool: PgPool) {
        let reporter = seed_user(&pool, "reporter").await;
        let (post_id, comment_id) = seed_post_with_comment(&pool, reporter).await;

        let payload = CreateReport {
            reason: "spam".to_string(),
            kind: ReportType::Post,
            post_id: Some(post_id),
            comment_id: Some(comment_id),
        };
        let report_id = insert_report(&pool, reporter, &payload).await.unwrap();

        let (stored_post, stored_comment): (Option<Uuid>, Option<Uuid>) =
            sqlx::query_as("SELECT post_id, comment_id FROM reports WHERE id = $1")
                .bind(report_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stored_post, Some(post_id));
        assert_eq!(stored_comment, Some(comment_id));
    }

    #[sqlx::test]
    async fn report_on_deleted_content_is_rejected(pool: PgPool) {
        let reporter = seed_user(&pool, "reporter").await;
        let (post_id, _) = seed_post_with_comment(&pool, reporter).await;

        sqlx::query("UPDATE posts SET deleted_at = NOW() WHERE id = $1")
            .bind(post_id)
            .execute(&pool)
            .await
            .unwrap();

        let payload = CreateReport {
            reason: "spam".to_string(),
            kind: ReportType::Post,
            post_id: Some(post_id),
            comment_id: None,
        };
        let err = insert_report(&pool, reporter, &payload).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
