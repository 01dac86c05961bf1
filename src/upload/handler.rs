use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    error::AppError,
    storage::{self, Storage, READ_URL_TTL, UPLOAD_URL_TTL},
    upload::{DirectUploadResponse, PresignedUrlRequest, PresignedUrlResponse, UploadKind},
};

/// Hand out a presigned PUT URL for a client-driven upload
/// POST /api/upload/presigned-url
pub async fn get_presigned_url(
    State(storage): State<Storage>,
    user: AuthUser,
    Json(payload): Json<PresignedUrlRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let key = match payload.kind {
        UploadKind::Avatar => storage::avatar_key(user.id, &payload.filename),
        UploadKind::Post => {
            let post_id = payload.post_id.ok_or(AppError::BadRequest(
                "postId is required for post images".to_string(),
            ))?;
            storage::post_image_key(user.id, post_id, &payload.filename)
        }
    };

    let presigned_url = storage
        .presigned_upload_url(&key, &payload.content_type, UPLOAD_URL_TTL)
        .await
        .map_err(|e| {
            tracing::error!("Error generating presigned URL: {:?}", e);
            AppError::InternalServerError
        })?;

    let public_url = storage.public_url(&key);

    Ok(Json(PresignedUrlResponse {
        presigned_url,
        key,
        public_url,
    }))
}

/// Accept a multipart upload and push it to the object store
/// POST /api/upload/direct
pub async fn direct_upload(
    State(pool): State<PgPool>,
    State(storage): State<Storage>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut kind: Option<String> = None;
    let mut post_id: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::BadRequest("Invalid multipart form".to_string()))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::BadRequest("Invalid multipart form".to_string()))?;
                file = Some((filename, content_type, bytes.to_vec()));
            }
            Some("type") => {
                kind = field.text().await.ok();
            }
            Some("postId") => {
                post_id = field.text().await.ok().and_then(|s| s.parse().ok());
            }
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or(AppError::BadRequest("No file provided".to_string()))?;

    let key = match kind.as_deref() {
        Some("avatar") => {
            delete_previous_avatar(&pool, &storage, user.id).await;
            storage::avatar_key(user.id, &filename)
        }
        Some("post") => {
            let post_id = post_id.ok_or(AppError::BadRequest(
                "postId is required for post images".to_string(),
            ))?;
            storage::post_image_key(user.id, post_id, &filename)
        }
        _ => return Err(AppError::BadRequest("Invalid type".to_string())),
    };

    let public_url = storage
        .upload(&key, bytes, &content_type)
        .await
        .map_err(|e| {
            tracing::error!("Upload error: {:?}", e);
            AppError::InternalServerError
        })?;

    // Presigned read URL for immediate display; fall back to the public URL
    let url = match storage.presigned_read_url(&key, READ_URL_TTL).await {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Failed to presign uploaded object {}: {:?}", key, e);
            public_url.clone()
        }
    };

    Ok(Json(DirectUploadResponse {
        url,
        key,
        public_url,
    }))
}

/// Best-effort removal of the caller's current avatar object. The upload
/// proceeds even when this fails.
async fn delete_previous_avatar(pool: &PgPool, storage: &Storage, user_id: Uuid) {
    let current = sqlx::query_scalar::<_, Option<String>>("SELECT image FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await;

    let image = match current {
        Ok(row) => row.flatten(),
        Err(e) => {
            tracing::error!("Failed to look up current avatar: {:?}", e);
            return;
        }
    };

    if let Some(image) = image {
        if let Some(key) = storage::extract_key(&image) {
            if let Err(e) = storage.delete(&key).await {
                tracing::error!("Failed to delete previous avatar {}: {:?}", key, e);
            }
        }
    }
}
