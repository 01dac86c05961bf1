use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod handler;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Avatar,
    Post,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlRequest {
    #[validate(length(min = 1, message = "Filename cannot be empty"))]
    pub filename: String,
    #[validate(length(min = 1, message = "Content type cannot be empty"))]
    pub content_type: String,
    #[serde(rename = "type")]
    pub kind: UploadKind,
    // Required when kind is Post
    pub post_id: Option<Uuid>,
}

/// Client-driven upload: PUT the file to `presigned_url`, then persist
/// `public_url` as the stable reference.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlResponse {
    pub presigned_url: String,
    pub key: String,
    pub public_url: String,
}

/// Server-side upload: `url` is a presigned read URL for immediate display.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectUploadResponse {
    pub url: String,
    pub key: String,
    pub public_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presigned_url_request_uses_wire_field_names() {
        let request: PresignedUrlRequest = serde_json::from_str(
            r#"{"filename": "a.png", "contentType": "image/png", "type": "avatar"}"#,
        )
        .unwrap();
        assert_eq!(request.kind, UploadKind::Avatar);
        assert!(request.post_id.is_none());
    }

    #[test]
    fn unknown_upload_type_is_rejected() {
        let result: Result<PresignedUrlRequest, _> = serde_json::from_str(
            r#"{"filename": "a.png", "contentType": "image/png", "type": "banner"}"#,
        );
        assert!(result.is_err());
    }
}
