use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{presigning::PresigningConfig, primitives::ByteStream, Client};
use uuid::Uuid;

use crate::config::settings::Settings;

/// Expiry for presigned read URLs handed out on display paths (7 days).
pub const READ_URL_TTL: Duration = Duration::from_secs(7 * 24 * 3600);
/// Expiry for presigned upload URLs (1 hour).
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(3600);

/// Object-store client for user media; stored references are plain
/// virtual-hosted S3 URLs, signed on the way out.
#[derive(Clone)]
pub struct Storage {
    client: Arc<Client>,
    bucket: String,
    region: String,
}

impl Storage {
    pub async fn connect(settings: &Settings) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.aws_region.clone()))
            .load()
            .await;

        Self {
            client: Arc::new(Client::new(&config)),
            bucket: settings.s3_bucket.clone(),
            region: settings.aws_region.clone(),
        }
    }

    /// Stable (unsigned) URL under which an object is persisted.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, self.region, key
        )
    }

    /// Uploads a file and returns its public URL.
    pub async fn upload(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await?;

        Ok(self.public_url(key))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;

        Ok(())
    }

    pub async fn presigned_read_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(expires_in)?)
            .await?;

        Ok(request.uri().to_string())
    }

    pub async fn presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(PresigningConfig::expires_in(expires_in)?)
            .await?;

        Ok(request.uri().to_string())
    }

    /// Rewrites a stored reference into a time-boxed read URL. Already-signed
    /// URLs pass through untouched; if signing fails the original reference
    /// is returned so reads degrade rather than fail.
    pub async fn ensure_accessible_url(&self, url: &str) -> String {
        if is_signed(url) {
            return url.to_string();
        }

        let Some(key) = extract_key(url) else {
            return url.to_string();
        };

        match self.presigned_read_url(&key, READ_URL_TTL).await {
            Ok(signed) => signed,
            Err(e) => {
                tracing::error!("Failed to presign media URL {}: {:?}", url, e);
                url.to_string()
            }
        }
    }

    /// `ensure_accessible_url` over an optional stored reference.
    pub async fn resolve_url(&self, url: Option<String>) -> Option<String> {
        match url {
            Some(u) => Some(self.ensure_accessible_url(&u).await),
            None => None,
        }
    }
}

/// Whether a URL already carries presigned-request query parameters.
pub fn is_signed(url: &str) -> bool {
    url.contains("X-Amz-Signature") || url.contains("X-Amz-Algorithm")
}

/// Derives the object key from a virtual-hosted S3 URL, dropping any query
/// string or fragment.
pub fn extract_key(url: &str) -> Option<String> {
    let after_scheme = url.split_once("://")?.1;
    let (_, path) = after_scheme.split_once('/')?;
    let key = path.split(['?', '#']).next().unwrap_or("");

    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

pub fn avatar_key(user_id: Uuid, filename: &str) -> String {
    format!(
        "users/{}/avatar-{}.{}",
        user_id,
        chrono::Utc::now().timestamp_millis(),
        extension(filename)
    )
}

pub fn post_image_key(user_id: Uuid, post_id: Uuid, filename: &str) -> String {
    format!(
        "posts/{}/{}-{}.{}",
        user_id,
        post_id,
        chrono::Utc::now().timestamp_millis(),
        extension(filename)
    )
}

fn extension(filename: &str) -> &str {
    filename.rsplit('.').next().unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_signed_urls() {
        assert!(is_signed(
            "https://b.s3.us-east-1.amazonaws.com/k?X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Signature=abc"
        ));
        assert!(!is_signed("https://b.s3.us-east-1.amazonaws.com/users/1/a.png"));
    }

    #[test]
    fn extracts_key_from_virtual_hosted_url() {
        assert_eq!(
            extract_key("https://bucket.s3.us-east-1.amazonaws.com/users/42/avatar-1.png"),
            Some("users/42/avatar-1.png".to_string())
        );
    }

    #[test]
    fn extracts_key_ignoring_query_string() {
        assert_eq!(
            extract_key("https://bucket.s3.amazonaws.com/posts/a/b.jpg?X-Amz-Expires=604800"),
            Some("posts/a/b.jpg".to_string())
        );
    }

    #[test]
    fn rejects_urls_without_a_key() {
        assert_eq!(extract_key("not a url"), None);
        assert_eq!(extract_key("https://bucket.s3.amazonaws.com/"), None);
        assert_eq!(extract_key("https://bucket.s3.amazonaws.com"), None);
    }

    #[test]
    fn object_keys_carry_owner_prefix_and_extension() {
        let user = Uuid::new_v4();
        let post = Uuid::new_v4();

        let key = avatar_key(user, "me.profile.JPG");
        assert!(key.starts_with(&format!("users/{}/avatar-", user)));
        assert!(key.ends_with(".JPG"));

        let key = post_image_key(user, post, "shot.png");
        assert!(key.starts_with(&format!("posts/{}/{}-", user, post)));
        assert!(key.ends_with(".png"));
    }
}
