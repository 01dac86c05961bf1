use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::patch;

pub mod handler;

/// Profile update; `bio` and `image` distinguish "omitted" from "set to null".
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    #[serde(default, deserialize_with = "patch::nullable")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch::nullable")]
    pub image: Option<Option<String>>,
}

/// User profile with content and follow counts. `email` is serialized only
/// for the profile owner.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_user_accepts_null_bio_and_image() {
        let payload: UpdateUser =
            serde_json::from_str(r#"{"bio": null, "image": null}"#).unwrap();
        assert_eq!(payload.bio, Some(None));
        assert_eq!(payload.image, Some(None));
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn update_user_enforces_bio_length() {
        let bio = "x".repeat(501);
        let payload: UpdateUser =
            serde_json::from_str(&format!(r#"{{"bio": "{}"}}"#, bio)).unwrap();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn email_is_omitted_when_absent() {
        let profile = UserProfileResponse {
            id: Uuid::new_v4(),
            name: "a".to_string(),
            email: None,
            image: None,
            bio: None,
            posts_count: 0,
            followers_count: 0,
            following_count: 0,
            created_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("email").is_none());
    }
}
