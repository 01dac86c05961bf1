use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

/// Cookie set by the external auth provider on sign-in.
pub const SESSION_COOKIE: &str = "session_token";

/// Authenticated caller, resolved from the session cookie against the
/// provider-maintained sessions table. Expired sessions count as absent.
///
/// Use `Option<AuthUser>` on read routes where auth is optional.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    PgPool: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or(AppError::Unauthorized)?;

        let pool = PgPool::from_ref(state);

        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM sessions WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(&token)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Session lookup failed: {:?}", e);
            AppError::InternalServerError
        })?
        .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser { id: user_id })
    }
}
