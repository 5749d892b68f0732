//! Authentication extractors
//!
//! Extract the verified caller identity from the Authorization header.
//! Verification short-circuits before any relationship logic runs.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::CookieJar;

use super::token::verify_access_token;
use crate::AppState;
use crate::error::AppError;

fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
        .or_else(|| {
            let jar = CookieJar::from_headers(headers);
            jar.get("access_token")
                .map(|cookie| cookie.value().to_owned())
        })
}

/// Extractor for the current authenticated caller
///
/// Holds the verified user id.
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(user_id): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    /// Extract and verify the caller identity
    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = extract_token_from_headers(&parts.headers).ok_or(AppError::Unauthorized)?;
        let access = verify_access_token(&token, &state.config.auth.token_secret)?;

        Ok(CurrentUser(access.user_id))
    }
}

/// Optional caller extractor
///
/// Returns None if not authenticated, instead of error. Used by
/// endpoints with anonymous read access (feed, single post, author
/// listings). An invalid token reads as anonymous here, not as an
/// error.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let user_id = extract_token_from_headers(&parts.headers)
            .and_then(|token| verify_access_token(&token, &state.config.auth.token_secret).ok())
            .map(|access| access.user_id);

        Ok(MaybeUser(user_id))
    }
}
