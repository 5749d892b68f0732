//! User endpoints
//!
//! Profile reads, allow-listed profile updates, and user search.
//! Account creation and credentials live in the external auth service.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::dto::*;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

const DEFAULT_LIMIT: i64 = 10;

// Note: page/limit are inlined rather than flattened from PageParams;
// serde_urlencoded cannot deserialize numbers through #[serde(flatten)].
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileBody {
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

/// GET /api/users/me
pub async fn get_me(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let user = state
        .db
        .get_user(&user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    Ok(Json(ApiResponse::new(UserProfile::from_user(&user))))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let user = state
        .db
        .get_user(&user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    Ok(Json(ApiResponse::new(UserProfile::from_user(&user))))
}

/// PUT /api/users/me
///
/// Update allow-listed profile fields.
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<UpdateProfileBody>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    if body.full_name.is_none() && body.avatar.is_none() && body.bio.is_none() {
        return Err(AppError::InvalidRequest(
            "No valid fields to update".to_string(),
        ));
    }

    if let Some(ref full_name) = body.full_name {
        if full_name.trim().is_empty() {
            return Err(AppError::Validation(
                "full_name must not be empty".to_string(),
            ));
        }
    }

    let updated = state
        .db
        .update_user_profile(
            &user_id,
            body.full_name.as_deref(),
            body.avatar.as_deref(),
            body.bio.as_deref(),
            Utc::now(),
        )
        .await?;
    if !updated {
        return Err(AppError::UserNotFound);
    }

    let user = state
        .db
        .get_user(&user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    Ok(Json(ApiResponse::new(UserProfile::from_user(&user))))
}

/// GET /api/users/search
///
/// Case-insensitive substring search over name and email.
pub async fn search_users(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<UserListData>>, AppError> {
    let page_params = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let (page, limit, skip) = page_params.normalized(DEFAULT_LIMIT);
    let query = params.query.unwrap_or_default();

    let total = state.db.count_users_matching(&query).await?;
    let users = state.db.search_users(&query, skip, limit).await?;

    Ok(Json(ApiResponse::new(UserListData {
        users: users.iter().map(UserProfile::from_user).collect(),
        pagination: Pagination::new(page, limit, total),
    })))
}
