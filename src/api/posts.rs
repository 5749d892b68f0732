//! Post endpoints
//!
//! Post CRUD, like toggling, the author listing, and the combined feed.
//! The feed and single-post reads accept anonymous callers; anonymous
//! access is restricted to public posts.

use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::dto::*;
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::data::{EntityId, Post, User, Visibility};
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::{FeedService, SortDirection, SortField};

/// Default page size for post listings
const DEFAULT_LIMIT: i64 = 10;
/// Maximum post content length in characters
const MAX_CONTENT_CHARS: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct CreatePostBody {
    pub content: Option<String>,
    pub visibility: Option<String>,
    pub tags: Option<Vec<String>>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostBody {
    pub content: Option<String>,
    pub visibility: Option<String>,
    pub tags: Option<Vec<String>>,
    pub location: Option<String>,
}

// Note: page/limit are inlined rather than flattened from PageParams;
// serde_urlencoded cannot deserialize numbers through #[serde(flatten)].
#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl FeedParams {
    fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Extract `#hashtag` tokens from post content.
///
/// A tag runs over alphanumerics and underscores; tags are lowercased
/// and deduplicated preserving first occurrence.
fn extract_hashtags(content: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut seen = HashSet::new();
    let mut buffer = String::new();
    let mut in_tag = false;

    // The trailing space is a sentinel that flushes a tag ending at EOF.
    for ch in content.chars().chain(std::iter::once(' ')) {
        if in_tag {
            if ch.is_alphanumeric() || ch == '_' {
                buffer.push(ch);
                continue;
            }
            if !buffer.is_empty() {
                let lowered = buffer.to_lowercase();
                if seen.insert(lowered.clone()) {
                    tags.push(lowered);
                }
            }
            buffer.clear();
            in_tag = ch == '#';
        } else if ch == '#' {
            in_tag = true;
        }
    }

    tags
}

/// Merge content hashtags with explicitly provided tags.
fn merge_tags(content: &str, explicit: Option<&[String]>) -> Vec<String> {
    let mut tags = extract_hashtags(content);
    let mut seen: HashSet<String> = tags.iter().cloned().collect();

    if let Some(explicit) = explicit {
        for tag in explicit {
            let trimmed = tag.trim().to_lowercase();
            if !trimmed.is_empty() && seen.insert(trimmed.clone()) {
                tags.push(trimmed);
            }
        }
    }

    tags
}

fn validate_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("content is required".to_string()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation(format!(
            "content must be at most {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(())
}

fn validate_visibility(value: &str) -> Result<Visibility, AppError> {
    Visibility::parse(value).ok_or_else(|| {
        AppError::Validation("visibility must be one of: public, friends, private".to_string())
    })
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<CreatePostBody>,
) -> Result<(StatusCode, Json<ApiResponse<PostData>>), AppError> {
    let author = state
        .db
        .get_user(&user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    let content = body.content.unwrap_or_default();
    validate_content(&content)?;

    let visibility = match body.visibility.as_deref() {
        Some(value) => validate_visibility(value)?,
        None => Visibility::Public,
    };

    let tags = merge_tags(&content, body.tags.as_deref());
    let now = Utc::now();

    let post = Post {
        id: EntityId::new().0,
        author_id: user_id,
        content,
        visibility: visibility.as_str().to_string(),
        tags: serde_json::to_string(&tags).map_err(|e| AppError::Internal(e.into()))?,
        location: body.location.filter(|l| !l.trim().is_empty()),
        likes_count: 0,
        comments_count: 0,
        shares_count: 0,
        created_at: now,
        updated_at: now,
    };

    state.db.insert_post(&post).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(PostData {
            post: PostResponse::from_post(&post, Some(&author), false),
        })),
    ))
}

/// GET /api/posts/feed
///
/// The combined feed: public posts, the viewer's own posts, and
/// friends-only posts from the viewer's friends, one OR predicate for
/// both page and total. Anonymous callers get public posts only.
pub async fn combined_feed(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Query(params): Query<FeedParams>,
) -> Result<Json<ApiResponse<FeedData>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/posts/feed"])
        .start_timer();

    let (page, limit, skip) = params.page_params().normalized(DEFAULT_LIMIT);
    let sort = SortField::parse_or_default(params.sort_by.as_deref());
    let direction = SortDirection::parse_or_default(params.order.as_deref());

    let feed = FeedService::new(state.db.clone());
    let (posts, total) = feed
        .combined_feed(viewer.as_deref(), sort, direction, skip, limit)
        .await?;

    let responses = post_responses(&state, &posts, viewer.as_deref()).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/posts/feed", "200"])
        .inc();

    Ok(Json(ApiResponse::new(FeedData {
        posts: responses,
        pagination: Pagination::new(page, limit, total),
    })))
}

/// GET /api/posts/user/:user_id
///
/// An author's posts as the viewer is allowed to see them.
pub async fn user_posts(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(author_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<FeedData>>, AppError> {
    if state.db.get_user(&author_id).await?.is_none() {
        return Err(AppError::UserNotFound);
    }

    let (page, limit, skip) = params.normalized(DEFAULT_LIMIT);
    let feed = FeedService::new(state.db.clone());
    let (posts, total) = feed
        .author_posts(viewer.as_deref(), &author_id, skip, limit)
        .await?;

    let responses = post_responses(&state, &posts, viewer.as_deref()).await?;

    Ok(Json(ApiResponse::new(FeedData {
        posts: responses,
        pagination: Pagination::new(page, limit, total),
    })))
}

/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(post_id): Path<String>,
) -> Result<Json<ApiResponse<PostData>>, AppError> {
    let feed = FeedService::new(state.db.clone());
    let post = feed.get_post_checked(viewer.as_deref(), &post_id).await?;

    let mut responses = post_responses(&state, std::slice::from_ref(&post), viewer.as_deref()).await?;

    Ok(Json(ApiResponse::new(PostData {
        post: responses.remove(0),
    })))
}

/// PUT /api/posts/:id
///
/// Owner-only update of allow-listed fields.
pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(post_id): Path<String>,
    Json(body): Json<UpdatePostBody>,
) -> Result<Json<ApiResponse<PostData>>, AppError> {
    let post = state
        .db
        .get_post(&post_id)
        .await?
        .ok_or(AppError::PostNotFound)?;

    if post.author_id != user_id {
        return Err(AppError::UnauthorizedAction);
    }

    if let Some(ref content) = body.content {
        validate_content(content)?;
    }
    if let Some(ref visibility) = body.visibility {
        validate_visibility(visibility)?;
    }

    let tags_json = match body.tags {
        Some(ref tags) => {
            let normalized: Vec<String> = {
                let mut seen = HashSet::new();
                tags.iter()
                    .map(|tag| tag.trim().to_lowercase())
                    .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
                    .collect()
            };
            Some(serde_json::to_string(&normalized).map_err(|e| AppError::Internal(e.into()))?)
        }
        None => None,
    };

    if body.content.is_none()
        && body.visibility.is_none()
        && tags_json.is_none()
        && body.location.is_none()
    {
        return Err(AppError::InvalidRequest(
            "No valid fields to update".to_string(),
        ));
    }

    let updated = state
        .db
        .update_post_fields(
            &post_id,
            body.content.as_deref(),
            body.visibility.as_deref(),
            tags_json.as_deref(),
            body.location.as_deref(),
            Utc::now(),
        )
        .await?;
    if !updated {
        return Err(AppError::PostNotFound);
    }

    let post = state
        .db
        .get_post(&post_id)
        .await?
        .ok_or(AppError::PostNotFound)?;
    let author = state.db.get_user(&post.author_id).await?;
    let liked = !state
        .db
        .get_liked_post_ids(&user_id, std::slice::from_ref(&post.id))
        .await?
        .is_empty();

    Ok(Json(ApiResponse::new(PostData {
        post: PostResponse::from_post(&post, author.as_ref(), liked),
    })))
}

/// DELETE /api/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(post_id): Path<String>,
) -> Result<Json<ApiResponse<MessageData>>, AppError> {
    let post = state
        .db
        .get_post(&post_id)
        .await?
        .ok_or(AppError::PostNotFound)?;

    if post.author_id != user_id {
        return Err(AppError::UnauthorizedAction);
    }

    if !state.db.delete_post(&post_id).await? {
        return Err(AppError::PostNotFound);
    }

    Ok(Json(ApiResponse::new(MessageData::new("Post deleted"))))
}

/// POST /api/posts/:id/like
///
/// Toggle: likes the post if not yet liked, removes the like otherwise.
pub async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(post_id): Path<String>,
) -> Result<Json<ApiResponse<LikeData>>, AppError> {
    let liked = state
        .db
        .toggle_post_like(&post_id, &user_id)
        .await?
        .ok_or(AppError::PostNotFound)?;

    let post = state
        .db
        .get_post(&post_id)
        .await?
        .ok_or(AppError::PostNotFound)?;

    Ok(Json(ApiResponse::new(LikeData {
        liked,
        likes_count: post.likes_count,
    })))
}

/// Enrich posts with author summaries and the viewer's like flags,
/// batch-resolved to avoid per-row queries.
async fn post_responses(
    state: &AppState,
    posts: &[Post],
    viewer: Option<&str>,
) -> Result<Vec<PostResponse>, AppError> {
    let author_ids: Vec<String> = {
        let mut seen = HashSet::new();
        posts
            .iter()
            .map(|post| post.author_id.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect()
    };
    let authors: HashMap<String, User> = state
        .db
        .get_users_by_ids(&author_ids)
        .await?
        .into_iter()
        .map(|user| (user.id.clone(), user))
        .collect();

    let liked = match viewer {
        Some(viewer) => {
            let post_ids: Vec<String> = posts.iter().map(|post| post.id.clone()).collect();
            state.db.get_liked_post_ids(viewer, &post_ids).await?
        }
        None => HashSet::new(),
    };

    Ok(posts
        .iter()
        .map(|post| {
            PostResponse::from_post(
                post,
                authors.get(&post.author_id),
                liked.contains(&post.id),
            )
        })
        .collect())
}
