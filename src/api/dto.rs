//! API response DTOs
//!
//! Every success payload is wrapped in `{success: true, data: ...}`;
//! errors are produced by `AppError`'s `IntoResponse` impl.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{Post, User};

/// Standard success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Pagination block carried by every paginated payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub limit: i64,
}

impl Pagination {
    /// `total_pages = ceil(total / limit)`, floored at 1 so an empty
    /// result still renders as page 1 of 1.
    pub fn new(current_page: i64, limit: i64, total_items: i64) -> Self {
        let total_pages = if total_items > 0 {
            (total_items + limit - 1) / limit
        } else {
            1
        };

        Self {
            current_page,
            total_pages,
            total_items,
            limit,
        }
    }
}

/// Common page/limit query parameters
///
/// Page is clamped to >= 1, limit to 1..=50.
#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub const MAX_LIMIT: i64 = 50;

    /// Resolve to `(page, limit, skip)` with `skip = (page - 1) * limit`.
    pub fn normalized(&self, default_limit: i64) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(default_limit)
            .clamp(1, Self::MAX_LIMIT);
        (page, limit, (page - 1) * limit)
    }
}

/// Compact user profile embedded in friend and feed payloads
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub user_id: String,
    pub name: String,
    pub avatar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutual_friends_count: Option<i64>,
}

impl UserSummary {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user.full_name.clone(),
            avatar: user.avatar.clone().unwrap_or_default(),
            bio: user.bio.clone(),
            mutual_friends_count: None,
        }
    }

    pub fn with_mutual(user: &User, mutual: usize) -> Self {
        let mut summary = Self::from_user(user);
        summary.mutual_friends_count = Some(mutual as i64);
        summary
    }
}

/// Full user profile for the users endpoints
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone().unwrap_or_default(),
            bio: user.bio.clone().unwrap_or_default(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Simple message payload for delete-style operations
#[derive(Debug, Serialize)]
pub struct MessageData {
    pub message: String,
}

impl MessageData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =============================================================================
// Friend payloads
// =============================================================================

/// A created (pending) friend request
#[derive(Debug, Serialize)]
pub struct FriendRequestData {
    pub request_id: String,
    pub recipient: Option<UserSummary>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// An established friendship
#[derive(Debug, Serialize)]
pub struct FriendshipData {
    pub friendship_id: String,
    pub friend: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
}

/// Send-request response: normally a pending request, a friendship in
/// the collision case.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SendRequestData {
    Request(FriendRequestData),
    Friendship(FriendshipData),
}

/// Relationship status of a pair, seen from the caller
#[derive(Debug, Serialize)]
pub struct RelationStatusData {
    pub status: &'static str,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendship_id: Option<String>,
}

/// One received friend request in a listing
#[derive(Debug, Serialize)]
pub struct ReceivedRequestItem {
    pub request_id: String,
    pub sender: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
}

/// One sent friend request in a listing
#[derive(Debug, Serialize)]
pub struct SentRequestItem {
    pub request_id: String,
    pub recipient: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReceivedRequestsData {
    pub requests: Vec<ReceivedRequestItem>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct SentRequestsData {
    pub requests: Vec<SentRequestItem>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsData {
    pub suggestions: Vec<UserSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct UserListData {
    pub users: Vec<UserProfile>,
    pub pagination: Pagination,
}

// =============================================================================
// Post payloads
// =============================================================================

/// A post as returned by the API
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub post_id: String,
    pub author: Option<UserSummary>,
    pub content: String,
    pub visibility: String,
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub shares_count: i64,
    pub liked_by_me: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostResponse {
    pub fn from_post(post: &Post, author: Option<&User>, liked_by_me: bool) -> Self {
        Self {
            post_id: post.id.clone(),
            author: author.map(UserSummary::from_user),
            content: post.content.clone(),
            visibility: post.visibility.clone(),
            tags: post.tag_list(),
            location: post.location.clone(),
            likes_count: post.likes_count,
            comments_count: post.comments_count,
            shares_count: post.shares_count,
            liked_by_me,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostData {
    pub post: PostResponse,
}

#[derive(Debug, Serialize)]
pub struct FeedData {
    pub posts: Vec<PostResponse>,
    pub pagination: Pagination,
}

/// Like toggle result
#[derive(Debug, Serialize)]
pub struct LikeData {
    pub liked: bool,
    pub likes_count: i64,
}
