//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical unordered pair of user ids.
///
/// Friendships are stored as one directed row but mean an undirected
/// edge; every pair lookup goes through this key so `(A,B)` and `(B,A)`
/// always resolve to the same edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub lo: String,
    pub hi: String,
}

impl PairKey {
    /// Build the canonical key: lexicographically smaller id first.
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self {
                lo: a.to_string(),
                hi: b.to_string(),
            }
        } else {
            Self {
                lo: b.to_string(),
                hi: a.to_string(),
            }
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// A registered user
///
/// Credential material lives in the external auth service; this record
/// only carries the profile fields the backend serves.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub email: String,
    /// Avatar URL
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Relationship records
// =============================================================================

/// A directed friend invitation
///
/// Created pending, marked accepted on acceptance or collision
/// resolution, deleted on cancellation. Never returns to pending.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FriendRequest {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    /// "pending" or "accepted"
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Friend request status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Accepted,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

/// An accepted, undirected friendship edge
///
/// `user_id` is the side whose action created the edge; semantics never
/// depend on direction. The database canonicalizes the pair into
/// generated `pair_lo`/`pair_hi` columns with a unique index.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Friendship {
    pub id: String,
    pub user_id: String,
    pub friend_id: String,
    /// Always "accepted"
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Friendship {
    /// The other endpoint of the edge, seen from `user`.
    pub fn other(&self, user: &str) -> &str {
        if self.user_id == user {
            &self.friend_id
        } else {
            &self.user_id
        }
    }
}

// =============================================================================
// Post
// =============================================================================

/// A post
///
/// `tags` is stored as a JSON array of lowercased hashtag strings.
/// `likes_count` is denormalized next to the `post_likes` membership
/// table and maintained in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    /// Visibility: public, friends, private
    pub visibility: String,
    /// JSON array of tags
    pub tags: String,
    pub location: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub shares_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Decode the JSON tags column, tolerating legacy rows.
    pub fn tag_list(&self) -> Vec<String> {
        serde_json::from_str(&self.tags).unwrap_or_default()
    }
}

/// Post visibility tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Friends,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Friends => "friends",
            Self::Private => "private",
        }
    }

    /// Parse a visibility string; unknown values are rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Self::Public),
            "friends" => Some(Self::Friends),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// A like on a post
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostLike {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}
