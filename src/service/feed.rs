//! Feed assembly and visibility filtering
//!
//! The feed membership rule is one combined OR predicate (public posts,
//! the viewer's own posts, friends-only posts from the viewer's friends)
//! applied before sort and pagination, so counts and page contents are
//! always computed against the same clause set. Single-post retrieval
//! applies the same rule but answers with a distinguishable error
//! instead of silent omission.

use std::sync::Arc;

use crate::data::{Database, PairKey, Post, Visibility};
use crate::error::AppError;

/// Sort fields allowed for the feed; anything else falls back to
/// creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Likes,
    Comments,
    Shares,
}

impl SortField {
    /// Parse a `sort_by` query value against the allow-list.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            Some("likes") => Self::Likes,
            Some("comments") => Self::Comments,
            Some("shares") => Self::Shares,
            _ => Self::CreatedAt,
        }
    }

    /// Column this field sorts on. Only these fixed names ever reach
    /// the SQL layer.
    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Likes => "likes_count",
            Self::Comments => "comments_count",
            Self::Shares => "shares_count",
        }
    }
}

/// Sort direction, default descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Access decision for a single post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAccess {
    Allowed,
    /// Anonymous viewer on a non-public post
    AuthRequired,
    /// Authenticated viewer outside the post's audience
    Denied,
}

/// The inclusion rule for one post and viewer.
///
/// - public posts are always visible
/// - authors always see their own posts regardless of visibility
/// - friends-only posts require an accepted friendship
/// - private posts are visible to the author alone
pub fn check_post_access(
    viewer: Option<&str>,
    author_id: &str,
    visibility: Visibility,
    viewer_is_friend: bool,
) -> PostAccess {
    if visibility == Visibility::Public {
        return PostAccess::Allowed;
    }

    match viewer {
        None => PostAccess::AuthRequired,
        Some(viewer) if viewer == author_id => PostAccess::Allowed,
        Some(_) => match visibility {
            Visibility::Friends if viewer_is_friend => PostAccess::Allowed,
            _ => PostAccess::Denied,
        },
    }
}

/// Feed service
pub struct FeedService {
    db: Arc<Database>,
}

impl FeedService {
    /// Create new feed service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// One page of the combined feed for a viewer (or the public-only
    /// feed for anonymous access), plus the total matching the same
    /// membership predicate.
    pub async fn combined_feed(
        &self,
        viewer: Option<&str>,
        sort: SortField,
        direction: SortDirection,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Post>, i64), AppError> {
        let total = self.db.count_feed_posts(viewer).await?;
        let posts = self
            .db
            .get_feed_posts(viewer, sort.column(), direction.keyword(), skip, limit)
            .await?;
        Ok((posts, total))
    }

    /// Fetch a single post, enforcing the feed visibility rule.
    ///
    /// # Errors
    /// - `PostNotFound` if the id is unknown
    /// - `Unauthorized` for anonymous access to a non-public post
    /// - `Forbidden` for an authenticated viewer outside the audience
    pub async fn get_post_checked(
        &self,
        viewer: Option<&str>,
        post_id: &str,
    ) -> Result<Post, AppError> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or(AppError::PostNotFound)?;

        // Unknown visibility values read as the most restrictive tier.
        let visibility = Visibility::parse(&post.visibility).unwrap_or(Visibility::Private);

        let viewer_is_friend = match viewer {
            Some(viewer) if visibility == Visibility::Friends && viewer != post.author_id => self
                .db
                .get_friendship_by_pair(&PairKey::new(viewer, &post.author_id))
                .await?
                .is_some(),
            _ => false,
        };

        match check_post_access(viewer, &post.author_id, visibility, viewer_is_friend) {
            PostAccess::Allowed => Ok(post),
            PostAccess::AuthRequired => Err(AppError::Unauthorized),
            PostAccess::Denied => Err(AppError::Forbidden(match visibility {
                Visibility::Friends => "This post is only visible to friends".to_string(),
                _ => "This post is private".to_string(),
            })),
        }
    }

    /// One page of an author's posts as seen by the viewer: public for
    /// strangers and anonymous callers, public+friends for friends,
    /// everything for the author.
    pub async fn author_posts(
        &self,
        viewer: Option<&str>,
        author_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Post>, i64), AppError> {
        let visibilities: &[&'static str] = match viewer {
            Some(viewer) if viewer == author_id => &["public", "friends", "private"],
            Some(viewer) => {
                let pair = PairKey::new(viewer, author_id);
                if self.db.get_friendship_by_pair(&pair).await?.is_some() {
                    &["public", "friends"]
                } else {
                    &["public"]
                }
            }
            None => &["public"],
        };

        let total = self.db.count_author_posts(author_id, visibilities).await?;
        let posts = self
            .db
            .get_author_posts(author_id, visibilities, skip, limit)
            .await?;
        Ok((posts, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_field_falls_back_to_creation_time() {
        assert_eq!(SortField::parse_or_default(None), SortField::CreatedAt);
        assert_eq!(
            SortField::parse_or_default(Some("created_at")),
            SortField::CreatedAt
        );
        assert_eq!(SortField::parse_or_default(Some("likes")), SortField::Likes);
        assert_eq!(
            SortField::parse_or_default(Some("comments")),
            SortField::Comments
        );
        assert_eq!(
            SortField::parse_or_default(Some("shares")),
            SortField::Shares
        );
        // Arbitrary column names never reach the SQL layer.
        assert_eq!(
            SortField::parse_or_default(Some("id; DROP TABLE posts")),
            SortField::CreatedAt
        );
    }

    #[test]
    fn sort_direction_defaults_to_descending() {
        assert_eq!(SortDirection::parse_or_default(None), SortDirection::Desc);
        assert_eq!(
            SortDirection::parse_or_default(Some("asc")),
            SortDirection::Asc
        );
        assert_eq!(
            SortDirection::parse_or_default(Some("ASC")),
            SortDirection::Asc
        );
        assert_eq!(
            SortDirection::parse_or_default(Some("sideways")),
            SortDirection::Desc
        );
    }

    #[test]
    fn public_posts_are_visible_to_everyone() {
        assert_eq!(
            check_post_access(None, "author", Visibility::Public, false),
            PostAccess::Allowed
        );
        assert_eq!(
            check_post_access(Some("viewer"), "author", Visibility::Public, false),
            PostAccess::Allowed
        );
    }

    #[test]
    fn authors_always_see_their_own_posts() {
        for visibility in [Visibility::Friends, Visibility::Private] {
            assert_eq!(
                check_post_access(Some("author"), "author", visibility, false),
                PostAccess::Allowed
            );
        }
    }

    #[test]
    fn friends_only_posts_require_the_edge() {
        assert_eq!(
            check_post_access(Some("viewer"), "author", Visibility::Friends, true),
            PostAccess::Allowed
        );
        assert_eq!(
            check_post_access(Some("viewer"), "author", Visibility::Friends, false),
            PostAccess::Denied
        );
    }

    #[test]
    fn private_posts_are_author_only() {
        assert_eq!(
            check_post_access(Some("viewer"), "author", Visibility::Private, true),
            PostAccess::Denied
        );
    }

    #[test]
    fn anonymous_viewers_are_asked_to_authenticate() {
        for visibility in [Visibility::Friends, Visibility::Private] {
            assert_eq!(
                check_post_access(None, "author", visibility, false),
                PostAccess::AuthRequired
            );
        }
    }
}
