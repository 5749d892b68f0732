//! SQLite database operations
//!
//! All database access goes through this module.
//! Relationship transitions (send/accept/unfriend) run inside a single
//! transaction with conditional statements, so concurrent callers cannot
//! create duplicate edges or leave an edge and a pending request behind.

use chrono::{DateTime, Utc};
use sqlx::{Pool, QueryBuilder, Sqlite, SqlitePool, Transaction};
use std::collections::HashSet;
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

/// Escape LIKE wildcards in user-supplied search text.
///
/// Callers combine the result with `ESCAPE '\'` in the query.
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Result of the send-request transition.
///
/// Modeled as a single transition over the pair state so the collision
/// branch cannot be skipped by a caller composing separate checks.
#[derive(Debug)]
pub enum SendTransition {
    /// Pair is already FRIENDS
    AlreadyFriends,
    /// A pending request in the same direction already exists
    AlreadyPending,
    /// The other side had a pending request; it was accepted instead
    Collision(Friendship),
    /// A fresh pending request was created
    Created(FriendRequest),
}

/// Append the feed membership predicate shared by the page and count
/// queries. A post is visible when it is public, authored by the viewer,
/// or friends-only from one of the viewer's friends. Anonymous viewers
/// only evaluate the public clause.
fn push_feed_predicate(builder: &mut QueryBuilder<'_, Sqlite>, viewer: Option<&str>) {
    match viewer {
        None => {
            builder.push(" WHERE visibility = 'public'");
        }
        Some(viewer) => {
            builder
                .push(" WHERE (visibility = 'public' OR author_id = ")
                .push_bind(viewer.to_string())
                .push(" OR (visibility = 'friends' AND author_id IN (")
                .push("SELECT CASE WHEN user_id = ")
                .push_bind(viewer.to_string())
                .push(" THEN friend_id ELSE user_id END FROM friendships WHERE user_id = ")
                .push_bind(viewer.to_string())
                .push(" OR friend_id = ")
                .push_bind(viewer.to_string())
                .push(")))");
        }
    }
}

/// Append the suggestion predicate shared by the page and count queries:
/// exclude the caller, accepted friends, and anyone with a pending
/// request to or from the caller, optionally filtered by name substring.
fn push_suggestion_predicate(
    builder: &mut QueryBuilder<'_, Sqlite>,
    user_id: &str,
    search: Option<&str>,
) {
    builder
        .push(" WHERE users.id <> ")
        .push_bind(user_id.to_string())
        .push(" AND users.id NOT IN (")
        .push("SELECT CASE WHEN user_id = ")
        .push_bind(user_id.to_string())
        .push(" THEN friend_id ELSE user_id END FROM friendships WHERE user_id = ")
        .push_bind(user_id.to_string())
        .push(" OR friend_id = ")
        .push_bind(user_id.to_string())
        .push(")")
        .push(" AND users.id NOT IN (")
        .push("SELECT CASE WHEN sender_id = ")
        .push_bind(user_id.to_string())
        .push(" THEN recipient_id ELSE sender_id END FROM friend_requests WHERE (sender_id = ")
        .push_bind(user_id.to_string())
        .push(" OR recipient_id = ")
        .push_bind(user_id.to_string())
        .push(") AND status = 'pending')");

    if let Some(search) = search.filter(|s| !s.is_empty()) {
        builder
            .push(" AND users.full_name LIKE ")
            .push_bind(format!("%{}%", escape_like(search)))
            .push(" ESCAPE '\\'");
    }
}

/// Insert a friendship edge for the pair, tolerating a concurrent insert.
///
/// Uses `INSERT OR IGNORE` against the unique `(pair_lo, pair_hi)` index,
/// then reads the canonical row back, so exactly one edge exists per pair
/// no matter which caller wins.
async fn insert_friendship_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    friend_id: &str,
    now: DateTime<Utc>,
) -> Result<Friendship, AppError> {
    let pair = PairKey::new(user_id, friend_id);

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO friendships (id, user_id, friend_id, status, created_at)
        VALUES (?, ?, ?, 'accepted', ?)
        "#,
    )
    .bind(EntityId::new().0)
    .bind(user_id)
    .bind(friend_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    let friendship = sqlx::query_as::<_, Friendship>(
        "SELECT * FROM friendships WHERE pair_lo = ? AND pair_hi = ?",
    )
    .bind(&pair.lo)
    .bind(&pair.hi)
    .fetch_one(&mut **tx)
    .await?;

    Ok(friendship)
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, full_name, email, avatar, bio, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.avatar)
        .bind(&user.bio)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get user by ID
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get multiple users by IDs (batch operation to avoid N+1)
    pub async fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        // SQLite caps the number of bound parameters, so chunk the IN list.
        let mut all_users = Vec::new();

        for chunk in ids.chunks(100) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let query = format!("SELECT * FROM users WHERE id IN ({})", placeholders);

            let mut query_builder = sqlx::query_as::<_, User>(&query);
            for id in chunk {
                query_builder = query_builder.bind(id);
            }

            let users = query_builder.fetch_all(&self.pool).await?;
            all_users.extend(users);
        }

        Ok(all_users)
    }

    /// Update allow-listed profile fields by user ID.
    ///
    /// Fields set to `None` are left unchanged.
    ///
    /// # Returns
    /// `true` if updated, `false` if no matching user row exists.
    pub async fn update_user_profile(
        &self,
        user_id: &str,
        full_name: Option<&str>,
        avatar: Option<&str>,
        bio: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
        let mut fields = builder.separated(", ");

        if let Some(full_name) = full_name {
            fields
                .push("full_name = ")
                .push_bind_unseparated(full_name.to_string());
        }
        if let Some(avatar) = avatar {
            fields
                .push("avatar = ")
                .push_bind_unseparated(avatar.to_string());
        }
        if let Some(bio) = bio {
            fields.push("bio = ").push_bind_unseparated(bio.to_string());
        }
        fields
            .push("updated_at = ")
            .push_bind_unseparated(updated_at);

        builder
            .push(" WHERE id = ")
            .push_bind(user_id.to_string());

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Search users by case-insensitive substring over name and email.
    pub async fn search_users(
        &self,
        query: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<User>, AppError> {
        let pattern = format!("%{}%", escape_like(query));
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE full_name LIKE ? ESCAPE '\' OR email LIKE ? ESCAPE '\'
            ORDER BY full_name ASC, id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Count users matching the search predicate used by [`Self::search_users`].
    pub async fn count_users_matching(&self, query: &str) -> Result<i64, AppError> {
        let pattern = format!("%{}%", escape_like(query));
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM users
            WHERE full_name LIKE ? ESCAPE '\' OR email LIKE ? ESCAPE '\'
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn count_users(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Friend requests
    // =========================================================================

    /// Get friend request by ID
    pub async fn get_friend_request(&self, id: &str) -> Result<Option<FriendRequest>, AppError> {
        let request =
            sqlx::query_as::<_, FriendRequest>("SELECT * FROM friend_requests WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(request)
    }

    /// Find the pending request for an ordered (sender, recipient) pair
    pub async fn find_pending_request(
        &self,
        sender_id: &str,
        recipient_id: &str,
    ) -> Result<Option<FriendRequest>, AppError> {
        let request = sqlx::query_as::<_, FriendRequest>(
            r#"
            SELECT * FROM friend_requests
            WHERE sender_id = ? AND recipient_id = ? AND status = 'pending'
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    /// Pending requests received by a user, newest first
    pub async fn get_pending_received(
        &self,
        recipient_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<FriendRequest>, AppError> {
        let requests = sqlx::query_as::<_, FriendRequest>(
            r#"
            SELECT * FROM friend_requests
            WHERE recipient_id = ? AND status = 'pending'
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(recipient_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    pub async fn count_pending_received(&self, recipient_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM friend_requests WHERE recipient_id = ? AND status = 'pending'",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Pending requests sent by a user, newest first
    pub async fn get_pending_sent(
        &self,
        sender_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<FriendRequest>, AppError> {
        let requests = sqlx::query_as::<_, FriendRequest>(
            r#"
            SELECT * FROM friend_requests
            WHERE sender_id = ? AND status = 'pending'
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(sender_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    pub async fn count_pending_sent(&self, sender_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM friend_requests WHERE sender_id = ? AND status = 'pending'",
        )
        .bind(sender_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // Relationship transitions
    // =========================================================================

    /// Run the send-request transition for (sender -> recipient).
    ///
    /// The whole transition executes in one transaction:
    /// - FRIENDS          -> `AlreadyFriends`
    /// - PENDING same dir -> `AlreadyPending`
    /// - PENDING other dir-> flip it to accepted, create the edge
    ///                       (`Collision`); the conditional UPDATE is the
    ///                       serialization point, only one caller can win
    /// - NONE             -> insert a pending request; the INSERT re-checks
    ///                       both guards so a concurrent accept or send
    ///                       cannot leave an edge plus a pending request
    pub async fn send_request_transition(
        &self,
        sender_id: &str,
        recipient_id: &str,
    ) -> Result<SendTransition, AppError> {
        let pair = PairKey::new(sender_id, recipient_id);
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let friendship_exists = sqlx::query_scalar::<_, String>(
            "SELECT id FROM friendships WHERE pair_lo = ? AND pair_hi = ?",
        )
        .bind(&pair.lo)
        .bind(&pair.hi)
        .fetch_optional(&mut *tx)
        .await?;
        if friendship_exists.is_some() {
            return Ok(SendTransition::AlreadyFriends);
        }

        let already_sent = sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM friend_requests
            WHERE sender_id = ? AND recipient_id = ? AND status = 'pending'
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .fetch_optional(&mut *tx)
        .await?;
        if already_sent.is_some() {
            return Ok(SendTransition::AlreadyPending);
        }

        // Collision: the recipient already has a pending request towards
        // the sender. Flip it to accepted and create the edge instead of
        // creating a duplicate request.
        let flipped = sqlx::query(
            r#"
            UPDATE friend_requests SET status = 'accepted', updated_at = ?
            WHERE sender_id = ? AND recipient_id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(recipient_id)
        .bind(sender_id)
        .execute(&mut *tx)
        .await?;
        if flipped.rows_affected() == 1 {
            let friendship = insert_friendship_in_tx(&mut tx, sender_id, recipient_id, now).await?;
            tx.commit().await?;
            return Ok(SendTransition::Collision(friendship));
        }

        let request = FriendRequest {
            id: EntityId::new().0,
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            status: RequestStatus::Pending.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO friend_requests (id, sender_id, recipient_id, status, created_at, updated_at)
            SELECT ?, ?, ?, 'pending', ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM friendships WHERE pair_lo = ? AND pair_hi = ?
            ) AND NOT EXISTS (
                SELECT 1 FROM friend_requests
                WHERE status = 'pending' AND (
                    (sender_id = ? AND recipient_id = ?) OR
                    (sender_id = ? AND recipient_id = ?)
                )
            )
            "#,
        )
        .bind(&request.id)
        .bind(sender_id)
        .bind(recipient_id)
        .bind(now)
        .bind(now)
        .bind(&pair.lo)
        .bind(&pair.hi)
        .bind(sender_id)
        .bind(recipient_id)
        .bind(recipient_id)
        .bind(sender_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            // Lost a race since the reads above; classify from current state.
            let friendship_exists = sqlx::query_scalar::<_, String>(
                "SELECT id FROM friendships WHERE pair_lo = ? AND pair_hi = ?",
            )
            .bind(&pair.lo)
            .bind(&pair.hi)
            .fetch_optional(&mut *tx)
            .await?;
            if friendship_exists.is_some() {
                return Ok(SendTransition::AlreadyFriends);
            }

            let same_direction = sqlx::query_scalar::<_, String>(
                r#"
                SELECT id FROM friend_requests
                WHERE sender_id = ? AND recipient_id = ? AND status = 'pending'
                "#,
            )
            .bind(sender_id)
            .bind(recipient_id)
            .fetch_optional(&mut *tx)
            .await?;
            if same_direction.is_some() {
                return Ok(SendTransition::AlreadyPending);
            }

            // An opposite-direction pending appeared concurrently; resolve
            // the collision now instead of leaving two unresolved requests.
            let flipped = sqlx::query(
                r#"
                UPDATE friend_requests SET status = 'accepted', updated_at = ?
                WHERE sender_id = ? AND recipient_id = ? AND status = 'pending'
                "#,
            )
            .bind(now)
            .bind(recipient_id)
            .bind(sender_id)
            .execute(&mut *tx)
            .await?;
            if flipped.rows_affected() == 1 {
                let friendship =
                    insert_friendship_in_tx(&mut tx, sender_id, recipient_id, now).await?;
                tx.commit().await?;
                return Ok(SendTransition::Collision(friendship));
            }

            // State moved again; the conflict answer is safe to re-invoke.
            return Ok(SendTransition::AlreadyPending);
        }

        tx.commit().await?;
        Ok(SendTransition::Created(request))
    }

    /// Accept a pending request, creating the friendship edge.
    ///
    /// The `pending -> accepted` update is conditional; if another caller
    /// already resolved or cancelled the request this returns `None` and
    /// writes nothing.
    pub async fn accept_request(
        &self,
        request: &FriendRequest,
    ) -> Result<Option<Friendship>, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE friend_requests SET status = 'accepted', updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(&request.id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        // user_id is the acceptor side.
        let friendship =
            insert_friendship_in_tx(&mut tx, &request.recipient_id, &request.sender_id, now)
                .await?;

        tx.commit().await?;
        Ok(Some(friendship))
    }

    /// Delete a request if it is still pending.
    ///
    /// # Returns
    /// `true` if a row was deleted.
    pub async fn delete_request_if_pending(&self, id: &str) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM friend_requests WHERE id = ? AND status = 'pending'")
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Remove the friendship edge for a pair and purge accepted-request
    /// residue between the two users.
    ///
    /// # Returns
    /// `true` if an edge existed and was removed.
    pub async fn unfriend_transition(&self, pair: &PairKey) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM friendships WHERE pair_lo = ? AND pair_hi = ?")
            .bind(&pair.lo)
            .bind(&pair.hi)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Ok(false);
        }

        // Accepted request rows are resolution residue; they should not
        // survive the edge they produced.
        sqlx::query(
            r#"
            DELETE FROM friend_requests
            WHERE status = 'accepted' AND (
                (sender_id = ? AND recipient_id = ?) OR
                (sender_id = ? AND recipient_id = ?)
            )
            "#,
        )
        .bind(&pair.lo)
        .bind(&pair.hi)
        .bind(&pair.hi)
        .bind(&pair.lo)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    // =========================================================================
    // Friendships
    // =========================================================================

    /// Get the friendship edge for an unordered pair
    pub async fn get_friendship_by_pair(
        &self,
        pair: &PairKey,
    ) -> Result<Option<Friendship>, AppError> {
        let friendship = sqlx::query_as::<_, Friendship>(
            "SELECT * FROM friendships WHERE pair_lo = ? AND pair_hi = ?",
        )
        .bind(&pair.lo)
        .bind(&pair.hi)
        .fetch_optional(&self.pool)
        .await?;

        Ok(friendship)
    }

    /// All friend ids of a user (direction-agnostic)
    pub async fn get_friend_ids(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT CASE WHEN user_id = ? THEN friend_id ELSE user_id END
            FROM friendships
            WHERE user_id = ? OR friend_id = ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// All friendship edges touching any of the given users
    /// (batch operation for mutual-friend annotation, avoids N+1)
    pub async fn get_friendship_edges_touching(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<(String, String)>, AppError> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut edges = Vec::new();

        for chunk in user_ids.chunks(100) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let query = format!(
                "SELECT user_id, friend_id FROM friendships \
                 WHERE user_id IN ({0}) OR friend_id IN ({0})",
                placeholders
            );

            let mut query_builder = sqlx::query_as::<_, (String, String)>(&query);
            for id in chunk {
                query_builder = query_builder.bind(id);
            }
            for id in chunk {
                query_builder = query_builder.bind(id);
            }

            edges.extend(query_builder.fetch_all(&self.pool).await?);
        }

        Ok(edges)
    }

    // =========================================================================
    // Suggestions
    // =========================================================================

    /// Candidate users for friend suggestions: everyone except the caller,
    /// their friends, and users with a pending request either direction.
    pub async fn find_suggestions(
        &self,
        user_id: &str,
        search: Option<&str>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<User>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM users");
        push_suggestion_predicate(&mut builder, user_id, search);
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(skip);

        let users = builder
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    /// Count suggestion candidates with the same predicate as
    /// [`Self::find_suggestions`], so totals always match page contents.
    pub async fn count_suggestions(
        &self,
        user_id: &str,
        search: Option<&str>,
    ) -> Result<i64, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users");
        push_suggestion_predicate(&mut builder, user_id, search);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a new post
    pub async fn insert_post(&self, post: &Post) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO posts (
                id, author_id, content, visibility, tags, location,
                likes_count, comments_count, shares_count, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.author_id)
        .bind(&post.content)
        .bind(&post.visibility)
        .bind(&post.tags)
        .bind(&post.location)
        .bind(post.likes_count)
        .bind(post.comments_count)
        .bind(post.shares_count)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get post by ID
    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    /// Update allow-listed post fields by post ID.
    ///
    /// Fields set to `None` are left unchanged.
    ///
    /// # Returns
    /// `true` if updated, `false` if no matching post row exists.
    pub async fn update_post_fields(
        &self,
        post_id: &str,
        content: Option<&str>,
        visibility: Option<&str>,
        tags: Option<&str>,
        location: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE posts SET ");
        let mut fields = builder.separated(", ");

        if let Some(content) = content {
            fields
                .push("content = ")
                .push_bind_unseparated(content.to_string());
        }
        if let Some(visibility) = visibility {
            fields
                .push("visibility = ")
                .push_bind_unseparated(visibility.to_string());
        }
        if let Some(tags) = tags {
            fields
                .push("tags = ")
                .push_bind_unseparated(tags.to_string());
        }
        if let Some(location) = location {
            fields
                .push("location = ")
                .push_bind_unseparated(location.to_string());
        }
        fields
            .push("updated_at = ")
            .push_bind_unseparated(updated_at);

        builder.push(" WHERE id = ").push_bind(post_id.to_string());

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete a post
    ///
    /// # Returns
    /// `true` if a row was deleted.
    pub async fn delete_post(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn count_posts(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Likes
    // =========================================================================

    /// Toggle a like: likes the post if the user has not liked it,
    /// removes the like otherwise. The membership row and the counter
    /// change in the same transaction; the unique (post_id, user_id)
    /// index keeps concurrent toggles from double-counting.
    ///
    /// # Returns
    /// `None` if the post does not exist, otherwise `Some(liked)` with
    /// the resulting state.
    pub async fn toggle_post_like(
        &self,
        post_id: &str,
        user_id: &str,
    ) -> Result<Option<bool>, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, String>("SELECT id FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO post_likes (id, post_id, user_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(EntityId::new().0)
        .bind(post_id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let liked = if inserted.rows_affected() == 1 {
            sqlx::query("UPDATE posts SET likes_count = likes_count + 1 WHERE id = ?")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
            true
        } else {
            sqlx::query("DELETE FROM post_likes WHERE post_id = ? AND user_id = ?")
                .bind(post_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE posts SET likes_count = MAX(likes_count - 1, 0) WHERE id = ?")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
            false
        };

        tx.commit().await?;
        Ok(Some(liked))
    }

    /// Of the given posts, which has the user liked
    /// (batch operation for feed enrichment)
    pub async fn get_liked_post_ids(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> Result<HashSet<String>, AppError> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut liked = HashSet::new();

        for chunk in post_ids.chunks(100) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let query = format!(
                "SELECT post_id FROM post_likes WHERE user_id = ? AND post_id IN ({})",
                placeholders
            );

            let mut query_builder = sqlx::query_scalar::<_, String>(&query);
            query_builder = query_builder.bind(user_id);
            for id in chunk {
                query_builder = query_builder.bind(id);
            }

            liked.extend(query_builder.fetch_all(&self.pool).await?);
        }

        Ok(liked)
    }

    // =========================================================================
    // Feed
    // =========================================================================

    /// One page of the combined feed for a viewer.
    ///
    /// `sort_column` and `sort_dir` come from the allow-list enums in the
    /// feed service, never from raw request input.
    pub async fn get_feed_posts(
        &self,
        viewer: Option<&str>,
        sort_column: &'static str,
        sort_dir: &'static str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Post>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM posts");
        push_feed_predicate(&mut builder, viewer);
        builder
            .push(format!(" ORDER BY {} {}, id DESC", sort_column, sort_dir))
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(skip);

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    /// Count feed posts with the same membership predicate as
    /// [`Self::get_feed_posts`], so totals always match page contents.
    pub async fn count_feed_posts(&self, viewer: Option<&str>) -> Result<i64, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts");
        push_feed_predicate(&mut builder, viewer);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// One page of an author's posts restricted to the given visibility
    /// tiers, newest first.
    pub async fn get_author_posts(
        &self,
        author_id: &str,
        visibilities: &[&'static str],
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Post>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM posts WHERE author_id = ");
        builder.push_bind(author_id.to_string());
        builder.push(" AND visibility IN (");
        let mut values = builder.separated(", ");
        for visibility in visibilities {
            values.push_bind(*visibility);
        }
        builder.push(")");
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(skip);

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    /// Count an author's posts with the same predicate as
    /// [`Self::get_author_posts`].
    pub async fn count_author_posts(
        &self,
        author_id: &str,
        visibilities: &[&'static str],
    ) -> Result<i64, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts WHERE author_id = ");
        builder.push_bind(author_id.to_string());
        builder.push(" AND visibility IN (");
        let mut values = builder.separated(", ");
        for visibility in visibilities {
            values.push_bind(*visibility);
        }
        builder.push(")");

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
