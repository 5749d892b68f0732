//! Social graph queries
//!
//! Mutual-friend computation and friend suggestions. Mutual counts are
//! annotations only; they never affect ordering or filtering.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::data::{Database, User};
use crate::error::AppError;

/// Graph service
pub struct GraphService {
    db: Arc<Database>,
}

impl GraphService {
    /// Create new graph service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Number of mutual friends between two users: the cardinality of
    /// the intersection of their accepted-friend neighbor sets.
    ///
    /// A user is never implicitly a member of their own neighbor set.
    pub async fn mutual_friends_count(&self, a: &str, b: &str) -> Result<usize, AppError> {
        let a_friends: HashSet<String> = self.db.get_friend_ids(a).await?.into_iter().collect();
        if a_friends.is_empty() {
            return Ok(0);
        }

        let b_friends: HashSet<String> = self.db.get_friend_ids(b).await?.into_iter().collect();
        Ok(a_friends.intersection(&b_friends).count())
    }

    /// Mutual-friend counts of each of `others` relative to `user_id`,
    /// resolved from one batched edge query instead of per-user lookups.
    pub async fn mutual_counts(
        &self,
        user_id: &str,
        others: &[String],
    ) -> Result<HashMap<String, usize>, AppError> {
        let mut counts: HashMap<String, usize> =
            others.iter().map(|id| (id.clone(), 0)).collect();
        if counts.is_empty() {
            return Ok(counts);
        }

        let caller_friends: HashSet<String> =
            self.db.get_friend_ids(user_id).await?.into_iter().collect();
        if caller_friends.is_empty() {
            return Ok(counts);
        }

        // Each edge contributes the far endpoint to the near endpoint's
        // neighbor set; a neighbor counts when it is also a friend of the
        // caller.
        for (user, friend) in self.db.get_friendship_edges_touching(others).await? {
            if let Some(count) = counts.get_mut(&user) {
                if caller_friends.contains(&friend) {
                    *count += 1;
                }
            }
            if let Some(count) = counts.get_mut(&friend) {
                if caller_friends.contains(&user) {
                    *count += 1;
                }
            }
        }

        Ok(counts)
    }

    /// One page of friend suggestions for the caller, each annotated
    /// with its mutual-friend count.
    ///
    /// A user never appears as a suggestion while any relation (friend
    /// or pending, either direction) exists with the caller; the
    /// exclusion lives in the query predicate shared with the count.
    pub async fn suggestions(
        &self,
        user_id: &str,
        search: Option<&str>,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<(User, usize)>, i64), AppError> {
        let total = self.db.count_suggestions(user_id, search).await?;
        let candidates = self.db.find_suggestions(user_id, search, skip, limit).await?;

        let candidate_ids: Vec<String> = candidates.iter().map(|u| u.id.clone()).collect();
        let counts = self.mutual_counts(user_id, &candidate_ids).await?;

        let annotated = candidates
            .into_iter()
            .map(|user| {
                let mutual = counts.get(&user.id).copied().unwrap_or(0);
                (user, mutual)
            })
            .collect();

        Ok((annotated, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EntityId, PairKey, SendTransition};
    use chrono::Utc;
    use tempfile::TempDir;

    async fn setup() -> (GraphService, Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        (GraphService::new(db.clone()), db, temp_dir)
    }

    async fn create_user(db: &Database, name: &str) -> String {
        let now = Utc::now();
        let user = User {
            id: EntityId::new().0,
            full_name: name.to_string(),
            email: format!("{}@example.com", name),
            avatar: None,
            bio: None,
            created_at: now,
            updated_at: now,
        };
        db.insert_user(&user).await.unwrap();
        user.id
    }

    /// Create a friendship edge directly through the send/collision
    /// transitions.
    async fn befriend(db: &Database, a: &str, b: &str) {
        match db.send_request_transition(a, b).await.unwrap() {
            SendTransition::Created(_) => {}
            other => panic!("expected created, got {:?}", other),
        }
        match db.send_request_transition(b, a).await.unwrap() {
            SendTransition::Collision(_) => {}
            other => panic!("expected collision, got {:?}", other),
        }
        assert!(db
            .get_friendship_by_pair(&PairKey::new(a, b))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn mutual_count_is_the_neighbor_set_intersection() {
        let (graph, db, _temp_dir) = setup().await;
        let u1 = create_user(&db, "u1").await;
        let u2 = create_user(&db, "u2").await;
        let u3 = create_user(&db, "u3").await;
        let u4 = create_user(&db, "u4").await;
        let u5 = create_user(&db, "u5").await;

        // u1 friends with {u2, u3}; u4 friends with {u2, u5}.
        befriend(&db, &u1, &u2).await;
        befriend(&db, &u1, &u3).await;
        befriend(&db, &u4, &u2).await;
        befriend(&db, &u4, &u5).await;

        assert_eq!(graph.mutual_friends_count(&u1, &u4).await.unwrap(), 1);
        assert_eq!(graph.mutual_friends_count(&u4, &u1).await.unwrap(), 1);
        // Being friends with each other is not a mutual friend.
        assert_eq!(graph.mutual_friends_count(&u1, &u2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn suggestions_exclude_self_friends_and_pending_contacts() {
        let (graph, db, _temp_dir) = setup().await;
        let u1 = create_user(&db, "u1").await;
        let u2 = create_user(&db, "u2").await;
        let u3 = create_user(&db, "u3").await;
        let u4 = create_user(&db, "u4").await;
        let u5 = create_user(&db, "u5").await;

        // u2 is a friend, u3 has a pending request from u1, u4 sent one
        // to u1. Only u5 remains suggestible.
        befriend(&db, &u1, &u2).await;
        db.send_request_transition(&u1, &u3).await.unwrap();
        db.send_request_transition(&u4, &u1).await.unwrap();

        let (suggestions, total) = graph.suggestions(&u1, None, 0, 20).await.unwrap();
        assert_eq!(total, 1);
        let ids: Vec<&str> = suggestions.iter().map(|(u, _)| u.id.as_str()).collect();
        assert_eq!(ids, vec![u5.as_str()]);
    }

    #[tokio::test]
    async fn suggestions_are_annotated_with_mutual_counts() {
        let (graph, db, _temp_dir) = setup().await;
        let u1 = create_user(&db, "u1").await;
        let u2 = create_user(&db, "u2").await;
        let u3 = create_user(&db, "u3").await;

        // u3 is a friend of u1's friend u2, so u3 suggests with 1 mutual.
        befriend(&db, &u1, &u2).await;
        befriend(&db, &u2, &u3).await;

        let (suggestions, total) = graph.suggestions(&u1, None, 0, 20).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(suggestions[0].0.id, u3);
        assert_eq!(suggestions[0].1, 1);
    }

    #[tokio::test]
    async fn suggestion_search_filters_by_name_substring() {
        let (graph, db, _temp_dir) = setup().await;
        let u1 = create_user(&db, "caller").await;
        create_user(&db, "Alice Wonder").await;
        create_user(&db, "Bob Builder").await;

        let (suggestions, total) = graph.suggestions(&u1, Some("alice"), 0, 20).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(suggestions[0].0.full_name, "Alice Wonder");

        // LIKE wildcards in the search string are treated literally.
        let (_, total) = graph.suggestions(&u1, Some("%"), 0, 20).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn suggestion_pagination_counts_match_the_filter() {
        let (graph, db, _temp_dir) = setup().await;
        let caller = create_user(&db, "caller").await;
        for i in 0..5 {
            create_user(&db, &format!("candidate-{}", i)).await;
        }

        let (page1, total) = graph.suggestions(&caller, None, 0, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page1.len(), 2);

        let (page3, _) = graph.suggestions(&caller, None, 4, 2).await.unwrap();
        assert_eq!(page3.len(), 1);
    }
}
