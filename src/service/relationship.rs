//! Relationship state machine
//!
//! Governs the legal transitions between "no relation", "pending" and
//! "friends" for a pair of users:
//!
//! ```text
//! NONE --SendRequest--> PENDING(sender -> recipient)
//! PENDING --Accept (by recipient)--> FRIENDS
//! PENDING --Cancel (by sender)--> NONE
//! PENDING(A -> B) --SendRequest(B, A)--> FRIENDS   (collision)
//! FRIENDS --Unfriend--> NONE
//! ```
//!
//! No other transitions are legal. The mutating transitions themselves
//! live in the data layer so each runs atomically; this service maps
//! outcomes to domain errors and enforces actor checks.

use std::sync::Arc;

use crate::data::{Database, FriendRequest, Friendship, PairKey, RequestStatus, SendTransition};
use crate::error::AppError;
use crate::metrics::FRIEND_REQUESTS_TOTAL;

/// Relationship of a pair as seen from the caller's side.
///
/// Friendship existence is checked first, then sent-pending, then
/// received-pending. The three checks are independent queries that are
/// only mutually exclusive by invariant, so this order is the tie-break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationStatus {
    Friends { friendship_id: String },
    PendingSent { request_id: String },
    PendingReceived { request_id: String },
    NotFriends,
}

impl RelationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Friends { .. } => "friends",
            Self::PendingSent { .. } => "pending_sent",
            Self::PendingReceived { .. } => "pending_received",
            Self::NotFriends => "not_friends",
        }
    }
}

/// Result of a successful send-request call.
///
/// A send normally produces a pending request; in the collision case
/// (the recipient had already sent one the other way) it produces the
/// friendship instead.
#[derive(Debug)]
pub enum SendRequestOutcome {
    Pending(FriendRequest),
    Accepted(Friendship),
}

/// Relationship service
pub struct RelationshipService {
    db: Arc<Database>,
}

impl RelationshipService {
    /// Create new relationship service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Send a friend request from `sender_id` to `recipient_id`.
    ///
    /// # Errors
    /// - `InvalidRequest` for a self-request
    /// - `UserNotFound` if the recipient does not exist
    /// - `AlreadyFriends` / `RequestAlreadySent` per the state machine
    pub async fn send_request(
        &self,
        sender_id: &str,
        recipient_id: &str,
    ) -> Result<SendRequestOutcome, AppError> {
        if sender_id == recipient_id {
            return Err(AppError::InvalidRequest(
                "Cannot send a friend request to yourself".to_string(),
            ));
        }

        if self.db.get_user(recipient_id).await?.is_none() {
            return Err(AppError::UserNotFound);
        }

        match self
            .db
            .send_request_transition(sender_id, recipient_id)
            .await?
        {
            SendTransition::AlreadyFriends => Err(AppError::AlreadyFriends),
            SendTransition::AlreadyPending => Err(AppError::RequestAlreadySent),
            SendTransition::Collision(friendship) => {
                FRIEND_REQUESTS_TOTAL
                    .with_label_values(&["collision_accepted"])
                    .inc();
                tracing::debug!(
                    sender = %sender_id,
                    recipient = %recipient_id,
                    friendship_id = %friendship.id,
                    "Simultaneous friend requests resolved into a friendship"
                );
                Ok(SendRequestOutcome::Accepted(friendship))
            }
            SendTransition::Created(request) => {
                FRIEND_REQUESTS_TOTAL.with_label_values(&["sent"]).inc();
                Ok(SendRequestOutcome::Pending(request))
            }
        }
    }

    /// Accept a pending request. Only the recipient may accept.
    pub async fn accept_request(
        &self,
        caller_id: &str,
        request_id: &str,
    ) -> Result<Friendship, AppError> {
        let request = self
            .db
            .get_friend_request(request_id)
            .await?
            .ok_or(AppError::RequestNotFound)?;

        if request.status != RequestStatus::Pending.as_str() {
            return Err(AppError::RequestNotFound);
        }

        if request.recipient_id != caller_id {
            return Err(AppError::UnauthorizedAction);
        }

        // The conditional update in the data layer may still lose against
        // a concurrent cancel or collision; that reads as not-found here.
        let friendship = self
            .db
            .accept_request(&request)
            .await?
            .ok_or(AppError::RequestNotFound)?;

        FRIEND_REQUESTS_TOTAL.with_label_values(&["accepted"]).inc();
        Ok(friendship)
    }

    /// Cancel a pending request. Only the sender may cancel; the record
    /// is deleted, not marked.
    pub async fn cancel_request(&self, caller_id: &str, request_id: &str) -> Result<(), AppError> {
        let request = self
            .db
            .get_friend_request(request_id)
            .await?
            .ok_or(AppError::RequestNotFound)?;

        if request.status != RequestStatus::Pending.as_str() {
            return Err(AppError::RequestNotFound);
        }

        if request.sender_id != caller_id {
            return Err(AppError::UnauthorizedAction);
        }

        if !self.db.delete_request_if_pending(request_id).await? {
            return Err(AppError::RequestNotFound);
        }

        FRIEND_REQUESTS_TOTAL
            .with_label_values(&["cancelled"])
            .inc();
        Ok(())
    }

    /// Remove the friendship between the caller and another user,
    /// regardless of which side originally initiated it.
    pub async fn unfriend(&self, caller_id: &str, other_id: &str) -> Result<(), AppError> {
        if caller_id == other_id {
            return Err(AppError::InvalidRequest(
                "Cannot unfriend yourself".to_string(),
            ));
        }

        let pair = PairKey::new(caller_id, other_id);
        if !self.db.unfriend_transition(&pair).await? {
            return Err(AppError::FriendshipNotFound);
        }

        Ok(())
    }

    /// Relationship status between the caller and another user.
    pub async fn relation_status(
        &self,
        caller_id: &str,
        other_id: &str,
    ) -> Result<RelationStatus, AppError> {
        if caller_id == other_id {
            return Err(AppError::InvalidRequest(
                "Cannot check friendship status with yourself".to_string(),
            ));
        }

        let pair = PairKey::new(caller_id, other_id);
        if let Some(friendship) = self.db.get_friendship_by_pair(&pair).await? {
            return Ok(RelationStatus::Friends {
                friendship_id: friendship.id,
            });
        }

        if let Some(request) = self.db.find_pending_request(caller_id, other_id).await? {
            return Ok(RelationStatus::PendingSent {
                request_id: request.id,
            });
        }

        if let Some(request) = self.db.find_pending_request(other_id, caller_id).await? {
            return Ok(RelationStatus::PendingReceived {
                request_id: request.id,
            });
        }

        Ok(RelationStatus::NotFriends)
    }

    /// Whether an accepted friendship exists between two users.
    pub async fn are_friends(&self, a: &str, b: &str) -> Result<bool, AppError> {
        let pair = PairKey::new(a, b);
        Ok(self.db.get_friendship_by_pair(&pair).await?.is_some())
    }

    /// Pending requests received by the caller, newest first.
    pub async fn received_requests(
        &self,
        caller_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<FriendRequest>, i64), AppError> {
        let total = self.db.count_pending_received(caller_id).await?;
        let requests = self.db.get_pending_received(caller_id, skip, limit).await?;
        Ok((requests, total))
    }

    /// Pending requests sent by the caller, newest first.
    pub async fn sent_requests(
        &self,
        caller_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<FriendRequest>, i64), AppError> {
        let total = self.db.count_pending_sent(caller_id).await?;
        let requests = self.db.get_pending_sent(caller_id, skip, limit).await?;
        Ok((requests, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EntityId, User};
    use chrono::Utc;
    use tempfile::TempDir;

    async fn setup() -> (RelationshipService, Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        (RelationshipService::new(db.clone()), db, temp_dir)
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

    #[tokio::test]
    async fn send_request_sets_pending_status_on_both_sides() {
        let (service, db, _temp_dir) = setup().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;

        let outcome = service.send_request(&alice, &bob).await.unwrap();
        assert!(matches!(outcome, SendRequestOutcome::Pending(_)));

        let from_alice = service.relation_status(&alice, &bob).await.unwrap();
        assert!(matches!(from_alice, RelationStatus::PendingSent { .. }));

        let from_bob = service.relation_status(&bob, &alice).await.unwrap();
        assert!(matches!(from_bob, RelationStatus::PendingReceived { .. }));
    }

    #[tokio::test]
    async fn self_request_is_rejected() {
        let (service, db, _temp_dir) = setup().await;
        let alice = create_user(&db, "alice").await;

        let err = service.send_request(&alice, &alice).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn duplicate_send_is_a_conflict() {
        let (service, db, _temp_dir) = setup().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;

        service.send_request(&alice, &bob).await.unwrap();
        let err = service.send_request(&alice, &bob).await.unwrap_err();
        assert!(matches!(err, AppError::RequestAlreadySent));
    }

    #[tokio::test]
    async fn collision_produces_exactly_one_friendship_and_no_pending() {
        let (service, db, _temp_dir) = setup().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;

        service.send_request(&alice, &bob).await.unwrap();

        // The counter-request resolves into a friendship, not a second
        // pending request.
        let outcome = service.send_request(&bob, &alice).await.unwrap();
        assert!(matches!(outcome, SendRequestOutcome::Accepted(_)));

        assert!(service.are_friends(&alice, &bob).await.unwrap());
        assert!(db
            .find_pending_request(&alice, &bob)
            .await
            .unwrap()
            .is_none());
        assert!(db
            .find_pending_request(&bob, &alice)
            .await
            .unwrap()
            .is_none());

        // A repeated send in either direction now conflicts.
        let err = service.send_request(&alice, &bob).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyFriends));
    }

    #[tokio::test]
    async fn accept_is_recipient_only() {
        let (service, db, _temp_dir) = setup().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let carol = create_user(&db, "carol").await;

        let outcome = service.send_request(&alice, &bob).await.unwrap();
        let request_id = match outcome {
            SendRequestOutcome::Pending(request) => request.id,
            other => panic!("expected pending request, got {:?}", other),
        };

        let err = service.accept_request(&carol, &request_id).await.unwrap_err();
        assert!(matches!(err, AppError::UnauthorizedAction));

        // Sender cannot accept their own request either.
        let err = service.accept_request(&alice, &request_id).await.unwrap_err();
        assert!(matches!(err, AppError::UnauthorizedAction));

        service.accept_request(&bob, &request_id).await.unwrap();
        assert!(service.are_friends(&alice, &bob).await.unwrap());
    }

    #[tokio::test]
    async fn accepted_request_cannot_be_accepted_again() {
        let (service, db, _temp_dir) = setup().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;

        let outcome = service.send_request(&alice, &bob).await.unwrap();
        let request_id = match outcome {
            SendRequestOutcome::Pending(request) => request.id,
            other => panic!("expected pending request, got {:?}", other),
        };

        service.accept_request(&bob, &request_id).await.unwrap();
        let err = service.accept_request(&bob, &request_id).await.unwrap_err();
        assert!(matches!(err, AppError::RequestNotFound));
    }

    #[tokio::test]
    async fn cancel_is_sender_only_and_deletes_the_record() {
        let (service, db, _temp_dir) = setup().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;

        let outcome = service.send_request(&alice, &bob).await.unwrap();
        let request_id = match outcome {
            SendRequestOutcome::Pending(request) => request.id,
            other => panic!("expected pending request, got {:?}", other),
        };

        let err = service.cancel_request(&bob, &request_id).await.unwrap_err();
        assert!(matches!(err, AppError::UnauthorizedAction));

        service.cancel_request(&alice, &request_id).await.unwrap();
        assert!(db.get_friend_request(&request_id).await.unwrap().is_none());

        let status = service.relation_status(&alice, &bob).await.unwrap();
        assert_eq!(status, RelationStatus::NotFriends);
    }

    #[tokio::test]
    async fn unfriend_then_status_then_repeat_unfriend() {
        let (service, db, _temp_dir) = setup().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;

        service.send_request(&alice, &bob).await.unwrap();
        // Collision resolution marks the request accepted.
        service.send_request(&bob, &alice).await.unwrap();

        service.unfriend(&alice, &bob).await.unwrap();

        let status = service.relation_status(&alice, &bob).await.unwrap();
        assert_eq!(status, RelationStatus::NotFriends);

        // Accepted-request residue is purged with the edge, so a fresh
        // request starts from NONE.
        let outcome = service.send_request(&bob, &alice).await.unwrap();
        assert!(matches!(outcome, SendRequestOutcome::Pending(_)));

        let err = service.unfriend(&alice, &bob).await.unwrap_err();
        assert!(matches!(err, AppError::FriendshipNotFound));
    }

    #[tokio::test]
    async fn unfriend_works_from_either_side() {
        let (service, db, _temp_dir) = setup().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;

        service.send_request(&alice, &bob).await.unwrap();
        service.send_request(&bob, &alice).await.unwrap();

        // Bob did not create the edge row, but can still remove it.
        service.unfriend(&bob, &alice).await.unwrap();
        assert!(!service.are_friends(&alice, &bob).await.unwrap());
    }
}
