//! Friend endpoints
//!
//! Suggestions, request lifecycle (send/accept/cancel), unfriend, and
//! relationship status.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use super::dto::*;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::User;
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::{GraphService, RelationStatus, RelationshipService, SendRequestOutcome};

/// Default page size for friend listings
const DEFAULT_LIMIT: i64 = 20;

// Note: page/limit are inlined rather than flattened from PageParams;
// serde_urlencoded cannot deserialize numbers through #[serde(flatten)].
#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

impl SuggestionParams {
    fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendFriendRequestBody {
    pub recipient_id: Option<String>,
}

/// GET /api/friends/suggestions
pub async fn get_suggestions(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<SuggestionParams>,
) -> Result<Json<ApiResponse<SuggestionsData>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/friends/suggestions"])
        .start_timer();

    let (page, limit, skip) = params.page_params().normalized(DEFAULT_LIMIT);
    let graph = GraphService::new(state.db.clone());

    let (candidates, total) = graph
        .suggestions(&user_id, params.search.as_deref(), skip, limit)
        .await?;

    let suggestions = candidates
        .iter()
        .map(|(user, mutual)| UserSummary::with_mutual(user, *mutual))
        .collect();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/friends/suggestions", "200"])
        .inc();

    Ok(Json(ApiResponse::new(SuggestionsData {
        suggestions,
        pagination: Pagination::new(page, limit, total),
    })))
}

/// POST /api/friends/requests
///
/// Creates a pending request (201), or resolves the pending
/// counter-request into a friendship in the collision case (200).
pub async fn send_friend_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<SendFriendRequestBody>,
) -> Result<(StatusCode, Json<ApiResponse<SendRequestData>>), AppError> {
    let recipient_id = body
        .recipient_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("recipient_id is required".to_string()))?;

    let relationships = RelationshipService::new(state.db.clone());
    let outcome = relationships.send_request(&user_id, &recipient_id).await?;

    let recipient = state.db.get_user(&recipient_id).await?;

    match outcome {
        SendRequestOutcome::Pending(request) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::new(SendRequestData::Request(
                FriendRequestData {
                    request_id: request.id,
                    recipient: recipient.as_ref().map(UserSummary::from_user),
                    status: request.status,
                    created_at: request.created_at,
                },
            ))),
        )),
        SendRequestOutcome::Accepted(friendship) => Ok((
            StatusCode::OK,
            Json(ApiResponse::new(SendRequestData::Friendship(
                FriendshipData {
                    friendship_id: friendship.id,
                    friend: recipient.as_ref().map(UserSummary::from_user),
                    created_at: friendship.created_at,
                },
            ))),
        )),
    }
}

/// PATCH /api/friends/requests/:id/accept
pub async fn accept_friend_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(request_id): Path<String>,
) -> Result<Json<ApiResponse<FriendshipData>>, AppError> {
    let relationships = RelationshipService::new(state.db.clone());
    let friendship = relationships.accept_request(&user_id, &request_id).await?;

    let friend_id = friendship.other(&user_id).to_string();
    let friend = state.db.get_user(&friend_id).await?;

    Ok(Json(ApiResponse::new(FriendshipData {
        friendship_id: friendship.id,
        friend: friend.as_ref().map(UserSummary::from_user),
        created_at: friendship.created_at,
    })))
}

/// DELETE /api/friends/requests/:id
pub async fn cancel_friend_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(request_id): Path<String>,
) -> Result<Json<ApiResponse<MessageData>>, AppError> {
    let relationships = RelationshipService::new(state.db.clone());
    relationships.cancel_request(&user_id, &request_id).await?;

    Ok(Json(ApiResponse::new(MessageData::new(
        "Friend request cancelled",
    ))))
}

/// DELETE /api/friends/:user_id
pub async fn unfriend(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(friend_id): Path<String>,
) -> Result<Json<ApiResponse<MessageData>>, AppError> {
    let relationships = RelationshipService::new(state.db.clone());
    relationships.unfriend(&user_id, &friend_id).await?;

    Ok(Json(ApiResponse::new(MessageData::new(
        "Unfriended successfully",
    ))))
}

/// GET /api/friends/status/:user_id
pub async fn friend_status(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(other_id): Path<String>,
) -> Result<Json<ApiResponse<RelationStatusData>>, AppError> {
    let relationships = RelationshipService::new(state.db.clone());
    let status = relationships.relation_status(&user_id, &other_id).await?;

    let data = match status {
        RelationStatus::Friends { ref friendship_id } => RelationStatusData {
            status: status.as_str(),
            user_id: other_id,
            request_id: None,
            friendship_id: Some(friendship_id.clone()),
        },
        RelationStatus::PendingSent { ref request_id }
        | RelationStatus::PendingReceived { ref request_id } => RelationStatusData {
            status: status.as_str(),
            user_id: other_id,
            request_id: Some(request_id.clone()),
            friendship_id: None,
        },
        RelationStatus::NotFriends => RelationStatusData {
            status: status.as_str(),
            user_id: other_id,
            request_id: None,
            friendship_id: None,
        },
    };

    Ok(Json(ApiResponse::new(data)))
}

/// GET /api/friends/requests/received
///
/// Pending requests addressed to the caller, each with the sender's
/// profile and mutual-friend count.
pub async fn received_requests(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<ReceivedRequestsData>>, AppError> {
    let (page, limit, skip) = params.normalized(DEFAULT_LIMIT);
    let relationships = RelationshipService::new(state.db.clone());
    let graph = GraphService::new(state.db.clone());

    let (requests, total) = relationships.received_requests(&user_id, skip, limit).await?;

    let sender_ids: Vec<String> = requests.iter().map(|r| r.sender_id.clone()).collect();
    let senders = user_map(&state, &sender_ids).await?;
    let mutual = graph.mutual_counts(&user_id, &sender_ids).await?;

    let items = requests
        .into_iter()
        .map(|request| ReceivedRequestItem {
            sender: senders.get(&request.sender_id).map(|user| {
                UserSummary::with_mutual(
                    user,
                    mutual.get(&request.sender_id).copied().unwrap_or(0),
                )
            }),
            request_id: request.id,
            created_at: request.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::new(ReceivedRequestsData {
        requests: items,
        pagination: Pagination::new(page, limit, total),
    })))
}

/// GET /api/friends/requests/sent
pub async fn sent_requests(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<SentRequestsData>>, AppError> {
    let (page, limit, skip) = params.normalized(DEFAULT_LIMIT);
    let relationships = RelationshipService::new(state.db.clone());

    let (requests, total) = relationships.sent_requests(&user_id, skip, limit).await?;

    let recipient_ids: Vec<String> = requests.iter().map(|r| r.recipient_id.clone()).collect();
    let recipients = user_map(&state, &recipient_ids).await?;

    let items = requests
        .into_iter()
        .map(|request| SentRequestItem {
            recipient: recipients
                .get(&request.recipient_id)
                .map(UserSummary::from_user),
            request_id: request.id,
            created_at: request.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::new(SentRequestsData {
        requests: items,
        pagination: Pagination::new(page, limit, total),
    })))
}

/// Batch-resolve users into an id-keyed map.
async fn user_map(state: &AppState, ids: &[String]) -> Result<HashMap<String, User>, AppError> {
    let users = state.db.get_users_by_ids(ids).await?;
    Ok(users.into_iter().map(|user| (user.id.clone(), user)).collect())
}
