//! HTTP API endpoints
//!
//! Route composition for the users, friends, and posts surfaces.
//! Authentication is enforced per-handler through the `CurrentUser` and
//! `MaybeUser` extractors.

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::AppState;

pub mod dto;
pub mod friends;
pub mod metrics;
pub mod posts;
pub mod users;

/// Create the `/api` router
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Users
        .route("/users/me", get(users::get_me))
        .route("/users/me", put(users::update_me))
        .route("/users/search", get(users::search_users))
        .route("/users/:id", get(users::get_user))
        // Friends
        .route("/friends/suggestions", get(friends::get_suggestions))
        .route("/friends/requests", post(friends::send_friend_request))
        .route(
            "/friends/requests/received",
            get(friends::received_requests),
        )
        .route("/friends/requests/sent", get(friends::sent_requests))
        .route(
            "/friends/requests/:id",
            delete(friends::cancel_friend_request),
        )
        .route(
            "/friends/requests/:id/accept",
            patch(friends::accept_friend_request),
        )
        .route("/friends/status/:user_id", get(friends::friend_status))
        .route("/friends/:user_id", delete(friends::unfriend))
        // Posts
        .route("/posts", post(posts::create_post))
        .route("/posts/feed", get(posts::combined_feed))
        .route("/posts/user/:user_id", get(posts::user_posts))
        .route("/posts/:id", get(posts::get_post))
        .route("/posts/:id", put(posts::update_post))
        .route("/posts/:id", delete(posts::delete_post))
        .route("/posts/:id/like", post(posts::toggle_like))
}

pub use metrics::metrics_router;
