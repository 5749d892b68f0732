//! E2E tests for the combined feed and post visibility

mod common;

use common::TestServer;
use mingle::data::User;
use serde_json::{Value, json};

async fn create_post(server: &TestServer, author: &User, content: &str, visibility: &str) -> String {
    let response = server
        .client
        .post(server.url("/api/posts"))
        .header("Authorization", server.bearer(author))
        .json(&json!({"content": content, "visibility": visibility}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    body["data"]["post"]["post_id"].as_str().unwrap().to_string()
}

/// Become friends through the collision path.
async fn befriend(server: &TestServer, a: &User, b: &User) {
    for (from, to) in [(a, b), (b, a)] {
        let response = server
            .client
            .post(server.url("/api/friends/requests"))
            .header("Authorization", server.bearer(from))
            .json(&json!({"recipient_id": to.id}))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }
}

async fn feed_contents(server: &TestServer, viewer: Option<&User>, query: &str) -> Value {
    let mut request = server
        .client
        .get(server.url(&format!("/api/posts/feed{}", query)));
    if let Some(viewer) = viewer {
        request = request.header("Authorization", server.bearer(viewer));
    }
    let response = request.send().await.unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_anonymous_feed_is_public_only() {
    let server = TestServer::new().await;
    let author = server.create_user("Author").await;

    create_post(&server, &author, "public post", "public").await;
    create_post(&server, &author, "friends post", "friends").await;
    create_post(&server, &author, "private post", "private").await;

    let body = feed_contents(&server, None, "").await;
    let posts = body["data"]["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["content"], "public post");
    assert_eq!(body["data"]["pagination"]["total_items"], 1);
}

#[tokio::test]
async fn test_friends_only_posts_appear_after_friendship_forms() {
    let server = TestServer::new().await;
    let u5 = server.create_user("U5").await;
    let u6 = server.create_user("U6").await;

    create_post(&server, &u5, "for my friends", "friends").await;

    // U6 is not a friend of U5: the post is excluded.
    let body = feed_contents(&server, Some(&u6), "").await;
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 0);

    befriend(&server, &u5, &u6).await;

    // The next fetch includes it.
    let body = feed_contents(&server, Some(&u6), "").await;
    let posts = body["data"]["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["content"], "for my friends");
    assert_eq!(posts[0]["author"]["user_id"], Value::from(u5.id.clone()));
}

#[tokio::test]
async fn test_own_posts_are_always_in_the_feed() {
    let server = TestServer::new().await;
    let author = server.create_user("Author").await;

    create_post(&server, &author, "my private note", "private").await;

    let body = feed_contents(&server, Some(&author), "").await;
    let posts = body["data"]["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["content"], "my private note");
}

#[tokio::test]
async fn test_feed_pagination_counts_and_page_sizes() {
    let server = TestServer::new().await;
    let author = server.create_user("Author").await;

    for i in 0..25 {
        create_post(&server, &author, &format!("post {}", i), "public").await;
    }

    let body = feed_contents(&server, None, "?page=1&limit=10").await;
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 10);
    let pagination = &body["data"]["pagination"];
    assert_eq!(pagination["total_items"], 25);
    assert_eq!(pagination["total_pages"], 3);

    let body = feed_contents(&server, None, "?page=2&limit=10").await;
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 10);

    let body = feed_contents(&server, None, "?page=3&limit=10").await;
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 5);
    assert_eq!(body["data"]["pagination"]["current_page"], 3);
}

#[tokio::test]
async fn test_empty_feed_still_reports_one_page() {
    let server = TestServer::new().await;

    let body = feed_contents(&server, None, "").await;
    assert_eq!(body["data"]["posts"].as_array().unwrap().len(), 0);
    let pagination = &body["data"]["pagination"];
    assert_eq!(pagination["total_items"], 0);
    assert_eq!(pagination["total_pages"], 1);
}

#[tokio::test]
async fn test_feed_sorting_uses_allow_list_with_fallback() {
    let server = TestServer::new().await;
    let author = server.create_user("Author").await;
    let liker = server.create_user("Liker").await;

    create_post(&server, &author, "unpopular", "public").await;
    let popular = create_post(&server, &author, "popular", "public").await;

    let response = server
        .client
        .post(server.url(&format!("/api/posts/{}/like", popular)))
        .header("Authorization", server.bearer(&liker))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = feed_contents(&server, None, "?sort_by=likes").await;
    let posts = body["data"]["posts"].as_array().unwrap();
    assert_eq!(posts[0]["content"], "popular");

    let body = feed_contents(&server, None, "?sort_by=likes&order=asc").await;
    let posts = body["data"]["posts"].as_array().unwrap();
    assert_eq!(posts[0]["content"], "unpopular");

    // Unknown sort fields fall back to creation time (newest first).
    let body = feed_contents(&server, None, "?sort_by=definitely-not-a-column").await;
    let posts = body["data"]["posts"].as_array().unwrap();
    assert_eq!(posts[0]["content"], "popular");
}

#[tokio::test]
async fn test_single_post_visibility_outcomes() {
    let server = TestServer::new().await;
    let author = server.create_user("Author").await;
    let stranger = server.create_user("Stranger").await;
    let friend = server.create_user("Friend").await;
    befriend(&server, &author, &friend).await;

    let private_post = create_post(&server, &author, "secret", "private").await;
    let friends_post = create_post(&server, &author, "for friends", "friends").await;

    // Anonymous access to a non-public post asks for authentication.
    let response = server
        .client
        .get(server.url(&format!("/api/posts/{}", private_post)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // A private post is forbidden for everyone but the author.
    let response = server
        .client
        .get(server.url(&format!("/api/posts/{}", private_post)))
        .header("Authorization", server.bearer(&friend))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let response = server
        .client
        .get(server.url(&format!("/api/posts/{}", private_post)))
        .header("Authorization", server.bearer(&author))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // A friends-only post is readable by friends, not strangers.
    let response = server
        .client
        .get(server.url(&format!("/api/posts/{}", friends_post)))
        .header("Authorization", server.bearer(&friend))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = server
        .client
        .get(server.url(&format!("/api/posts/{}", friends_post)))
        .header("Authorization", server.bearer(&stranger))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // Unknown ids are a plain 404.
    let response = server
        .client
        .get(server.url("/api/posts/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
