//! Tests for account update and deletion

mod common;

use common::{create_test_server, login, register_account};
use serde_json::{json, Value};

#[tokio::test]
async fn test_update_own_profile() {
    let (server, _, _) = create_test_server();
    let id = register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let token = login(&server, "a@example.com", "correct-password").await;

    let updated: Value = server
        .put(&format!("/api/users/{}", id))
        .authorization_bearer(&token)
        .json(&json!({ "name": "Renamed", "avatar_url": "https://example.com/a.png" }))
        .await
        .json();
    assert_eq!(updated["name"], "Renamed");
    assert_eq!(updated["avatar_url"], "https://example.com/a.png");
    // Untouched fields stay put
    assert_eq!(updated["email"], "a@example.com");
}

#[tokio::test]
async fn test_cannot_touch_other_accounts() {
    let (server, _, _) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let other = register_account(&server, "555-0101", "b@example.com", "correct-password").await;
    let token = login(&server, "a@example.com", "correct-password").await;

    let response = server
        .put(&format!("/api/users/{}", other))
        .authorization_bearer(&token)
        .json(&json!({ "name": "Hijacked" }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = server
        .delete(&format!("/api/users/{}", other))
        .authorization_bearer(&token)
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_delete_account() {
    let (server, _, _) = create_test_server();
    let id = register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let token = login(&server, "a@example.com", "correct-password").await;

    let response = server
        .delete(&format!("/api/users/{}", id))
        .authorization_bearer(&token)
        .await;
    assert_eq!(response.status_code(), 200);

    // The account is gone: login and profile both fail
    let response = server
        .post("/api/auth/login")
        .json(&json!({ "username": "a@example.com", "password": "correct-password" }))
        .await;
    assert_eq!(response.status_code(), 404);

    let response = server
        .get("/api/auth/profile")
        .authorization_bearer(&token)
        .await;
    assert_eq!(response.status_code(), 404);
}
