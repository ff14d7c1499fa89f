//! Tests for labels and mailbox search

mod common;

use common::{create_test_server, login, register_account, send_mail};
use serde_json::{json, Value};

#[tokio::test]
async fn test_label_toggle_and_listing() {
    let (server, _, _) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let token = login(&server, "a@example.com", "correct-password").await;

    let mail = send_mail(&server, &token, "a@example.com", "Tagged", "body").await;
    let id = mail["id"].as_u64().unwrap();
    let label = json!({ "label": { "id": "work", "label": "Work", "color": "#ff0000" } });

    // First toggle attaches the label
    let tagged: Value = server
        .post(&format!("/api/email/{}/labels", id))
        .authorization_bearer(&token)
        .json(&label)
        .await
        .json();
    assert_eq!(tagged["labels"].as_array().unwrap().len(), 1);

    let listed: Value = server
        .get("/api/mailbox/labels/work")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Toggling the same label again removes it
    let untagged: Value = server
        .post(&format!("/api/email/{}/labels", id))
        .authorization_bearer(&token)
        .json(&label)
        .await
        .json();
    assert!(untagged["labels"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_label_route() {
    let (server, _, _) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let token = login(&server, "a@example.com", "correct-password").await;

    let mail = send_mail(&server, &token, "a@example.com", "Tagged", "body").await;
    let id = mail["id"].as_u64().unwrap();

    server
        .post(&format!("/api/email/{}/labels", id))
        .authorization_bearer(&token)
        .json(&json!({ "label": { "id": "work", "label": "Work" } }))
        .await;

    let removed: Value = server
        .delete(&format!("/api/email/{}/labels/work", id))
        .authorization_bearer(&token)
        .await
        .json();
    assert!(removed["labels"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_simple_search() {
    let (server, _, _) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let token = login(&server, "a@example.com", "correct-password").await;

    send_mail(&server, &token, "a@example.com", "Quarterly report", "numbers inside").await;
    send_mail(&server, &token, "a@example.com", "Lunch", "pizza?").await;

    let hits: Value = server
        .get("/api/mailbox/search?query=quarterly")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["subject"], "Quarterly report");

    // Body text is searched too
    let hits: Value = server
        .get("/api/mailbox/search?query=pizza")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(hits.as_array().unwrap().len(), 1);

    let hits: Value = server
        .get("/api/mailbox/search?query=nonexistent")
        .authorization_bearer(&token)
        .await
        .json();
    assert!(hits.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_excludes_trash() {
    let (server, _, _) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let token = login(&server, "a@example.com", "correct-password").await;

    let mail = send_mail(&server, &token, "a@example.com", "Quarterly report", "body").await;
    server
        .post(&format!("/api/email/{}/trash", mail["id"].as_u64().unwrap()))
        .authorization_bearer(&token)
        .await;

    let hits: Value = server
        .get("/api/mailbox/search?query=quarterly")
        .authorization_bearer(&token)
        .await
        .json();
    assert!(hits.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_advanced_search() {
    let (server, _, _) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    register_account(&server, "555-0101", "b@example.com", "correct-password").await;
    let a = login(&server, "a@example.com", "correct-password").await;
    let b = login(&server, "b@example.com", "correct-password").await;

    send_mail(&server, &a, "b@example.com", "Invoice March", "amount due").await;
    send_mail(&server, &b, "a@example.com", "Invoice April", "payment received").await;

    // Filter by sender
    let hits: Value = server
        .get("/api/mailbox/search?from=b%40example.com")
        .authorization_bearer(&a)
        .await
        .json();
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["subject"], "Invoice April");

    // Filter by subject and keywords together
    let hits: Value = server
        .get("/api/mailbox/search?subject=invoice&keywords=due")
        .authorization_bearer(&a)
        .await
        .json();
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["subject"], "Invoice March");

    // Attachment filter matches nothing here
    let hits: Value = server
        .get("/api/mailbox/search?has_attachments=true")
        .authorization_bearer(&a)
        .await
        .json();
    assert!(hits.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_advanced_search_bad_date() {
    let (server, _, _) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let token = login(&server, "a@example.com", "correct-password").await;

    let response = server
        .get("/api/mailbox/search?from_date=yesterday")
        .authorization_bearer(&token)
        .await;
    assert_eq!(response.status_code(), 400);
}
