//! Tests for live delivery notifications and spam classification

mod common;

use common::{create_test_server, enable_two_factor, login, register_account, send_mail};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use webmail_server::store::AccountId;
use webmail_server::NotificationEvent;

#[tokio::test]
async fn test_new_mail_event_reaches_receiver() {
    let (server, state, _) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let receiver_id = register_account(&server, "555-0101", "b@example.com", "correct-password").await;
    let sender = login(&server, "a@example.com", "correct-password").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.hub.register(AccountId(receiver_id), tx);

    send_mail(&server, &sender, "b@example.com", "Ping", "are you there?").await;

    match rx.recv().await.expect("No event delivered") {
        NotificationEvent::NewMail {
            sender, subject, ..
        } => {
            assert_eq!(sender, "a@example.com");
            assert_eq!(subject, "Ping");
        }
        other => panic!("Unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_draft_produces_no_event() {
    let (server, state, _) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let receiver_id = register_account(&server, "555-0101", "b@example.com", "correct-password").await;
    let sender = login(&server, "a@example.com", "correct-password").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.hub.register(AccountId(receiver_id), tx);

    let response = server
        .post("/api/email")
        .authorization_bearer(&sender)
        .json(&json!({
            "to": ["b@example.com"],
            "subject": "Draft",
            "body": "...",
            "is_draft": true,
        }))
        .await;
    assert_eq!(response.status_code(), 201);

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_event_goes_to_newest_registration_only() {
    let (server, state, _) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let receiver_id = register_account(&server, "555-0101", "b@example.com", "correct-password").await;
    let sender = login(&server, "a@example.com", "correct-password").await;

    let (old_tx, mut old_rx) = mpsc::unbounded_channel();
    let (new_tx, mut new_rx) = mpsc::unbounded_channel();
    let old_conn = state.hub.register(AccountId(receiver_id), old_tx);
    state.hub.register(AccountId(receiver_id), new_tx);

    // A stale disconnect of the superseded connection must not unregister
    // the newer one
    state.hub.unregister(AccountId(receiver_id), old_conn);

    send_mail(&server, &sender, "b@example.com", "Ping", "body").await;

    assert!(new_rx.recv().await.is_some());
    assert!(old_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_send_without_connection_still_succeeds() {
    let (server, _, _) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    register_account(&server, "555-0101", "b@example.com", "correct-password").await;
    let sender = login(&server, "a@example.com", "correct-password").await;
    let receiver = login(&server, "b@example.com", "correct-password").await;

    // Nobody is listening; the event is dropped, the mail is stored
    send_mail(&server, &sender, "b@example.com", "Ping", "body").await;

    let inbox: Value = server
        .get("/api/mailbox")
        .authorization_bearer(&receiver)
        .await
        .json();
    assert_eq!(inbox.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_spam_classified_mail_lands_in_spam_folder() {
    let (server, _, classifier) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    register_account(&server, "555-0101", "b@example.com", "correct-password").await;
    let sender = login(&server, "a@example.com", "correct-password").await;
    let receiver = login(&server, "b@example.com", "correct-password").await;

    classifier.set_spam(true);
    let mail = send_mail(&server, &sender, "b@example.com", "WIN BIG", "click here").await;
    assert_eq!(mail["is_spam"], true);

    // The classifier saw subject and body
    let seen = classifier.seen.read().unwrap().clone();
    assert!(seen.iter().any(|t| t.contains("WIN BIG") && t.contains("click here")));

    let inbox: Value = server
        .get("/api/mailbox")
        .authorization_bearer(&receiver)
        .await
        .json();
    assert!(inbox.as_array().unwrap().is_empty());

    let spam: Value = server
        .get("/api/mailbox/spams")
        .authorization_bearer(&receiver)
        .await
        .json();
    assert_eq!(spam.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_drafts_skip_classification() {
    let (server, _, classifier) = create_test_server();
    register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let sender = login(&server, "a@example.com", "correct-password").await;

    classifier.set_spam(true);
    let response = server
        .post("/api/email")
        .authorization_bearer(&sender)
        .json(&json!({
            "to": [],
            "subject": "Draft",
            "body": "...",
            "is_draft": true,
        }))
        .await;
    let mail: Value = response.json();
    assert_eq!(mail["is_spam"], false);
    assert!(classifier.seen.read().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_request_event_on_pending_login() {
    let (server, state, _) = create_test_server();
    let account_id = register_account(&server, "555-0100", "a@example.com", "correct-password").await;
    let token = login(&server, "a@example.com", "correct-password").await;
    enable_two_factor(&server, &token).await;

    // An already connected session gets notified about the pending login
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.hub.register(AccountId(account_id), tx);

    let response = server
        .post("/api/auth/login")
        .json(&json!({ "username": "a@example.com", "password": "correct-password" }))
        .await;
    assert_eq!(response.status_code(), 200);

    match rx.recv().await.expect("No event delivered") {
        NotificationEvent::LoginRequest { email, .. } => {
            assert_eq!(email, "a@example.com");
        }
        other => panic!("Unexpected event: {:?}", other),
    }
}
