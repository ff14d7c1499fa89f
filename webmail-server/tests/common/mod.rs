//! Common test utilities for server integration tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use axum_test::TestServer;
use serde_json::{json, Value};
use webmail_core::{totp, TokenSigner};
use webmail_server::{
    routes, AppState, InMemoryAccountStore, InMemoryMailStore, SpamClassifier, Verdict,
};

/// Mock classifier with a switchable verdict, capturing classified texts
#[derive(Default, Clone)]
pub struct MockClassifier {
    spam: Arc<AtomicBool>,
    /// Captured text blobs
    pub seen: Arc<RwLock<Vec<String>>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent classifications return spam
    pub fn set_spam(&self, spam: bool) {
        self.spam.store(spam, Ordering::SeqCst);
    }
}

impl SpamClassifier for MockClassifier {
    fn classify(&self, text: &str) -> Result<Verdict, String> {
        self.seen.write().unwrap().push(text.to_string());
        if self.spam.load(Ordering::SeqCst) {
            Ok(Verdict::Spam)
        } else {
            Ok(Verdict::Ham)
        }
    }
}

pub type TestState = Arc<AppState<InMemoryAccountStore, InMemoryMailStore, MockClassifier>>;

/// Create a test server over in-memory stores and a mock classifier
pub fn create_test_server() -> (TestServer, TestState, MockClassifier) {
    let classifier = MockClassifier::new();

    let state = Arc::new(AppState::new(
        TokenSigner::generate(),
        "Webmail".to_string(),
        InMemoryAccountStore::new(),
        InMemoryMailStore::new(),
        classifier.clone(),
    ));

    let app = routes::create_router(Arc::clone(&state));
    let server = TestServer::new(app).expect("Failed to create test server");

    (server, state, classifier)
}

/// Register an account and return its id
pub async fn register_account(server: &TestServer, phone: &str, email: &str, password: &str) -> u64 {
    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "phone": phone,
            "email": email,
            "password": password,
            "name": "Test User",
        }))
        .await;
    assert_eq!(response.status_code(), 201);

    let body: Value = response.json();
    body["id"].as_u64().expect("No account id in response")
}

/// Log in and return the full session token (2FA must be disabled)
pub async fn login(server: &TestServer, username: &str, password: &str) -> String {
    let response = server
        .post("/api/auth/login")
        .json(&json!({ "username": username, "password": password }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    body["token"]
        .as_str()
        .expect("No full token in login response")
        .to_string()
}

/// Log in against a 2FA-enabled account and return the pending token
pub async fn login_pending(server: &TestServer, username: &str, password: &str) -> String {
    let response = server
        .post("/api/auth/login")
        .json(&json!({ "username": username, "password": password }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["require_2fa"], true);
    assert!(body["token"].is_null());
    body["temp_token"]
        .as_str()
        .expect("No pending token in login response")
        .to_string()
}

/// Run the full 2FA enablement flow; returns the shared secret and the
/// plaintext backup codes
pub async fn enable_two_factor(server: &TestServer, token: &str) -> (String, Vec<String>) {
    let response = server
        .post("/api/auth/2fa/setup")
        .authorization_bearer(token)
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let secret = body["secret"].as_str().expect("No secret").to_string();

    let code = totp::generate_now(&secret).expect("Failed to generate code");
    let response = server
        .post("/api/auth/2fa/enable")
        .authorization_bearer(token)
        .json(&json!({ "code": code }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let backup_codes = body["backup_codes"]
        .as_array()
        .expect("No backup codes")
        .iter()
        .map(|c| c.as_str().unwrap().to_string())
        .collect();

    (secret, backup_codes)
}

/// Send a mail from an authenticated account
pub async fn send_mail(server: &TestServer, token: &str, to: &str, subject: &str, body: &str) -> Value {
    let response = server
        .post("/api/email")
        .authorization_bearer(token)
        .json(&json!({
            "to": [to],
            "subject": subject,
            "body": body,
        }))
        .await;
    assert_eq!(response.status_code(), 201);
    response.json()
}
