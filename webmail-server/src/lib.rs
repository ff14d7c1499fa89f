//! Webmail Server
//!
//! An in-app mailbox backend: accounts with TOTP two-factor authentication,
//! purpose-scoped bearer session tokens, mailbox CRUD with labels, star,
//! trash and spam classification, and best-effort live delivery
//! notifications over WebSocket.

pub mod classifier;
pub mod config;
pub mod crypto;
pub mod error;
pub mod hub;
pub mod mail;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod twofactor;

pub use classifier::{HttpClassifier, NullClassifier, SpamClassifier, Verdict};
pub use config::{load_or_generate_signing_key, Config};
pub use error::ApiError;
pub use hub::{NotificationEvent, NotificationHub};
pub use state::AppState;
pub use store::{
    AccountStore, InMemoryAccountStore, InMemoryMailStore, MailStore, SqliteStore,
};
