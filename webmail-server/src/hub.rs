//! Live notification hub
//!
//! Keeps the process-local registry of connected user sessions and pushes
//! delivery events to the matching connection. One registration per account:
//! a new connection supersedes the previous one, and a disconnect only
//! removes the registration when it still points at that same connection,
//! so a stale disconnect cannot clobber a newer registration.
//!
//! Delivery is best-effort. Events for accounts without a live connection
//! are dropped; the mail itself is durably stored and visible on the next
//! fetch. The registry is process-local: running multiple server processes
//! would need an external pub/sub layer, which is out of scope.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::store::{AccountId, MailId};

/// An event pushed to a connected client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// A non-draft mail was delivered to the account
    NewMail {
        id: MailId,
        sender: String,
        subject: String,
        preview: String,
        attachments_count: u32,
        timestamp: DateTime<Utc>,
    },
    /// A login attempt on the account is waiting for its second factor
    LoginRequest {
        email: String,
        timestamp: DateTime<Utc>,
    },
}

/// Identifier handed out on registration; required to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionId(Uuid);

struct Registration {
    conn_id: ConnectionId,
    sender: UnboundedSender<NotificationEvent>,
}

/// Registry of live connections, keyed by account id
///
/// Constructed empty once per process and injected through the app state;
/// dropping it tears down every registration.
pub struct NotificationHub {
    connections: Mutex<HashMap<AccountId, Registration>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Install a connection for the account, superseding any previous one.
    /// The superseded connection is not closed here; that is the transport
    /// layer's concern.
    pub fn register(
        &self,
        account: AccountId,
        sender: UnboundedSender<NotificationEvent>,
    ) -> ConnectionId {
        let conn_id = ConnectionId(Uuid::new_v4());
        let mut connections = self.connections.lock().unwrap();
        if connections
            .insert(account, Registration { conn_id, sender })
            .is_some()
        {
            tracing::debug!(account = account.0, "Superseded live connection");
        }
        conn_id
    }

    /// Remove the registration, but only if it still belongs to `conn_id`
    pub fn unregister(&self, account: AccountId, conn_id: ConnectionId) -> bool {
        let mut connections = self.connections.lock().unwrap();
        match connections.get(&account) {
            Some(current) if current.conn_id == conn_id => {
                connections.remove(&account);
                true
            }
            _ => false,
        }
    }

    /// Fire-and-forget push; silently dropped when no connection is
    /// registered or the connection is already closing
    pub fn publish(&self, account: AccountId, event: NotificationEvent) {
        let connections = self.connections.lock().unwrap();
        if let Some(registration) = connections.get(&account) {
            if registration.sender.send(event).is_err() {
                tracing::debug!(account = account.0, "Dropped event for closing connection");
            }
        }
    }

    /// Whether the account currently has a live connection
    pub fn is_connected(&self, account: AccountId) -> bool {
        self.connections.lock().unwrap().contains_key(&account)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn event() -> NotificationEvent {
        NotificationEvent::NewMail {
            id: MailId(1),
            sender: "a@example.com".to_string(),
            subject: "hi".to_string(),
            preview: "hello".to_string(),
            attachments_count: 0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_registered_connection() {
        let hub = NotificationHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register(AccountId(1), tx);

        hub.publish(AccountId(1), event());
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_publish_without_connection_is_dropped() {
        let hub = NotificationHub::new();
        // No registration; must not panic or block
        hub.publish(AccountId(1), event());
    }

    #[tokio::test]
    async fn test_new_connection_supersedes_old() {
        let hub = NotificationHub::new();
        let (old_tx, mut old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();

        hub.register(AccountId(1), old_tx);
        hub.register(AccountId(1), new_tx);

        hub.publish(AccountId(1), event());
        assert!(new_rx.recv().await.is_some());
        assert!(old_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_unregister_keeps_new_connection() {
        let hub = NotificationHub::new();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();

        let old_conn = hub.register(AccountId(1), old_tx);
        hub.register(AccountId(1), new_tx);

        // The old connection disconnects after being superseded
        assert!(!hub.unregister(AccountId(1), old_conn));
        assert!(hub.is_connected(AccountId(1)));

        hub.publish(AccountId(1), event());
        assert!(new_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_current_unregister_removes() {
        let hub = NotificationHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = hub.register(AccountId(1), tx);

        assert!(hub.unregister(AccountId(1), conn));
        assert!(!hub.is_connected(AccountId(1)));
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(event()).unwrap();
        assert_eq!(json["kind"], "new_mail");
        let login = NotificationEvent::LoginRequest {
            email: "a@example.com".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(login).unwrap();
        assert_eq!(json["kind"], "login_request");
    }
}
