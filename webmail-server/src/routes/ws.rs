//! Live connection endpoint
//!
//! Clients open a WebSocket at /api/ws presenting a full-auth session
//! token as a handshake credential. The connection is registered with the
//! notification hub and receives delivery events as JSON text frames until
//! it closes. The unregister on teardown carries the connection id handed
//! out at registration, so it cannot clobber a newer registration for the
//! same account.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use webmail_core::TokenVerifier;

use crate::classifier::SpamClassifier;
use crate::error::ApiError;
use crate::session;
use crate::state::AppState;
use crate::store::{AccountId, AccountStore, MailStore};

#[derive(Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Validate the handshake credential before the upgrade
fn authorize(token: Option<&str>, verifier: &TokenVerifier) -> Result<AccountId, ApiError> {
    let token = token.ok_or(ApiError::MissingToken)?;
    let claims = session::validate_token(token, verifier, true)?;
    Ok(AccountId(claims.sub))
}

/// GET /api/ws?token=...
pub async fn live_connection<U, M, C>(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState<U, M, C>>>,
) -> Result<Response, ApiError>
where
    U: AccountStore + 'static,
    M: MailStore + 'static,
    C: SpamClassifier + 'static,
{
    let account = authorize(params.token.as_deref(), &state.verifier)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, account)))
}

async fn handle_socket<U, M, C>(
    socket: WebSocket,
    state: Arc<AppState<U, M, C>>,
    account: AccountId,
) where
    U: AccountStore + 'static,
    M: MailStore + 'static,
    C: SpamClassifier + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn_id = state.hub.register(account, tx);
    tracing::debug!(account = account.0, "Live connection registered");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let Ok(payload) = serde_json::to_string(&event) else { continue };
                if sink.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Inbound frames carry nothing; the connection is push-only
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.unregister(account, conn_id);
    tracing::debug!(account = account.0, "Live connection closed");
}
