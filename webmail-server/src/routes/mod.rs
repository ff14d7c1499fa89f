//! HTTP routes for the webmail server

mod auth;
mod mail;
mod twofactor;
mod users;
mod ws;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::classifier::SpamClassifier;
use crate::state::AppState;
use crate::store::{AccountStore, MailStore};

/// Create the router with all routes
pub fn create_router<U, M, C>(state: Arc<AppState<U, M, C>>) -> Router
where
    U: AccountStore + 'static,
    M: MailStore + 'static,
    C: SpamClassifier + 'static,
{
    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/login/2fa", post(auth::complete_login))
        .route("/api/auth/profile", get(auth::profile))
        .route("/api/auth/password", post(auth::change_password))
        .route("/api/auth/recover", post(auth::recover_password))
        .route("/api/auth/2fa/setup", post(twofactor::setup))
        .route("/api/auth/2fa/enable", post(twofactor::enable))
        .route("/api/auth/2fa/disable", post(twofactor::disable))
        .route(
            "/api/users/:id",
            put(users::update_account).delete(users::delete_account),
        )
        // Folder views live under /api/mailbox so their static names
        // stay out of the /api/email/:id segment
        .route("/api/mailbox", get(mail::inbox))
        .route("/api/mailbox/search", get(mail::search))
        .route("/api/mailbox/sent", get(mail::sent))
        .route("/api/mailbox/drafts", get(mail::drafts))
        .route("/api/mailbox/trash", get(mail::trash))
        .route("/api/mailbox/starred", get(mail::starred))
        .route("/api/mailbox/spams", get(mail::spam))
        .route("/api/mailbox/labels/:label_id", get(mail::by_label))
        .route("/api/email", post(mail::create))
        .route(
            "/api/email/:id",
            get(mail::get_by_id)
                .put(mail::update)
                .patch(mail::update)
                .delete(mail::delete),
        )
        .route("/api/email/:id/star", post(mail::toggle_star))
        .route("/api/email/:id/read", post(mail::toggle_read))
        .route("/api/email/:id/trash", post(mail::move_to_trash))
        .route("/api/email/:id/restore", post(mail::restore))
        .route("/api/email/:id/labels", post(mail::toggle_label))
        .route(
            "/api/email/:id/labels/:label_id",
            delete(mail::remove_label),
        )
        .route("/api/ws", get(ws::live_connection))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
