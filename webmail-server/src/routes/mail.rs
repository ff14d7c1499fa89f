//! Mailbox endpoints
//!
//! All of them require a full-auth bearer token.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use webmail_core::Claims;

use crate::classifier::SpamClassifier;
use crate::error::ApiError;
use crate::mail::{self, ComposeMail};
use crate::session;
use crate::state::AppState;
use crate::store::{
    Account, AccountId, AccountStore, Label, Mail, MailId, MailPatch, MailQuery, MailStore,
};

use super::auth::SuccessResponse;

fn current_account<U, M, C>(
    state: &AppState<U, M, C>,
    headers: &HeaderMap,
) -> Result<Account, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let claims: Claims = session::authenticate(headers, &state.verifier, true)?;
    state
        .account_store
        .get(AccountId(claims.sub))?
        .ok_or(ApiError::AccountNotFound)
}

/// POST /api/email
pub async fn create<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
    Json(compose): Json<ComposeMail>,
) -> Result<(StatusCode, Json<Mail>), ApiError>
where
    U: AccountStore + 'static,
    M: MailStore + 'static,
    C: SpamClassifier + 'static,
{
    let account = current_account(&state, &headers)?;
    let mail = mail::send_mail(&state, &account, compose).await?;
    Ok((StatusCode::CREATED, Json(mail)))
}

/// GET /api/mailbox
pub async fn inbox<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Mail>>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let account = current_account(&state, &headers)?;
    Ok(Json(state.mail_store.inbox(account.id)?))
}

/// GET /api/mailbox/sent
pub async fn sent<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Mail>>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let account = current_account(&state, &headers)?;
    Ok(Json(state.mail_store.sent(account.id)?))
}

/// GET /api/mailbox/drafts
pub async fn drafts<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Mail>>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let account = current_account(&state, &headers)?;
    Ok(Json(state.mail_store.drafts(account.id)?))
}

/// GET /api/mailbox/trash
pub async fn trash<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Mail>>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let account = current_account(&state, &headers)?;
    Ok(Json(state.mail_store.trash(account.id)?))
}

/// GET /api/mailbox/starred
pub async fn starred<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Mail>>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let account = current_account(&state, &headers)?;
    Ok(Json(state.mail_store.starred(account.id)?))
}

/// GET /api/mailbox/spams
pub async fn spam<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Mail>>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let account = current_account(&state, &headers)?;
    Ok(Json(state.mail_store.spam(account.id)?))
}

/// GET /api/mailbox/labels/:label_id
pub async fn by_label<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Path(label_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<Mail>>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let account = current_account(&state, &headers)?;
    Ok(Json(state.mail_store.by_label(account.id, &label_id)?))
}

#[derive(Serialize)]
pub struct MailWithThreadResponse {
    pub mail: Mail,
    pub thread: Vec<Mail>,
}

/// GET /api/email/:id
pub async fn get_by_id<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<MailWithThreadResponse>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    current_account(&state, &headers)?;
    let found = mail::get_with_thread(&state.mail_store, MailId(id))?;
    Ok(Json(MailWithThreadResponse {
        mail: found.mail,
        thread: found.thread,
    }))
}

#[derive(Deserialize)]
pub struct UpdateMailRequest {
    pub subject: Option<String>,
    pub body: Option<String>,
    pub to: Option<Vec<String>>,
    pub cc: Option<Vec<String>>,
    pub bcc: Option<Vec<String>>,
    pub starred: Option<bool>,
    pub is_read: Option<bool>,
    pub is_draft: Option<bool>,
}

/// PUT/PATCH /api/email/:id
pub async fn update<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(req): Json<UpdateMailRequest>,
) -> Result<Json<Mail>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    current_account(&state, &headers)?;

    let patch = MailPatch {
        subject: req.subject,
        body: req.body,
        to: req.to,
        cc: req.cc,
        bcc: req.bcc,
        starred: req.starred,
        is_read: req.is_read,
        is_draft: req.is_draft,
        ..Default::default()
    };

    let mail = state
        .mail_store
        .update(MailId(id), patch)?
        .ok_or(ApiError::MailNotFound)?;
    Ok(Json(mail))
}

/// DELETE /api/email/:id
pub async fn delete<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    current_account(&state, &headers)?;
    if !state.mail_store.delete(MailId(id))? {
        return Err(ApiError::MailNotFound);
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/email/:id/star
pub async fn toggle_star<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Mail>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    current_account(&state, &headers)?;
    let mail = state
        .mail_store
        .get(MailId(id))?
        .ok_or(ApiError::MailNotFound)?;

    let updated = state
        .mail_store
        .update(
            mail.id,
            MailPatch {
                starred: Some(!mail.starred),
                ..Default::default()
            },
        )?
        .ok_or(ApiError::MailNotFound)?;
    Ok(Json(updated))
}

/// POST /api/email/:id/read
pub async fn toggle_read<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Mail>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    current_account(&state, &headers)?;
    let mail = state
        .mail_store
        .get(MailId(id))?
        .ok_or(ApiError::MailNotFound)?;

    let updated = state
        .mail_store
        .update(
            mail.id,
            MailPatch {
                is_read: Some(!mail.is_read),
                ..Default::default()
            },
        )?
        .ok_or(ApiError::MailNotFound)?;
    Ok(Json(updated))
}

/// POST /api/email/:id/trash
pub async fn move_to_trash<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Mail>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    current_account(&state, &headers)?;

    // Trashing also clears the star
    let mail = state
        .mail_store
        .update(
            MailId(id),
            MailPatch {
                is_in_trash: Some(true),
                starred: Some(false),
                ..Default::default()
            },
        )?
        .ok_or(ApiError::MailNotFound)?;
    Ok(Json(mail))
}

/// POST /api/email/:id/restore
pub async fn restore<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Mail>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    current_account(&state, &headers)?;
    let mail = state
        .mail_store
        .update(
            MailId(id),
            MailPatch {
                is_in_trash: Some(false),
                ..Default::default()
            },
        )?
        .ok_or(ApiError::MailNotFound)?;
    Ok(Json(mail))
}

#[derive(Deserialize)]
pub struct ToggleLabelRequest {
    pub label: Label,
}

/// POST /api/email/:id/labels
///
/// Adds the label, or removes it when the mail already carries it.
pub async fn toggle_label<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(req): Json<ToggleLabelRequest>,
) -> Result<Json<Mail>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    current_account(&state, &headers)?;
    let mail = state
        .mail_store
        .get(MailId(id))?
        .ok_or(ApiError::MailNotFound)?;

    let mut labels = mail.labels.clone();
    if labels.iter().any(|l| l.id == req.label.id) {
        labels.retain(|l| l.id != req.label.id);
    } else {
        labels.push(req.label);
    }

    let updated = state
        .mail_store
        .update(
            mail.id,
            MailPatch {
                labels: Some(labels),
                ..Default::default()
            },
        )?
        .ok_or(ApiError::MailNotFound)?;
    Ok(Json(updated))
}

/// DELETE /api/email/:id/labels/:label_id
pub async fn remove_label<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Path((id, label_id)): Path<(u64, String)>,
    headers: HeaderMap,
) -> Result<Json<Mail>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    current_account(&state, &headers)?;
    let mail = state
        .mail_store
        .get(MailId(id))?
        .ok_or(ApiError::MailNotFound)?;

    let labels: Vec<Label> = mail
        .labels
        .iter()
        .filter(|l| l.id != label_id)
        .cloned()
        .collect();

    let updated = state
        .mail_store
        .update(
            mail.id,
            MailPatch {
                labels: Some(labels),
                ..Default::default()
            },
        )?
        .ok_or(ApiError::MailNotFound)?;
    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct SearchParams {
    /// Free-text search; when present the field filters are ignored
    pub query: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    #[serde(default)]
    pub has_attachments: bool,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| ApiError::Validation(format!("Invalid date: {}", raw)))
}

/// GET /api/mailbox/search
pub async fn search<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Result<Json<Vec<Mail>>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let account = current_account(&state, &headers)?;

    let query = if let Some(text) = params.query {
        MailQuery {
            text: Some(text),
            ..Default::default()
        }
    } else {
        MailQuery {
            text: None,
            from: params.from,
            to: params.to,
            subject: params.subject,
            keywords: params.keywords,
            has_attachments: params.has_attachments,
            from_date: params.from_date.as_deref().map(parse_date).transpose()?,
            to_date: params.to_date.as_deref().map(parse_date).transpose()?,
        }
    };

    Ok(Json(state.mail_store.search(account.id, &query)?))
}
