//! Mail service
//!
//! Composing a mail resolves its recipients to account ids, runs the spam
//! classifier over the text, persists the record and pushes a delivery
//! event to every resolved receiver with a live connection. Drafts stop
//! after persistence.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::classifier::{classify_fail_open, SpamClassifier, Verdict};
use crate::error::ApiError;
use crate::hub::NotificationEvent;
use crate::state::AppState;
use crate::store::{Account, AccountId, AccountStore, Mail, MailId, MailStore, NewMail};

/// Preview length pushed in new-mail events
const PREVIEW_LEN: usize = 120;

/// A mail as submitted by a client
#[derive(Debug, Deserialize)]
pub struct ComposeMail {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Attachment names; only the count is kept on the record
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub original_mail_id: Option<MailId>,
    #[serde(default)]
    pub is_draft: bool,
}

/// Resolve addresses to account ids, dropping unknown ones
fn resolve_addresses<U: AccountStore>(
    store: &U,
    addresses: &[String],
) -> Result<Vec<AccountId>, ApiError> {
    let mut resolved = Vec::new();
    for address in addresses {
        if let Some(account) = store.get_by_email(address)? {
            resolved.push(account.id);
        }
    }
    Ok(resolved)
}

/// Persist a composed mail and notify its receivers
pub async fn send_mail<U, M, C>(
    state: &Arc<AppState<U, M, C>>,
    sender: &Account,
    compose: ComposeMail,
) -> Result<Mail, ApiError>
where
    U: AccountStore + 'static,
    M: MailStore + 'static,
    C: SpamClassifier + 'static,
{
    let mut receiver_ids = resolve_addresses(&state.account_store, &compose.to)?;
    receiver_ids.extend(resolve_addresses(&state.account_store, &compose.cc)?);
    receiver_ids.extend(resolve_addresses(&state.account_store, &compose.bcc)?);
    let receiver_ids = dedup_preserving_order(receiver_ids);

    let is_spam = if compose.is_draft {
        false
    } else {
        let text = format!("{}\n{}", compose.subject, compose.body);
        classify_fail_open(state, text).await == Verdict::Spam
    };

    let mail = state.mail_store.create(NewMail {
        sender_id: sender.id,
        sender: sender.email.clone(),
        to: compose.to,
        cc: compose.cc,
        bcc: compose.bcc,
        receiver_ids,
        subject: compose.subject,
        body: compose.body,
        attachments_count: compose.attachments.len() as u32,
        original_mail_id: compose.original_mail_id,
        is_draft: compose.is_draft,
        is_spam,
    })?;

    if mail.is_draft {
        return Ok(mail);
    }

    for receiver in &mail.receiver_ids {
        state.hub.publish(
            *receiver,
            NotificationEvent::NewMail {
                id: mail.id,
                sender: mail.sender.clone(),
                subject: mail.subject.clone(),
                preview: preview(&mail.body),
                attachments_count: mail.attachments_count,
                timestamp: Utc::now(),
            },
        );
    }

    Ok(mail)
}

/// A mail together with its conversation thread
pub struct MailWithThread {
    pub mail: Mail,
    pub thread: Vec<Mail>,
}

/// Fetch a mail and the thread it belongs to, oldest first
pub fn get_with_thread<M: MailStore>(store: &M, id: MailId) -> Result<MailWithThread, ApiError> {
    let mail = store.get(id)?.ok_or(ApiError::MailNotFound)?;
    let root = mail.original_mail_id.unwrap_or(mail.id);
    let thread = store.thread(root)?;
    Ok(MailWithThread { mail, thread })
}

fn dedup_preserving_order(ids: Vec<AccountId>) -> Vec<AccountId> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

fn preview(body: &str) -> String {
    body.chars().take(PREVIEW_LEN).collect()
}
