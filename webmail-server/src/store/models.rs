//! Data models for server storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

/// Unique mail identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailId(pub u64);

/// A single-use recovery credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupCode {
    pub code: String,
    pub used: bool,
}

/// A user account
///
/// The password hash, TOTP secret and backup codes never leave the store
/// layer in API responses; handlers serialize [`AccountProfile`] instead.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub phone: String,
    pub email: String,
    pub name: String,
    pub birth_date: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
    pub password_hash: String,
    /// Shared TOTP secret; set during setup, kept while 2FA is enabled
    pub totp_secret: Option<String>,
    pub two_factor_enabled: bool,
    pub backup_codes: Vec<BackupCode>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// The serializable, credential-free view of this account
    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.id,
            phone: self.phone.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            birth_date: self.birth_date,
            avatar_url: self.avatar_url.clone(),
            two_factor_enabled: self.two_factor_enabled,
            created_at: self.created_at,
        }
    }
}

/// Account view safe to return to clients
#[derive(Debug, Clone, Serialize)]
pub struct AccountProfile {
    pub id: AccountId,
    pub phone: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub two_factor_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub phone: String,
    pub email: String,
    pub name: String,
    pub birth_date: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
    pub password_hash: String,
}

/// Profile fields a client may update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
}

/// A label attached to a mail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub label: String,
    #[serde(default = "default_label_color")]
    pub color: String,
}

fn default_label_color() -> String {
    "#000000".to_string()
}

/// A mail message
#[derive(Debug, Clone, Serialize)]
pub struct Mail {
    pub id: MailId,
    pub sender_id: AccountId,
    /// Sender address as displayed to receivers
    pub sender: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    /// Accounts resolved from to/cc/bcc at send time
    pub receiver_ids: Vec<AccountId>,
    pub subject: String,
    pub body: String,
    pub attachments_count: u32,
    pub labels: Vec<Label>,
    /// Root of the conversation thread, if this is a reply or forward
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_mail_id: Option<MailId>,
    pub starred: bool,
    pub is_read: bool,
    pub is_draft: bool,
    pub is_in_trash: bool,
    pub is_spam: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a mail, with receivers already resolved
#[derive(Debug, Clone)]
pub struct NewMail {
    pub sender_id: AccountId,
    pub sender: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub receiver_ids: Vec<AccountId>,
    pub subject: String,
    pub body: String,
    pub attachments_count: u32,
    pub original_mail_id: Option<MailId>,
    pub is_draft: bool,
    pub is_spam: bool,
}

/// Partial update applied to a stored mail
#[derive(Debug, Clone, Default)]
pub struct MailPatch {
    pub subject: Option<String>,
    pub body: Option<String>,
    pub to: Option<Vec<String>>,
    pub cc: Option<Vec<String>>,
    pub bcc: Option<Vec<String>>,
    pub receiver_ids: Option<Vec<AccountId>>,
    pub labels: Option<Vec<Label>>,
    pub starred: Option<bool>,
    pub is_read: Option<bool>,
    pub is_draft: Option<bool>,
    pub is_in_trash: Option<bool>,
    pub is_spam: Option<bool>,
}

impl Mail {
    /// Whether the account sent or received this mail
    pub fn participant(&self, account: AccountId) -> bool {
        self.sender_id == account || self.receiver_ids.contains(&account)
    }

    /// Whether this mail matches a search query
    pub fn matches(&self, query: &MailQuery) -> bool {
        if let Some(text) = &query.text {
            let hit = contains_ci(&self.sender, text)
                || self.to.iter().any(|t| contains_ci(t, text))
                || contains_ci(&self.subject, text)
                || contains_ci(&self.body, text);
            if !hit {
                return false;
            }
        }
        if let Some(from) = &query.from {
            if !contains_ci(&self.sender, from) {
                return false;
            }
        }
        if let Some(to) = &query.to {
            if !self.to.iter().any(|t| contains_ci(t, to)) {
                return false;
            }
        }
        if let Some(subject) = &query.subject {
            if !contains_ci(&self.subject, subject) {
                return false;
            }
        }
        if let Some(keywords) = &query.keywords {
            if !contains_ci(&self.body, keywords) {
                return false;
            }
        }
        if query.has_attachments && self.attachments_count == 0 {
            return false;
        }
        if let Some(from_date) = query.from_date {
            if self.created_at < from_date {
                return false;
            }
        }
        if let Some(to_date) = query.to_date {
            if self.created_at > to_date {
                return false;
            }
        }
        true
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Filters for mailbox search
#[derive(Debug, Clone, Default)]
pub struct MailQuery {
    /// Free-text needle matched against sender, recipients, subject and body
    pub text: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub has_attachments: bool,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}
