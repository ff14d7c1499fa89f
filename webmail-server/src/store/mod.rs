//! Storage abstractions for the server

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::{InMemoryAccountStore, InMemoryMailStore};
pub use models::*;
pub use sqlite::SqliteStore;

use crate::error::ApiError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, ApiError>;

/// Trait for account storage
pub trait AccountStore: Send + Sync {
    /// Create an account; fails with `DuplicateIdentity` if the phone or
    /// email is already registered
    fn create(&self, account: NewAccount) -> StoreResult<Account>;

    /// Get an account by id
    fn get(&self, id: AccountId) -> StoreResult<Option<Account>>;

    /// Get an account by phone number
    fn get_by_phone(&self, phone: &str) -> StoreResult<Option<Account>>;

    /// Get an account by email address
    fn get_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    /// Update profile fields
    fn update_profile(&self, id: AccountId, patch: AccountPatch) -> StoreResult<Option<Account>>;

    /// Replace the stored password hash
    fn update_password_hash(&self, id: AccountId, hash: &str) -> StoreResult<()>;

    /// Store a pending TOTP secret; overwrites any previous pending secret
    /// and leaves the enabled flag untouched
    fn set_pending_totp_secret(&self, id: AccountId, secret: &str) -> StoreResult<()>;

    /// Flip the enabled flag and replace the backup-code set wholesale
    fn enable_two_factor(&self, id: AccountId, codes: &[String]) -> StoreResult<()>;

    /// Clear the secret, the enabled flag and all backup codes
    fn disable_two_factor(&self, id: AccountId) -> StoreResult<()>;

    /// Atomically consume an unused backup code with an exact match;
    /// returns false when no such code exists
    fn consume_backup_code(&self, id: AccountId, code: &str) -> StoreResult<bool>;

    /// Delete an account; returns false when it did not exist
    fn delete(&self, id: AccountId) -> StoreResult<bool>;
}

/// Trait for mail storage
pub trait MailStore: Send + Sync {
    /// Persist a new mail
    fn create(&self, mail: NewMail) -> StoreResult<Mail>;

    /// Get a mail by id
    fn get(&self, id: MailId) -> StoreResult<Option<Mail>>;

    /// Apply a partial update, returning the updated mail
    fn update(&self, id: MailId, patch: MailPatch) -> StoreResult<Option<Mail>>;

    /// Delete a mail; returns false when it did not exist
    fn delete(&self, id: MailId) -> StoreResult<bool>;

    /// Inbox: participant, not trash, not spam, not draft; newest first
    fn inbox(&self, account: AccountId) -> StoreResult<Vec<Mail>>;

    /// Mails sent by the account, excluding drafts and trash; newest first
    fn sent(&self, account: AccountId) -> StoreResult<Vec<Mail>>;

    /// Drafts of the account; newest first
    fn drafts(&self, account: AccountId) -> StoreResult<Vec<Mail>>;

    /// Trashed mails sent by the account; newest first
    fn trash(&self, account: AccountId) -> StoreResult<Vec<Mail>>;

    /// Starred mails the account participates in, excluding trash;
    /// newest first
    fn starred(&self, account: AccountId) -> StoreResult<Vec<Mail>>;

    /// Mails classified as spam that the account participates in,
    /// excluding trash; newest first
    fn spam(&self, account: AccountId) -> StoreResult<Vec<Mail>>;

    /// Mails carrying the label, excluding trash; newest first
    fn by_label(&self, account: AccountId, label_id: &str) -> StoreResult<Vec<Mail>>;

    /// All mails in a conversation thread, oldest first
    fn thread(&self, root: MailId) -> StoreResult<Vec<Mail>>;

    /// Search the account's mailbox, excluding trash; newest first
    fn search(&self, account: AccountId, query: &MailQuery) -> StoreResult<Vec<Mail>>;
}
