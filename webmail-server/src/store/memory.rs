//! In-memory storage implementations

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::Utc;

use super::{
    Account, AccountId, AccountPatch, AccountStore, BackupCode, Mail, MailId, MailPatch,
    MailQuery, MailStore, NewAccount, NewMail, StoreResult,
};
use crate::error::ApiError;

/// In-memory account store
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
    next_id: AtomicU64,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn create(&self, account: NewAccount) -> StoreResult<Account> {
        let mut accounts = self.accounts.write().unwrap();
        let email = account.email.to_lowercase();

        if accounts
            .values()
            .any(|a| a.phone == account.phone || a.email == email)
        {
            return Err(ApiError::DuplicateIdentity);
        }

        let id = AccountId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let account = Account {
            id,
            phone: account.phone,
            email,
            name: account.name,
            birth_date: account.birth_date,
            avatar_url: account.avatar_url,
            password_hash: account.password_hash,
            totp_secret: None,
            two_factor_enabled: false,
            backup_codes: Vec::new(),
            created_at: Utc::now(),
        };
        accounts.insert(id, account.clone());
        Ok(account)
    }

    fn get(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().unwrap().get(&id).cloned())
    }

    fn get_by_phone(&self, phone: &str) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.values().find(|a| a.phone == phone).cloned())
    }

    fn get_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let normalized = email.to_lowercase();
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.values().find(|a| a.email == normalized).cloned())
    }

    fn update_profile(&self, id: AccountId, patch: AccountPatch) -> StoreResult<Option<Account>> {
        let mut accounts = self.accounts.write().unwrap();
        let Some(account) = accounts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            account.name = name;
        }
        if let Some(birth_date) = patch.birth_date {
            account.birth_date = Some(birth_date);
        }
        if let Some(avatar_url) = patch.avatar_url {
            account.avatar_url = Some(avatar_url);
        }
        Ok(Some(account.clone()))
    }

    fn update_password_hash(&self, id: AccountId, hash: &str) -> StoreResult<()> {
        let mut accounts = self.accounts.write().unwrap();
        match accounts.get_mut(&id) {
            Some(account) => {
                account.password_hash = hash.to_string();
                Ok(())
            }
            None => Err(ApiError::AccountNotFound),
        }
    }

    fn set_pending_totp_secret(&self, id: AccountId, secret: &str) -> StoreResult<()> {
        let mut accounts = self.accounts.write().unwrap();
        match accounts.get_mut(&id) {
            Some(account) => {
                account.totp_secret = Some(secret.to_string());
                Ok(())
            }
            None => Err(ApiError::AccountNotFound),
        }
    }

    fn enable_two_factor(&self, id: AccountId, codes: &[String]) -> StoreResult<()> {
        let mut accounts = self.accounts.write().unwrap();
        match accounts.get_mut(&id) {
            Some(account) => {
                account.two_factor_enabled = true;
                account.backup_codes = codes
                    .iter()
                    .map(|code| BackupCode {
                        code: code.clone(),
                        used: false,
                    })
                    .collect();
                Ok(())
            }
            None => Err(ApiError::AccountNotFound),
        }
    }

    fn disable_two_factor(&self, id: AccountId) -> StoreResult<()> {
        let mut accounts = self.accounts.write().unwrap();
        match accounts.get_mut(&id) {
            Some(account) => {
                account.totp_secret = None;
                account.two_factor_enabled = false;
                account.backup_codes.clear();
                Ok(())
            }
            None => Err(ApiError::AccountNotFound),
        }
    }

    fn consume_backup_code(&self, id: AccountId, code: &str) -> StoreResult<bool> {
        let mut accounts = self.accounts.write().unwrap();
        let Some(account) = accounts.get_mut(&id) else {
            return Err(ApiError::AccountNotFound);
        };
        match account
            .backup_codes
            .iter_mut()
            .find(|c| !c.used && c.code == code)
        {
            Some(entry) => {
                entry.used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, id: AccountId) -> StoreResult<bool> {
        Ok(self.accounts.write().unwrap().remove(&id).is_some())
    }
}

/// In-memory mail store
pub struct InMemoryMailStore {
    mails: RwLock<HashMap<MailId, Mail>>,
    next_id: AtomicU64,
}

impl InMemoryMailStore {
    pub fn new() -> Self {
        Self {
            mails: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Collect mails matching the filter, newest first
    fn collect<F>(&self, filter: F) -> Vec<Mail>
    where
        F: Fn(&Mail) -> bool,
    {
        let mails = self.mails.read().unwrap();
        let mut matched: Vec<Mail> = mails.values().filter(|m| filter(m)).cloned().collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        matched
    }
}

impl Default for InMemoryMailStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MailStore for InMemoryMailStore {
    fn create(&self, mail: NewMail) -> StoreResult<Mail> {
        let id = MailId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mail = Mail {
            id,
            sender_id: mail.sender_id,
            sender: mail.sender,
            to: mail.to,
            cc: mail.cc,
            bcc: mail.bcc,
            receiver_ids: mail.receiver_ids,
            subject: mail.subject,
            body: mail.body,
            attachments_count: mail.attachments_count,
            labels: Vec::new(),
            original_mail_id: mail.original_mail_id,
            starred: false,
            is_read: false,
            is_draft: mail.is_draft,
            is_in_trash: false,
            is_spam: mail.is_spam,
            created_at: Utc::now(),
        };
        self.mails.write().unwrap().insert(id, mail.clone());
        Ok(mail)
    }

    fn get(&self, id: MailId) -> StoreResult<Option<Mail>> {
        Ok(self.mails.read().unwrap().get(&id).cloned())
    }

    fn update(&self, id: MailId, patch: MailPatch) -> StoreResult<Option<Mail>> {
        let mut mails = self.mails.write().unwrap();
        let Some(mail) = mails.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(subject) = patch.subject {
            mail.subject = subject;
        }
        if let Some(body) = patch.body {
            mail.body = body;
        }
        if let Some(to) = patch.to {
            mail.to = to;
        }
        if let Some(cc) = patch.cc {
            mail.cc = cc;
        }
        if let Some(bcc) = patch.bcc {
            mail.bcc = bcc;
        }
        if let Some(receiver_ids) = patch.receiver_ids {
            mail.receiver_ids = receiver_ids;
        }
        if let Some(labels) = patch.labels {
            mail.labels = labels;
        }
        if let Some(starred) = patch.starred {
            mail.starred = starred;
        }
        if let Some(is_read) = patch.is_read {
            mail.is_read = is_read;
        }
        if let Some(is_draft) = patch.is_draft {
            mail.is_draft = is_draft;
        }
        if let Some(is_in_trash) = patch.is_in_trash {
            mail.is_in_trash = is_in_trash;
        }
        if let Some(is_spam) = patch.is_spam {
            mail.is_spam = is_spam;
        }
        Ok(Some(mail.clone()))
    }

    fn delete(&self, id: MailId) -> StoreResult<bool> {
        Ok(self.mails.write().unwrap().remove(&id).is_some())
    }

    fn inbox(&self, account: AccountId) -> StoreResult<Vec<Mail>> {
        Ok(self.collect(|m| {
            m.participant(account) && !m.is_in_trash && !m.is_spam && !m.is_draft
        }))
    }

    fn sent(&self, account: AccountId) -> StoreResult<Vec<Mail>> {
        Ok(self.collect(|m| m.sender_id == account && !m.is_draft && !m.is_in_trash))
    }

    fn drafts(&self, account: AccountId) -> StoreResult<Vec<Mail>> {
        Ok(self.collect(|m| m.sender_id == account && m.is_draft))
    }

    fn trash(&self, account: AccountId) -> StoreResult<Vec<Mail>> {
        Ok(self.collect(|m| m.sender_id == account && m.is_in_trash))
    }

    fn starred(&self, account: AccountId) -> StoreResult<Vec<Mail>> {
        Ok(self.collect(|m| m.participant(account) && m.starred && !m.is_in_trash))
    }

    fn spam(&self, account: AccountId) -> StoreResult<Vec<Mail>> {
        Ok(self.collect(|m| m.participant(account) && m.is_spam && !m.is_in_trash))
    }

    fn by_label(&self, account: AccountId, label_id: &str) -> StoreResult<Vec<Mail>> {
        Ok(self.collect(|m| {
            m.participant(account)
                && !m.is_in_trash
                && m.labels.iter().any(|l| l.id == label_id)
        }))
    }

    fn thread(&self, root: MailId) -> StoreResult<Vec<Mail>> {
        let mails = self.mails.read().unwrap();
        let mut matched: Vec<Mail> = mails
            .values()
            .filter(|m| m.id == root || m.original_mail_id == Some(root))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.0.cmp(&b.id.0)));
        Ok(matched)
    }

    fn search(&self, account: AccountId, query: &MailQuery) -> StoreResult<Vec<Mail>> {
        Ok(self.collect(|m| {
            m.participant(account) && !m.is_in_trash && m.matches(query)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_mail(sender: AccountId, receivers: Vec<AccountId>) -> NewMail {
        NewMail {
            sender_id: sender,
            sender: "sender@example.com".to_string(),
            to: vec!["receiver@example.com".to_string()],
            cc: Vec::new(),
            bcc: Vec::new(),
            receiver_ids: receivers,
            subject: "hello".to_string(),
            body: "body".to_string(),
            attachments_count: 0,
            original_mail_id: None,
            is_draft: false,
            is_spam: false,
        }
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let store = InMemoryAccountStore::new();
        store
            .create(NewAccount {
                phone: "555-0100".to_string(),
                email: "a@example.com".to_string(),
                name: "A".to_string(),
                birth_date: None,
                avatar_url: None,
                password_hash: "hash".to_string(),
            })
            .unwrap();

        let dup_phone = store.create(NewAccount {
            phone: "555-0100".to_string(),
            email: "b@example.com".to_string(),
            name: "B".to_string(),
            birth_date: None,
            avatar_url: None,
            password_hash: "hash".to_string(),
        });
        assert!(matches!(dup_phone, Err(ApiError::DuplicateIdentity)));

        let dup_email = store.create(NewAccount {
            phone: "555-0101".to_string(),
            email: "A@EXAMPLE.COM".to_string(),
            name: "B".to_string(),
            birth_date: None,
            avatar_url: None,
            password_hash: "hash".to_string(),
        });
        assert!(matches!(dup_email, Err(ApiError::DuplicateIdentity)));
    }

    #[test]
    fn test_backup_code_consumed_once() {
        let store = InMemoryAccountStore::new();
        let account = store
            .create(NewAccount {
                phone: "555-0100".to_string(),
                email: "a@example.com".to_string(),
                name: "A".to_string(),
                birth_date: None,
                avatar_url: None,
                password_hash: "hash".to_string(),
            })
            .unwrap();
        store
            .enable_two_factor(account.id, &["AB12CD".to_string()])
            .unwrap();

        assert!(store.consume_backup_code(account.id, "AB12CD").unwrap());
        assert!(!store.consume_backup_code(account.id, "AB12CD").unwrap());
    }

    #[test]
    fn test_enable_replaces_backup_codes() {
        let store = InMemoryAccountStore::new();
        let account = store
            .create(NewAccount {
                phone: "555-0100".to_string(),
                email: "a@example.com".to_string(),
                name: "A".to_string(),
                birth_date: None,
                avatar_url: None,
                password_hash: "hash".to_string(),
            })
            .unwrap();

        store
            .enable_two_factor(account.id, &["OLD111".to_string()])
            .unwrap();
        store
            .enable_two_factor(account.id, &["NEW222".to_string()])
            .unwrap();

        let stored = store.get(account.id).unwrap().unwrap();
        assert_eq!(stored.backup_codes.len(), 1);
        assert_eq!(stored.backup_codes[0].code, "NEW222");
        assert!(!store.consume_backup_code(account.id, "OLD111").unwrap());
    }

    #[test]
    fn test_inbox_excludes_trash_spam_drafts() {
        let store = InMemoryMailStore::new();
        let me = AccountId(1);

        let plain = store.create(new_mail(AccountId(2), vec![me])).unwrap();
        let mut spam = new_mail(AccountId(2), vec![me]);
        spam.is_spam = true;
        store.create(spam).unwrap();
        let trashed = store.create(new_mail(AccountId(2), vec![me])).unwrap();
        store
            .update(
                trashed.id,
                MailPatch {
                    is_in_trash: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        let inbox = store.inbox(me).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, plain.id);
    }

    #[test]
    fn test_thread_is_chronological() {
        let store = InMemoryMailStore::new();
        let root = store.create(new_mail(AccountId(1), vec![])).unwrap();
        let mut reply = new_mail(AccountId(2), vec![]);
        reply.original_mail_id = Some(root.id);
        let reply = store.create(reply).unwrap();

        let thread = store.thread(root.id).unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].id, root.id);
        assert_eq!(thread[1].id, reply.id);
    }
}
