//! SQLite-based storage implementation

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{
    Account, AccountId, AccountPatch, AccountStore, BackupCode, Mail, MailId, MailPatch,
    MailQuery, MailStore, NewAccount, NewMail, StoreResult,
};
use crate::error::ApiError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite-based store implementing both AccountStore and MailStore
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    ApiError::Internal(e.to_string())
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, ApiError> {
        let conn = Connection::open(path).map_err(internal)?;
        Self::init(conn)
    }

    /// Open a private in-memory database (used by tests)
    pub fn open_in_memory() -> Result<Self, ApiError> {
        let conn = Connection::open_in_memory().map_err(internal)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, ApiError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(internal)?;

        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), ApiError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(internal)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, ApiError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(internal)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(internal)
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), ApiError> {
        conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Accounts
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phone TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                birth_date TEXT,
                avatar_url TEXT,
                password_hash TEXT NOT NULL,
                totp_secret TEXT,
                two_factor_enabled INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            -- Backup codes (replaced wholesale on each 2FA enablement)
            CREATE TABLE IF NOT EXISTS backup_codes (
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                code TEXT NOT NULL,
                used INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_backup_codes_account ON backup_codes(account_id);

            -- Mails
            CREATE TABLE IF NOT EXISTS mails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id INTEGER NOT NULL,
                sender TEXT NOT NULL,
                to_addrs TEXT NOT NULL,
                cc_addrs TEXT NOT NULL,
                bcc_addrs TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                attachments_count INTEGER NOT NULL DEFAULT 0,
                labels TEXT NOT NULL DEFAULT '[]',
                original_mail_id INTEGER,
                starred INTEGER NOT NULL DEFAULT 0,
                is_read INTEGER NOT NULL DEFAULT 0,
                is_draft INTEGER NOT NULL DEFAULT 0,
                is_in_trash INTEGER NOT NULL DEFAULT 0,
                is_spam INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_mails_sender ON mails(sender_id);

            -- Resolved receivers
            CREATE TABLE IF NOT EXISTS mail_receivers (
                mail_id INTEGER NOT NULL REFERENCES mails(id) ON DELETE CASCADE,
                account_id INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_mail_receivers_mail ON mail_receivers(mail_id);
            CREATE INDEX IF NOT EXISTS idx_mail_receivers_account ON mail_receivers(account_id);
            "#,
        )
        .map_err(internal)
    }

    fn load_backup_codes(conn: &Connection, id: AccountId) -> Result<Vec<BackupCode>, ApiError> {
        let mut stmt = conn
            .prepare("SELECT code, used FROM backup_codes WHERE account_id = ?1 ORDER BY rowid")
            .map_err(internal)?;
        let codes = stmt
            .query_map(params![id.0 as i64], |row| {
                Ok(BackupCode {
                    code: row.get(0)?,
                    used: row.get(1)?,
                })
            })
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(codes)
    }

    fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
        Ok(Account {
            id: AccountId(row.get::<_, i64>(0)? as u64),
            phone: row.get(1)?,
            email: row.get(2)?,
            name: row.get(3)?,
            birth_date: parse_opt_datetime(row.get::<_, Option<String>>(4)?),
            avatar_url: row.get(5)?,
            password_hash: row.get(6)?,
            totp_secret: row.get(7)?,
            two_factor_enabled: row.get(8)?,
            backup_codes: Vec::new(),
            created_at: parse_datetime(row.get::<_, String>(9)?),
        })
    }

    fn get_account_where(
        &self,
        column: &str,
        value: &dyn rusqlite::ToSql,
    ) -> StoreResult<Option<Account>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT id, phone, email, name, birth_date, avatar_url, password_hash, \
             totp_secret, two_factor_enabled, created_at FROM accounts WHERE {} = ?1",
            column
        );
        let account = conn
            .query_row(&sql, &[value][..], Self::account_from_row)
            .optional()
            .map_err(internal)?;

        match account {
            Some(mut account) => {
                account.backup_codes = Self::load_backup_codes(&conn, account.id)?;
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    fn mail_from_row(row: &Row<'_>) -> rusqlite::Result<Mail> {
        let to: Vec<String> =
            serde_json::from_str(&row.get::<_, String>(3)?).unwrap_or_default();
        let cc: Vec<String> =
            serde_json::from_str(&row.get::<_, String>(4)?).unwrap_or_default();
        let bcc: Vec<String> =
            serde_json::from_str(&row.get::<_, String>(5)?).unwrap_or_default();
        let labels = serde_json::from_str(&row.get::<_, String>(9)?).unwrap_or_default();
        let receiver_ids = row
            .get::<_, Option<String>>(16)?
            .map(|joined| {
                joined
                    .split(',')
                    .filter_map(|s| s.parse::<u64>().ok())
                    .map(AccountId)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Mail {
            id: MailId(row.get::<_, i64>(0)? as u64),
            sender_id: AccountId(row.get::<_, i64>(1)? as u64),
            sender: row.get(2)?,
            to,
            cc,
            bcc,
            receiver_ids,
            subject: row.get(6)?,
            body: row.get(7)?,
            attachments_count: row.get::<_, i64>(8)? as u32,
            labels,
            original_mail_id: row.get::<_, Option<i64>>(10)?.map(|v| MailId(v as u64)),
            starred: row.get(11)?,
            is_read: row.get(12)?,
            is_draft: row.get(13)?,
            is_in_trash: row.get(14)?,
            is_spam: row.get(15)?,
            created_at: parse_datetime(row.get::<_, String>(17)?),
        })
    }

    /// Fetch mails matching a WHERE clause over `m`, ordered as given
    fn select_mails(
        &self,
        where_clause: &str,
        order: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> StoreResult<Vec<Mail>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT m.id, m.sender_id, m.sender, m.to_addrs, m.cc_addrs, m.bcc_addrs, \
             m.subject, m.body, m.attachments_count, m.labels, m.original_mail_id, \
             m.starred, m.is_read, m.is_draft, m.is_in_trash, m.is_spam, \
             (SELECT GROUP_CONCAT(account_id) FROM mail_receivers WHERE mail_id = m.id), \
             m.created_at \
             FROM mails m WHERE {} ORDER BY {}",
            where_clause, order
        );
        let mut stmt = conn.prepare(&sql).map_err(internal)?;
        let mails = stmt
            .query_map(args, Self::mail_from_row)
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(mails)
    }
}

/// WHERE fragment: the account sent or received the mail (binds ?1)
const PARTICIPANT: &str = "(m.sender_id = ?1 OR EXISTS (\
     SELECT 1 FROM mail_receivers r WHERE r.mail_id = m.id AND r.account_id = ?1))";

const NEWEST_FIRST: &str = "m.created_at DESC, m.id DESC";

fn parse_datetime(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

fn parse_opt_datetime(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.map(parse_datetime)
}

impl AccountStore for SqliteStore {
    fn create(&self, account: NewAccount) -> StoreResult<Account> {
        let conn = self.conn.lock().unwrap();
        let email = account.email.to_lowercase();

        let taken: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM accounts WHERE phone = ?1 OR email = ?2)",
                params![account.phone, email],
                |row| row.get(0),
            )
            .map_err(internal)?;
        if taken {
            return Err(ApiError::DuplicateIdentity);
        }

        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO accounts (phone, email, name, birth_date, avatar_url, password_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                account.phone,
                email,
                account.name,
                account.birth_date.map(|d| d.to_rfc3339()),
                account.avatar_url,
                account.password_hash,
                created_at.to_rfc3339(),
            ],
        )
        .map_err(internal)?;

        let id = AccountId(conn.last_insert_rowid() as u64);
        Ok(Account {
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
            created_at,
        })
    }

    fn get(&self, id: AccountId) -> StoreResult<Option<Account>> {
        self.get_account_where("id", &(id.0 as i64))
    }

    fn get_by_phone(&self, phone: &str) -> StoreResult<Option<Account>> {
        self.get_account_where("phone", &phone)
    }

    fn get_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.get_account_where("email", &email.to_lowercase())
    }

    fn update_profile(&self, id: AccountId, patch: AccountPatch) -> StoreResult<Option<Account>> {
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE accounts SET \
                 name = COALESCE(?2, name), \
                 birth_date = COALESCE(?3, birth_date), \
                 avatar_url = COALESCE(?4, avatar_url) \
                 WHERE id = ?1",
                params![
                    id.0,
                    patch.name,
                    patch.birth_date.map(|d| d.to_rfc3339()),
                    patch.avatar_url,
                ],
            )
            .map_err(internal)?;
        }
        AccountStore::get(self, id)
    }

    fn update_password_hash(&self, id: AccountId, hash: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE accounts SET password_hash = ?2 WHERE id = ?1",
                params![id.0 as i64, hash],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(ApiError::AccountNotFound);
        }
        Ok(())
    }

    fn set_pending_totp_secret(&self, id: AccountId, secret: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE accounts SET totp_secret = ?2 WHERE id = ?1",
                params![id.0 as i64, secret],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(ApiError::AccountNotFound);
        }
        Ok(())
    }

    fn enable_two_factor(&self, id: AccountId, codes: &[String]) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(internal)?;

        let changed = tx
            .execute(
                "UPDATE accounts SET two_factor_enabled = 1 WHERE id = ?1",
                params![id.0 as i64],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(ApiError::AccountNotFound);
        }

        tx.execute(
            "DELETE FROM backup_codes WHERE account_id = ?1",
            params![id.0 as i64],
        )
        .map_err(internal)?;
        for code in codes {
            tx.execute(
                "INSERT INTO backup_codes (account_id, code, used) VALUES (?1, ?2, 0)",
                params![id.0 as i64, code],
            )
            .map_err(internal)?;
        }

        tx.commit().map_err(internal)
    }

    fn disable_two_factor(&self, id: AccountId) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(internal)?;

        let changed = tx
            .execute(
                "UPDATE accounts SET totp_secret = NULL, two_factor_enabled = 0 WHERE id = ?1",
                params![id.0 as i64],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(ApiError::AccountNotFound);
        }

        tx.execute(
            "DELETE FROM backup_codes WHERE account_id = ?1",
            params![id.0 as i64],
        )
        .map_err(internal)?;

        tx.commit().map_err(internal)
    }

    fn consume_backup_code(&self, id: AccountId, code: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE backup_codes SET used = 1 WHERE rowid = (\
                 SELECT rowid FROM backup_codes \
                 WHERE account_id = ?1 AND code = ?2 AND used = 0 LIMIT 1)",
                params![id.0 as i64, code],
            )
            .map_err(internal)?;
        Ok(changed > 0)
    }

    fn delete(&self, id: AccountId) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM accounts WHERE id = ?1", params![id.0 as i64])
            .map_err(internal)?;
        Ok(changed > 0)
    }
}

impl MailStore for SqliteStore {
    fn create(&self, mail: NewMail) -> StoreResult<Mail> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(internal)?;
        let created_at = Utc::now();

        tx.execute(
            "INSERT INTO mails (sender_id, sender, to_addrs, cc_addrs, bcc_addrs, subject, \
             body, attachments_count, labels, original_mail_id, is_draft, is_spam, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, '[]', ?9, ?10, ?11, ?12)",
            params![
                mail.sender_id.0 as i64,
                mail.sender,
                serde_json::to_string(&mail.to).map_err(internal)?,
                serde_json::to_string(&mail.cc).map_err(internal)?,
                serde_json::to_string(&mail.bcc).map_err(internal)?,
                mail.subject,
                mail.body,
                mail.attachments_count,
                mail.original_mail_id.map(|m| m.0 as i64),
                mail.is_draft,
                mail.is_spam,
                created_at.to_rfc3339(),
            ],
        )
        .map_err(internal)?;

        let id = MailId(tx.last_insert_rowid() as u64);
        for receiver in &mail.receiver_ids {
            tx.execute(
                "INSERT INTO mail_receivers (mail_id, account_id) VALUES (?1, ?2)",
                params![id.0 as i64, receiver.0 as i64],
            )
            .map_err(internal)?;
        }

        tx.commit().map_err(internal)?;

        Ok(Mail {
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
            created_at,
        })
    }

    fn get(&self, id: MailId) -> StoreResult<Option<Mail>> {
        Ok(self
            .select_mails("m.id = ?1", "m.id", &[&(id.0 as i64)])?
            .into_iter()
            .next())
    }

    fn update(&self, id: MailId, patch: MailPatch) -> StoreResult<Option<Mail>> {
        {
            let mut conn = self.conn.lock().unwrap();
            let tx = conn.transaction().map_err(internal)?;

            tx.execute(
                "UPDATE mails SET \
                 subject = COALESCE(?2, subject), \
                 body = COALESCE(?3, body), \
                 to_addrs = COALESCE(?4, to_addrs), \
                 cc_addrs = COALESCE(?5, cc_addrs), \
                 bcc_addrs = COALESCE(?6, bcc_addrs), \
                 labels = COALESCE(?7, labels), \
                 starred = COALESCE(?8, starred), \
                 is_read = COALESCE(?9, is_read), \
                 is_draft = COALESCE(?10, is_draft), \
                 is_in_trash = COALESCE(?11, is_in_trash), \
                 is_spam = COALESCE(?12, is_spam) \
                 WHERE id = ?1",
                params![
                    id.0,
                    patch.subject,
                    patch.body,
                    patch
                        .to
                        .as_ref()
                        .map(|v| serde_json::to_string(v).unwrap_or_default()),
                    patch
                        .cc
                        .as_ref()
                        .map(|v| serde_json::to_string(v).unwrap_or_default()),
                    patch
                        .bcc
                        .as_ref()
                        .map(|v| serde_json::to_string(v).unwrap_or_default()),
                    patch
                        .labels
                        .as_ref()
                        .map(|v| serde_json::to_string(v).unwrap_or_default()),
                    patch.starred,
                    patch.is_read,
                    patch.is_draft,
                    patch.is_in_trash,
                    patch.is_spam,
                ],
            )
            .map_err(internal)?;

            if let Some(receiver_ids) = &patch.receiver_ids {
                tx.execute(
                    "DELETE FROM mail_receivers WHERE mail_id = ?1",
                    params![id.0 as i64],
                )
                .map_err(internal)?;
                for receiver in receiver_ids {
                    tx.execute(
                        "INSERT INTO mail_receivers (mail_id, account_id) VALUES (?1, ?2)",
                        params![id.0 as i64, receiver.0 as i64],
                    )
                    .map_err(internal)?;
                }
            }

            tx.commit().map_err(internal)?;
        }
        MailStore::get(self, id)
    }

    fn delete(&self, id: MailId) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM mails WHERE id = ?1", params![id.0 as i64])
            .map_err(internal)?;
        Ok(changed > 0)
    }

    fn inbox(&self, account: AccountId) -> StoreResult<Vec<Mail>> {
        self.select_mails(
            &format!(
                "{PARTICIPANT} AND m.is_in_trash = 0 AND m.is_spam = 0 AND m.is_draft = 0"
            ),
            NEWEST_FIRST,
            &[&(account.0 as i64)],
        )
    }

    fn sent(&self, account: AccountId) -> StoreResult<Vec<Mail>> {
        self.select_mails(
            "m.sender_id = ?1 AND m.is_draft = 0 AND m.is_in_trash = 0",
            NEWEST_FIRST,
            &[&(account.0 as i64)],
        )
    }

    fn drafts(&self, account: AccountId) -> StoreResult<Vec<Mail>> {
        self.select_mails(
            "m.sender_id = ?1 AND m.is_draft = 1",
            NEWEST_FIRST,
            &[&(account.0 as i64)],
        )
    }

    fn trash(&self, account: AccountId) -> StoreResult<Vec<Mail>> {
        self.select_mails(
            "m.sender_id = ?1 AND m.is_in_trash = 1",
            NEWEST_FIRST,
            &[&(account.0 as i64)],
        )
    }

    fn starred(&self, account: AccountId) -> StoreResult<Vec<Mail>> {
        self.select_mails(
            &format!("{PARTICIPANT} AND m.starred = 1 AND m.is_in_trash = 0"),
            NEWEST_FIRST,
            &[&(account.0 as i64)],
        )
    }

    fn spam(&self, account: AccountId) -> StoreResult<Vec<Mail>> {
        self.select_mails(
            &format!("{PARTICIPANT} AND m.is_spam = 1 AND m.is_in_trash = 0"),
            NEWEST_FIRST,
            &[&(account.0 as i64)],
        )
    }

    fn by_label(&self, account: AccountId, label_id: &str) -> StoreResult<Vec<Mail>> {
        // Labels live in a JSON column; the id match is refined in Rust
        let mails = self.select_mails(
            &format!("{PARTICIPANT} AND m.is_in_trash = 0"),
            NEWEST_FIRST,
            &[&(account.0 as i64)],
        )?;
        Ok(mails
            .into_iter()
            .filter(|m| m.labels.iter().any(|l| l.id == label_id))
            .collect())
    }

    fn thread(&self, root: MailId) -> StoreResult<Vec<Mail>> {
        self.select_mails(
            "m.id = ?1 OR m.original_mail_id = ?1",
            "m.created_at ASC, m.id ASC",
            &[&(root.0 as i64)],
        )
    }

    fn search(&self, account: AccountId, query: &MailQuery) -> StoreResult<Vec<Mail>> {
        // Narrow to the account's non-trash mail in SQL, then apply the
        // query filters with the same predicate the in-memory store uses
        let mails = self.select_mails(
            &format!("{PARTICIPANT} AND m.is_in_trash = 0"),
            NEWEST_FIRST,
            &[&(account.0 as i64)],
        )?;
        Ok(mails.into_iter().filter(|m| m.matches(query)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(store: &SqliteStore, phone: &str, email: &str) -> Account {
        AccountStore::create(
            store,
            NewAccount {
                phone: phone.to_string(),
                email: email.to_string(),
                name: "Test".to_string(),
                birth_date: None,
                avatar_url: None,
                password_hash: "hash".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_account_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = account(&store, "555-0100", "A@Example.com");

        let by_phone = store.get_by_phone("555-0100").unwrap().unwrap();
        assert_eq!(by_phone.id, created.id);
        // Emails are normalized to lowercase
        let by_email = store.get_by_email("a@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, created.id);

        assert!(matches!(
            AccountStore::create(&store, NewAccount {
                phone: "555-0100".to_string(),
                email: "other@example.com".to_string(),
                name: "Dup".to_string(),
                birth_date: None,
                avatar_url: None,
                password_hash: "hash".to_string(),
            }),
            Err(ApiError::DuplicateIdentity)
        ));
    }

    #[test]
    fn test_two_factor_lifecycle() {
        let store = SqliteStore::open_in_memory().unwrap();
        let acc = account(&store, "555-0100", "a@example.com");

        store.set_pending_totp_secret(acc.id, "SECRET").unwrap();
        let pending = AccountStore::get(&store, acc.id).unwrap().unwrap();
        assert_eq!(pending.totp_secret.as_deref(), Some("SECRET"));
        assert!(!pending.two_factor_enabled);

        let codes: Vec<String> = (0..10).map(|i| format!("CODE{:02}", i)).collect();
        store.enable_two_factor(acc.id, &codes).unwrap();
        let enabled = AccountStore::get(&store, acc.id).unwrap().unwrap();
        assert!(enabled.two_factor_enabled);
        assert_eq!(enabled.backup_codes.len(), 10);

        assert!(store.consume_backup_code(acc.id, "CODE00").unwrap());
        assert!(!store.consume_backup_code(acc.id, "CODE00").unwrap());

        store.disable_two_factor(acc.id).unwrap();
        let disabled = AccountStore::get(&store, acc.id).unwrap().unwrap();
        assert!(!disabled.two_factor_enabled);
        assert!(disabled.totp_secret.is_none());
        assert!(disabled.backup_codes.is_empty());
    }

    #[test]
    fn test_mail_folders() {
        let store = SqliteStore::open_in_memory().unwrap();
        let sender = account(&store, "555-0100", "a@example.com");
        let receiver = account(&store, "555-0101", "b@example.com");

        let mail = MailStore::create(
            &store,
            NewMail {
                sender_id: sender.id,
                sender: "a@example.com".to_string(),
                to: vec!["b@example.com".to_string()],
                cc: Vec::new(),
                bcc: Vec::new(),
                receiver_ids: vec![receiver.id],
                subject: "hello".to_string(),
                body: "body".to_string(),
                attachments_count: 0,
                original_mail_id: None,
                is_draft: false,
                is_spam: false,
            },
        )
        .unwrap();

        assert_eq!(store.inbox(receiver.id).unwrap().len(), 1);
        assert_eq!(store.sent(sender.id).unwrap().len(), 1);
        assert_eq!(store.inbox(receiver.id).unwrap()[0].receiver_ids, vec![receiver.id]);

        store
            .update(
                mail.id,
                MailPatch {
                    is_in_trash: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(store.inbox(receiver.id).unwrap().is_empty());
        // The trash folder is scoped to the sender
        assert_eq!(store.trash(sender.id).unwrap().len(), 1);
        assert!(store.trash(receiver.id).unwrap().is_empty());

        assert!(MailStore::delete(&store, mail.id).unwrap());
        assert!(MailStore::get(&store, mail.id).unwrap().is_none());
    }

    #[test]
    fn test_search_filters() {
        let store = SqliteStore::open_in_memory().unwrap();
        let sender = account(&store, "555-0100", "a@example.com");

        MailStore::create(
            &store,
            NewMail {
                sender_id: sender.id,
                sender: "a@example.com".to_string(),
                to: vec!["b@example.com".to_string()],
                cc: Vec::new(),
                bcc: Vec::new(),
                receiver_ids: Vec::new(),
                subject: "Quarterly report".to_string(),
                body: "numbers attached".to_string(),
                attachments_count: 1,
                original_mail_id: None,
                is_draft: false,
                is_spam: false,
            },
        )
        .unwrap();

        let hits = store
            .search(
                sender.id,
                &MailQuery {
                    text: Some("quarterly".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(hits.len(), 1);

        let misses = store
            .search(
                sender.id,
                &MailQuery {
                    text: Some("nonexistent".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(misses.is_empty());
    }
}
