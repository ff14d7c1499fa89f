//! Two-factor authentication state machine
//!
//! An account moves Disabled -> PendingSetup -> Enabled, and back to
//! Disabled through an explicit disable. Login forks on that state: with
//! 2FA disabled it yields a full token immediately; with 2FA enabled it
//! yields a short-lived pending token that must be exchanged through
//! [`complete_login`].
//!
//! Every state transition is a read-modify-write on one account record, so
//! all of them are serialized through a per-account async mutex.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use webmail_core::{backup, totp, Claims, Purpose, TokenSigner};

use crate::crypto;
use crate::error::ApiError;
use crate::session;
use crate::store::{Account, AccountId, AccountStore};

/// Per-account locks serializing 2FA state transitions
///
/// Entries are created on first use and kept for the life of the process.
pub struct AccountLocks {
    locks: StdMutex<HashMap<u64, Arc<AsyncMutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self {
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for an account, creating it on first use
    pub async fn acquire(&self, account: AccountId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            Arc::clone(
                locks
                    .entry(account.0)
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

impl Default for AccountLocks {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a fresh TOTP setup
#[derive(Debug)]
pub struct TotpSetup {
    /// Base32 shared secret, shown to the user once
    pub secret: String,
    /// otpauth:// URI for authenticator apps
    pub otpauth_url: String,
}

/// Outcome of the first login factor
#[derive(Debug)]
pub enum LoginOutcome {
    /// 2FA disabled: fully authenticated straight away
    Full { token: String },
    /// 2FA enabled: the second factor is still required
    Pending { temp_token: String },
}

/// Resolve an account by phone or email
pub fn resolve_identity<U: AccountStore>(store: &U, identity: &str) -> Result<Account, ApiError> {
    if let Some(account) = store.get_by_phone(identity)? {
        return Ok(account);
    }
    store
        .get_by_email(identity)?
        .ok_or(ApiError::AccountNotFound)
}

fn check_password(account: &Account, password: &str) -> Result<(), ApiError> {
    let valid = crypto::verify_password(password, &account.password_hash)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !valid {
        return Err(ApiError::InvalidCredential);
    }
    Ok(())
}

/// First factor: resolve the account and check the password
pub fn login<U: AccountStore>(
    store: &U,
    signer: &TokenSigner,
    identity: &str,
    password: &str,
) -> Result<(Account, LoginOutcome), ApiError> {
    let account = resolve_identity(store, identity)?;
    check_password(&account, password)?;

    let outcome = if account.two_factor_enabled {
        LoginOutcome::Pending {
            temp_token: session::issue_pending_token(&account, signer)?,
        }
    } else {
        LoginOutcome::Full {
            token: session::issue_full_token(&account, signer)?,
        }
    };
    Ok((account, outcome))
}

/// Second factor: verify a TOTP or backup code and issue the full token
pub async fn complete_login<U: AccountStore>(
    store: &U,
    locks: &AccountLocks,
    signer: &TokenSigner,
    claims: &Claims,
    code: &str,
) -> Result<String, ApiError> {
    if claims.purpose != Purpose::TwoFactor {
        return Err(ApiError::Validation(
            "Not a pending two-factor session".to_string(),
        ));
    }

    let account_id = AccountId(claims.sub);
    verify_code(store, locks, account_id, code).await?;

    let account = store.get(account_id)?.ok_or(ApiError::AccountNotFound)?;
    session::issue_full_token(&account, signer)
}

/// Generate and store a pending TOTP secret; calling again before
/// enablement simply overwrites it
pub async fn begin_setup<U: AccountStore>(
    store: &U,
    locks: &AccountLocks,
    account_id: AccountId,
    issuer: &str,
) -> Result<TotpSetup, ApiError> {
    let _guard = locks.acquire(account_id).await;

    let account = store.get(account_id)?.ok_or(ApiError::AccountNotFound)?;

    let secret = totp::generate_secret().map_err(|e| ApiError::Internal(e.to_string()))?;
    store.set_pending_totp_secret(account_id, &secret)?;

    let otpauth_url = totp::provisioning_uri(&secret, issuer, &account.email)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(TotpSetup {
        secret,
        otpauth_url,
    })
}

/// Confirm the pending secret with a first code, flip 2FA on and return
/// the fresh backup codes (retrievable only here)
pub async fn confirm_enable<U: AccountStore>(
    store: &U,
    locks: &AccountLocks,
    account_id: AccountId,
    code: &str,
) -> Result<Vec<String>, ApiError> {
    let _guard = locks.acquire(account_id).await;

    let account = store.get(account_id)?.ok_or(ApiError::AccountNotFound)?;
    let secret = account.totp_secret.ok_or(ApiError::NoTwoFactorSetup)?;

    let valid = totp::verify(&secret, code).map_err(|e| ApiError::Internal(e.to_string()))?;
    if !valid {
        return Err(ApiError::InvalidCode);
    }

    let codes = backup::generate_backup_codes();
    store.enable_two_factor(account_id, &codes)?;
    tracing::info!(account = account_id.0, "Two-factor authentication enabled");

    Ok(codes)
}

/// Verify a second-factor token: all-digit input is treated as a TOTP
/// code, anything else as a backup code consumed on first use
pub async fn verify_code<U: AccountStore>(
    store: &U,
    locks: &AccountLocks,
    account_id: AccountId,
    submitted: &str,
) -> Result<(), ApiError> {
    let _guard = locks.acquire(account_id).await;

    let account = store.get(account_id)?.ok_or(ApiError::AccountNotFound)?;
    if !account.two_factor_enabled {
        return Err(ApiError::NoTwoFactorSetup);
    }

    if totp::is_totp_input(submitted) {
        let secret = account.totp_secret.ok_or(ApiError::NoTwoFactorSetup)?;
        let valid =
            totp::verify(&secret, submitted).map_err(|e| ApiError::Internal(e.to_string()))?;
        if !valid {
            return Err(ApiError::InvalidCode);
        }
        Ok(())
    } else if store.consume_backup_code(account_id, submitted)? {
        tracing::info!(account = account_id.0, "Backup code consumed");
        Ok(())
    } else {
        Err(ApiError::InvalidOrUsedBackupCode)
    }
}

/// Disable 2FA. Requires the password and a live TOTP code; backup codes
/// are not accepted for this higher-trust operation.
pub async fn disable<U: AccountStore>(
    store: &U,
    locks: &AccountLocks,
    account_id: AccountId,
    password: &str,
    code: &str,
) -> Result<(), ApiError> {
    let _guard = locks.acquire(account_id).await;

    let account = store.get(account_id)?.ok_or(ApiError::AccountNotFound)?;
    check_password(&account, password)?;

    if !account.two_factor_enabled {
        return Err(ApiError::NoTwoFactorSetup);
    }

    let secret = account.totp_secret.ok_or(ApiError::NoTwoFactorSetup)?;
    if !totp::is_totp_input(code) {
        return Err(ApiError::InvalidCode);
    }
    let valid = totp::verify(&secret, code).map_err(|e| ApiError::Internal(e.to_string()))?;
    if !valid {
        return Err(ApiError::InvalidCode);
    }

    store.disable_two_factor(account_id)?;
    tracing::info!(account = account_id.0, "Two-factor authentication disabled");
    Ok(())
}

/// Replace the password with a random one, returned once in plaintext.
/// With 2FA enabled this requires a live TOTP code, same policy as
/// [`disable`].
pub async fn recover_password<U: AccountStore>(
    store: &U,
    locks: &AccountLocks,
    identity: &str,
    otp: Option<&str>,
) -> Result<String, ApiError> {
    let account = resolve_identity(store, identity)?;
    let _guard = locks.acquire(account.id).await;
    // Re-read under the lock so a concurrent 2FA transition is observed
    let account = store.get(account.id)?.ok_or(ApiError::AccountNotFound)?;

    if account.two_factor_enabled {
        let secret = account
            .totp_secret
            .clone()
            .ok_or(ApiError::NoTwoFactorSetup)?;
        let code = otp.ok_or(ApiError::InvalidCode)?;
        if !totp::is_totp_input(code) {
            return Err(ApiError::InvalidCode);
        }
        let valid = totp::verify(&secret, code).map_err(|e| ApiError::Internal(e.to_string()))?;
        if !valid {
            return Err(ApiError::InvalidCode);
        }
    }

    let password = crypto::generate_recovery_password();
    let hash =
        crypto::hash_password(&password).map_err(|e| ApiError::Internal(e.to_string()))?;
    store.update_password_hash(account.id, &hash)?;
    tracing::info!(account = account.id.0, "Password recovered");

    Ok(password)
}

/// Change the password, rejecting reuse of the current one
pub async fn change_password<U: AccountStore>(
    store: &U,
    locks: &AccountLocks,
    account_id: AccountId,
    old_password: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    let _guard = locks.acquire(account_id).await;

    let account = store.get(account_id)?.ok_or(ApiError::AccountNotFound)?;
    check_password(&account, old_password)?;

    let reused = crypto::verify_password(new_password, &account.password_hash)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if reused {
        return Err(ApiError::PasswordReuse);
    }

    let hash =
        crypto::hash_password(new_password).map_err(|e| ApiError::Internal(e.to_string()))?;
    store.update_password_hash(account_id, &hash)
}
