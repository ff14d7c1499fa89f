//! Application state

use webmail_core::{TokenSigner, TokenVerifier};

use crate::classifier::SpamClassifier;
use crate::hub::NotificationHub;
use crate::store::{AccountStore, MailStore};
use crate::twofactor::AccountLocks;

/// Application state shared by all handlers
///
/// Generic over the stores and the classifier so tests can inject
/// in-memory implementations and mocks.
pub struct AppState<U, M, C> {
    /// The server's token-signing key
    pub signer: TokenSigner,
    /// Verification half of the signing key
    pub verifier: TokenVerifier,
    /// Issuer name used in TOTP provisioning URIs
    pub issuer: String,
    pub account_store: U,
    pub mail_store: M,
    pub classifier: C,
    /// Live-connection registry, empty at startup
    pub hub: NotificationHub,
    /// Per-account serialization of 2FA state transitions
    pub account_locks: AccountLocks,
}

impl<U, M, C> AppState<U, M, C>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    pub fn new(
        signer: TokenSigner,
        issuer: String,
        account_store: U,
        mail_store: M,
        classifier: C,
    ) -> Self {
        let verifier = signer.verifier();
        Self {
            signer,
            verifier,
            issuer,
            account_store,
            mail_store,
            classifier,
            hub: NotificationHub::new(),
            account_locks: AccountLocks::new(),
        }
    }
}
