//! Webmail Core Library
//!
//! Credential primitives shared by the webmail server:
//! - Signed session tokens carrying a purpose claim, with the Ed25519
//!   signing key behind a token-scoped API
//! - TOTP secret generation and windowed code verification
//! - Single-use backup codes

pub mod backup;
pub mod error;
pub mod token;
pub mod totp;

pub use backup::{generate_backup_codes, BACKUP_CODE_COUNT, BACKUP_CODE_LEN};
pub use error::Error;
pub use token::{Claims, Purpose, SessionToken, TokenSigner, TokenVerifier};

/// Result type for webmail-core operations
pub type Result<T> = std::result::Result<T, Error>;
