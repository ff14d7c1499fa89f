//! Time-based one-time passwords
//!
//! Standard 30-second-step TOTP with a tolerance window of two steps either
//! side, covering clock drift of up to about a minute.

use totp_rs::{Algorithm, Secret, TOTP};

use crate::{Error, Result};

/// Number of digits in a code
pub const DIGITS: usize = 6;

/// Step length in seconds
pub const STEP: u64 = 30;

/// Accepted drift, in steps, either side of the current step
pub const SKEW: u8 = 2;

/// Generate a fresh random shared secret, base32-encoded (160 bits)
pub fn generate_secret() -> Result<String> {
    let bytes = Secret::generate_secret()
        .to_bytes()
        .map_err(|e| Error::InvalidSecret(format!("{e:?}")))?;
    let totp = build_raw(bytes, None, String::new())?;
    Ok(totp.get_secret_base32())
}

/// Build the `otpauth://` provisioning URI for an authenticator app
pub fn provisioning_uri(secret: &str, issuer: &str, account: &str) -> Result<String> {
    let totp = build(secret, Some(issuer.to_string()), account.to_string())?;
    Ok(totp.get_url())
}

/// Verify a code against the secret at the current time
pub fn verify(secret: &str, code: &str) -> Result<bool> {
    let totp = build(secret, None, String::new())?;
    Ok(totp.check_current(code).unwrap_or(false))
}

/// Verify a code against the secret at an explicit Unix timestamp
pub fn verify_at(secret: &str, code: &str, time: u64) -> Result<bool> {
    let totp = build(secret, None, String::new())?;
    Ok(totp.check(code, time))
}

/// Generate the code for the current time
pub fn generate_now(secret: &str) -> Result<String> {
    let totp = build(secret, None, String::new())?;
    totp.generate_current()
        .map_err(|e| Error::InvalidSecret(e.to_string()))
}

/// Generate the code for an explicit Unix timestamp
pub fn generate_at(secret: &str, time: u64) -> Result<String> {
    let totp = build(secret, None, String::new())?;
    Ok(totp.generate(time))
}

/// Whether a submitted token looks like a TOTP code (all digits) rather
/// than a backup code
pub fn is_totp_input(input: &str) -> bool {
    !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit())
}

fn build(secret: &str, issuer: Option<String>, account: String) -> Result<TOTP> {
    let bytes = Secret::Encoded(secret.to_string())
        .to_bytes()
        .map_err(|e| Error::InvalidSecret(format!("{e:?}")))?;
    build_raw(bytes, issuer, account)
}

fn build_raw(bytes: Vec<u8>, issuer: Option<String>, account: String) -> Result<TOTP> {
    TOTP::new(Algorithm::SHA1, DIGITS, SKEW, STEP, bytes, issuer, account)
        .map_err(|e| Error::InvalidSecret(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_base32() {
        let secret = generate_secret().unwrap();
        assert!(secret.len() >= 32); // 160 bits -> 32 base32 chars
        assert!(secret
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b)));
    }

    #[test]
    fn test_fresh_secrets_differ() {
        assert_ne!(generate_secret().unwrap(), generate_secret().unwrap());
    }

    #[test]
    fn test_provisioning_uri() {
        let secret = generate_secret().unwrap();
        let uri = provisioning_uri(&secret, "Webmail", "user@example.com").unwrap();
        assert!(uri.starts_with("otpauth://totp/"));
        assert!(uri.contains("issuer=Webmail"));
    }

    #[test]
    fn test_code_roundtrip() {
        let secret = generate_secret().unwrap();
        let code = generate_at(&secret, 1_700_000_000).unwrap();
        assert!(verify_at(&secret, &code, 1_700_000_000).unwrap());
        // The same code is useless a day later
        assert!(!verify_at(&secret, &code, 1_700_086_400).unwrap());
    }

    #[test]
    fn test_is_totp_input() {
        assert!(is_totp_input("123456"));
        assert!(!is_totp_input("AB12CD"));
        assert!(!is_totp_input(""));
        assert!(!is_totp_input("12345a"));
    }
}
