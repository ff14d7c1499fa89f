//! Single-use backup codes
//!
//! Issued in batches of ten when two-factor authentication is enabled, and
//! substituting for a TOTP code when the authenticator device is unavailable.
//! Consuming a code is the server's concern; this module only generates them.

use rand::Rng;

/// Codes issued per enablement
pub const BACKUP_CODE_COUNT: usize = 10;

/// Length of a single code
pub const BACKUP_CODE_LEN: usize = 6;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a fresh batch of backup codes (uppercase alphanumeric)
pub fn generate_backup_codes() -> Vec<String> {
    (0..BACKUP_CODE_COUNT).map(|_| generate_code()).collect()
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let code: String = (0..BACKUP_CODE_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        // An all-digit code would be indistinguishable from a TOTP code
        // at verification time
        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return code;
        }
    }
}
