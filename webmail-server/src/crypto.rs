//! Password hashing utilities

use rand::Rng;

/// Default bcrypt cost factor
pub const BCRYPT_COST: u32 = 12;

/// Length of generated recovery passwords
const RECOVERY_PASSWORD_LEN: usize = 16;

const RECOVERY_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Hash a password with bcrypt (random per-password salt)
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, BCRYPT_COST)
}

/// Verify a password against a bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}

/// Generate a random password for account recovery, returned to the user
/// once and delivered out-of-band
pub fn generate_recovery_password() -> String {
    let mut rng = rand::thread_rng();
    (0..RECOVERY_PASSWORD_LEN)
        .map(|_| RECOVERY_ALPHABET[rng.gen_range(0..RECOVERY_ALPHABET.len())] as char)
        .collect()
}
