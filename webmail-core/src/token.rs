//! Signed session tokens
//!
//! A session token is a compact JWT (EdDSA) carrying the account id, the
//! account's address and a purpose claim. `auth` tokens grant full access;
//! `2FA` tokens only prove the first factor and must be exchanged for an
//! `auth` token by completing the second factor. Tokens are not persisted
//! server-side: signature and expiry fully determine validity.
//!
//! The signing key never leaves [`TokenSigner`]; code paths that only
//! check tokens get the [`TokenVerifier`] half.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The server-held key that signs session tokens
pub struct TokenSigner {
    key: SigningKey,
}

impl TokenSigner {
    /// Generate a fresh random signing key
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Restore a signing key from its 32-byte seed
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| Error::InvalidKey("seed must be 32 bytes".into()))?;
        Ok(Self {
            key: SigningKey::from_bytes(&seed),
        })
    }

    /// The seed bytes, for persisting the key across restarts
    pub fn seed(&self) -> &[u8; 32] {
        self.key.as_bytes()
    }

    /// The verification half, handed to token-checking code paths
    pub fn verifier(&self) -> TokenVerifier {
        TokenVerifier {
            key: self.key.verifying_key(),
        }
    }
}

/// Verification half of the token-signing key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenVerifier {
    key: VerifyingKey,
}

impl TokenVerifier {
    /// Encode as base64url (no padding); logged at startup
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.key.as_bytes())
    }
}

/// What the holder of a token is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Purpose {
    /// Fully authenticated session
    #[serde(rename = "auth")]
    Auth,
    /// First factor passed, second factor still pending
    #[serde(rename = "2FA")]
    TwoFactor,
}

/// Claims embedded in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject account id
    pub sub: u64,

    /// Account email address
    pub email: String,

    /// Purpose claim distinguishing full sessions from pending-2FA sessions
    pub purpose: Purpose,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// A signed session token
#[derive(Debug, Clone)]
pub struct SessionToken {
    /// The encoded JWT
    encoded: String,
    /// The decoded claims
    claims: Claims,
}

impl SessionToken {
    /// Create and sign a new token
    pub fn issue(
        account_id: u64,
        email: &str,
        purpose: Purpose,
        validity: Duration,
        signer: &TokenSigner,
    ) -> Result<Self> {
        let exp = Utc::now() + validity;

        let claims = Claims {
            sub: account_id,
            email: email.to_string(),
            purpose,
            exp: exp.timestamp(),
        };

        let encoded = Self::encode_and_sign(&claims, signer)?;

        Ok(Self { encoded, claims })
    }

    /// Parse a token from its encoded form (does not verify the signature)
    pub fn parse(encoded: &str) -> Result<Self> {
        let claims = Self::decode_claims(encoded)?;
        Ok(Self {
            encoded: encoded.to_string(),
            claims,
        })
    }

    /// Verify the token signature
    pub fn verify(&self, verifier: &TokenVerifier) -> Result<()> {
        Self::verify_signature(&self.encoded, verifier)
    }

    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        let exp = chrono::DateTime::from_timestamp(self.claims.exp, 0)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH);
        Utc::now() > exp
    }

    /// Get the token claims
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Get the encoded JWT
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    // Internal: encode claims and sign
    fn encode_and_sign(claims: &Claims, signer: &TokenSigner) -> Result<String> {
        let header = r#"{"alg":"EdDSA","typ":"JWT"}"#;
        let header_b64 = URL_SAFE_NO_PAD.encode(header);

        let claims_json = serde_json::to_string(claims)?;
        let claims_b64 = URL_SAFE_NO_PAD.encode(&claims_json);

        let message = format!("{}.{}", header_b64, claims_b64);
        let signature: Signature = signer.key.sign(message.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

        Ok(format!("{}.{}", message, sig_b64))
    }

    // Internal: decode claims
    fn decode_claims(encoded: &str) -> Result<Claims> {
        let parts: Vec<&str> = encoded.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidToken("expected 3 JWT parts".into()));
        }

        let claims_bytes = URL_SAFE_NO_PAD.decode(parts[1])?;
        let claims: Claims = serde_json::from_slice(&claims_bytes)?;

        Ok(claims)
    }

    // Internal: verify signature
    fn verify_signature(encoded: &str, verifier: &TokenVerifier) -> Result<()> {
        let parts: Vec<&str> = encoded.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidToken("expected 3 JWT parts".into()));
        }

        let message = format!("{}.{}", parts[0], parts[1]);
        let sig_bytes = URL_SAFE_NO_PAD.decode(parts[2])?;
        let sig_bytes: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|_| Error::SignatureVerificationFailed)?;
        let signature = Signature::from_bytes(&sig_bytes);

        verifier
            .key
            .verify(message.as_bytes(), &signature)
            .map_err(|_| Error::SignatureVerificationFailed)
    }
}
