//! Server configuration

use std::fs;
use std::io::{Error, ErrorKind};
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use webmail_core::TokenSigner;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Issuer name shown in authenticator apps
    pub issuer: String,

    /// SQLite database path; in-memory stores when unset
    pub database: Option<String>,

    /// Spam classifier endpoint; everything is ham when unset
    pub classifier_url: Option<String>,

    /// Path of the token-signing key file
    pub key_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            issuer: "Webmail".to_string(),
            database: None,
            classifier_url: None,
            key_file: "webmail.key".to_string(),
        }
    }
}

impl Config {
    /// Build the configuration from environment variables, falling back
    /// to defaults field by field
    pub fn from_env() -> Self {
        fn get_env(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|s| !s.is_empty())
        }

        let defaults = Self::default();
        Self {
            port: get_env("WEBMAIL_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            issuer: get_env("WEBMAIL_ISSUER").unwrap_or(defaults.issuer),
            database: get_env("WEBMAIL_DB"),
            classifier_url: get_env("WEBMAIL_CLASSIFIER_URL"),
            key_file: get_env("WEBMAIL_KEY_FILE").unwrap_or(defaults.key_file),
        }
    }
}

/// Load the token-signing key from the key file, generating and persisting
/// a fresh one on first start
pub fn load_or_generate_signing_key(path: &str) -> std::io::Result<TokenSigner> {
    if Path::new(path).exists() {
        let encoded = fs::read_to_string(path)?;
        let seed = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;
        TokenSigner::from_seed(&seed).map_err(|e| Error::new(ErrorKind::InvalidData, e))
    } else {
        let signer = TokenSigner::generate();
        fs::write(path, STANDARD.encode(signer.seed()))?;
        tracing::info!(path, "Generated new signing key");
        Ok(signer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_persists_across_loads() {
        let dir = std::env::temp_dir().join("webmail-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("signing.key");
        let path = path.to_str().unwrap();
        let _ = std::fs::remove_file(path);

        let first = load_or_generate_signing_key(path).unwrap();
        let second = load_or_generate_signing_key(path).unwrap();
        assert_eq!(first.verifier(), second.verifier());

        let _ = std::fs::remove_file(path);
    }
}
