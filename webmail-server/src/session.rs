//! Session token helpers
//!
//! Issues and validates the bearer tokens carried in the Authorization
//! header. Full sessions live for days; pending-2FA sessions only long
//! enough to complete the second factor.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use chrono::Duration;
use webmail_core::{Claims, Purpose, SessionToken, TokenSigner, TokenVerifier};

use crate::error::ApiError;
use crate::store::Account;

/// Lifetime of a full session token
const AUTH_TOKEN_TTL_DAYS: i64 = 7;

/// Lifetime of a pending-2FA token
const PENDING_TOKEN_TTL_MINUTES: i64 = 5;

/// Issue a full-auth token for the account
pub fn issue_full_token(account: &Account, signer: &TokenSigner) -> Result<String, ApiError> {
    issue(account, Purpose::Auth, Duration::days(AUTH_TOKEN_TTL_DAYS), signer)
}

/// Issue a short-lived token proving only the first factor
pub fn issue_pending_token(account: &Account, signer: &TokenSigner) -> Result<String, ApiError> {
    issue(
        account,
        Purpose::TwoFactor,
        Duration::minutes(PENDING_TOKEN_TTL_MINUTES),
        signer,
    )
}

fn issue(
    account: &Account,
    purpose: Purpose,
    validity: Duration,
    signer: &TokenSigner,
) -> Result<String, ApiError> {
    let token = SessionToken::issue(account.id.0, &account.email, purpose, validity, signer)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(token.encoded().to_string())
}

/// Validate an encoded token. With `require_full_auth`, a pending-2FA
/// token is rejected with `StepUpRequired`.
pub fn validate_token(
    token: &str,
    verifier: &TokenVerifier,
    require_full_auth: bool,
) -> Result<Claims, ApiError> {
    let token = SessionToken::parse(token).map_err(|_| ApiError::MalformedToken)?;

    token
        .verify(verifier)
        .map_err(|_| ApiError::ExpiredOrInvalidSignature)?;
    if token.is_expired() {
        return Err(ApiError::ExpiredOrInvalidSignature);
    }

    if require_full_auth && token.claims().purpose != Purpose::Auth {
        return Err(ApiError::StepUpRequired);
    }

    Ok(token.claims().clone())
}

/// Extract the bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(ApiError::MissingToken)?
        .to_str()
        .map_err(|_| ApiError::MalformedToken)?;

    header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::MalformedToken)
}

/// Validate the bearer token in the request headers
pub fn authenticate(
    headers: &HeaderMap,
    verifier: &TokenVerifier,
    require_full_auth: bool,
) -> Result<Claims, ApiError> {
    let token = bearer_token(headers)?;
    validate_token(token, verifier, require_full_auth)
}
