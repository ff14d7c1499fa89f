//! Two-factor management endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::classifier::SpamClassifier;
use crate::error::ApiError;
use crate::session;
use crate::state::AppState;
use crate::store::{AccountId, AccountStore, MailStore};
use crate::twofactor;

use super::auth::SuccessResponse;

#[derive(Serialize)]
pub struct SetupResponse {
    /// Base32 shared secret, shown once
    pub secret: String,
    /// otpauth:// URI for authenticator apps
    pub otpauth_url: String,
}

/// POST /api/auth/2fa/setup
pub async fn setup<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
) -> Result<Json<SetupResponse>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let claims = session::authenticate(&headers, &state.verifier, true)?;

    let setup = twofactor::begin_setup(
        &state.account_store,
        &state.account_locks,
        AccountId(claims.sub),
        &state.issuer,
    )
    .await?;

    Ok(Json(SetupResponse {
        secret: setup.secret,
        otpauth_url: setup.otpauth_url,
    }))
}

#[derive(Deserialize)]
pub struct EnableRequest {
    /// First TOTP code from the authenticator, confirming the setup
    pub code: String,
}

#[derive(Serialize)]
pub struct EnableResponse {
    pub success: bool,
    /// Fresh backup codes, retrievable only here
    pub backup_codes: Vec<String>,
}

/// POST /api/auth/2fa/enable
pub async fn enable<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
    Json(req): Json<EnableRequest>,
) -> Result<Json<EnableResponse>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let claims = session::authenticate(&headers, &state.verifier, true)?;

    let backup_codes = twofactor::confirm_enable(
        &state.account_store,
        &state.account_locks,
        AccountId(claims.sub),
        &req.code,
    )
    .await?;

    Ok(Json(EnableResponse {
        success: true,
        backup_codes,
    }))
}

#[derive(Deserialize)]
pub struct DisableRequest {
    pub password: String,
    /// Live TOTP code; backup codes are not accepted here
    pub code: String,
}

/// POST /api/auth/2fa/disable
pub async fn disable<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
    Json(req): Json<DisableRequest>,
) -> Result<Json<SuccessResponse>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let claims = session::authenticate(&headers, &state.verifier, true)?;

    twofactor::disable(
        &state.account_store,
        &state.account_locks,
        AccountId(claims.sub),
        &req.password,
        &req.code,
    )
    .await?;

    Ok(Json(SuccessResponse { success: true }))
}
