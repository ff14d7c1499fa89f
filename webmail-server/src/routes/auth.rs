//! Authentication endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::SpamClassifier;
use crate::crypto::hash_password;
use crate::error::ApiError;
use crate::hub::NotificationEvent;
use crate::session;
use crate::state::AppState;
use crate::store::{AccountId, AccountProfile, AccountStore, MailStore, NewAccount};
use crate::twofactor::{self, LoginOutcome};

/// Minimum password length
const MIN_PASSWORD_LENGTH: usize = 8;
/// Maximum password length
const MAX_PASSWORD_LENGTH: usize = 80;

fn check_password_length(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(
            "Password too short (minimum 8 characters)".to_string(),
        ));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::Validation(
            "Password too long (maximum 80 characters)".to_string(),
        ));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub phone: String,
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub birth_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// POST /api/auth/register
pub async fn register<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountProfile>), ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    check_password_length(&req.password)?;

    let password_hash =
        hash_password(&req.password).map_err(|e| ApiError::Internal(e.to_string()))?;

    let account = state.account_store.create(NewAccount {
        phone: req.phone,
        email: req.email,
        name: req.name,
        birth_date: req.birth_date,
        avatar_url: req.avatar_url,
        password_hash,
    })?;

    tracing::info!(account = account.id.0, "Account registered");
    Ok((StatusCode::CREATED, Json(account.profile())))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Phone number or email address
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    /// Full session token; present only when 2FA is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Set when the second factor is still required
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_2fa: Option<bool>,
    /// Short-lived token for completing the second factor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_token: Option<String>,
}

/// POST /api/auth/login
pub async fn login<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let (account, outcome) = twofactor::login(
        &state.account_store,
        &state.signer,
        &req.username,
        &req.password,
    )?;

    match outcome {
        LoginOutcome::Full { token } => Ok(Json(LoginResponse {
            success: true,
            token: Some(token),
            require_2fa: None,
            temp_token: None,
        })),
        LoginOutcome::Pending { temp_token } => {
            // Let an already connected session approve or flag the attempt
            state.hub.publish(
                account.id,
                NotificationEvent::LoginRequest {
                    email: account.email.clone(),
                    timestamp: Utc::now(),
                },
            );
            Ok(Json(LoginResponse {
                success: true,
                token: None,
                require_2fa: Some(true),
                temp_token: Some(temp_token),
            }))
        }
    }
}

#[derive(Deserialize)]
pub struct CompleteLoginRequest {
    /// TOTP code or backup code
    pub code: String,
}

#[derive(Serialize)]
pub struct CompleteLoginResponse {
    pub success: bool,
    pub token: String,
}

/// POST /api/auth/login/2fa
pub async fn complete_login<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
    Json(req): Json<CompleteLoginRequest>,
) -> Result<Json<CompleteLoginResponse>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let claims = session::authenticate(&headers, &state.verifier, false)?;

    let token = twofactor::complete_login(
        &state.account_store,
        &state.account_locks,
        &state.signer,
        &claims,
        &req.code,
    )
    .await?;

    Ok(Json(CompleteLoginResponse {
        success: true,
        token,
    }))
}

/// GET /api/auth/profile
pub async fn profile<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
) -> Result<Json<AccountProfile>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let claims = session::authenticate(&headers, &state.verifier, true)?;
    let account = state
        .account_store
        .get(AccountId(claims.sub))?
        .ok_or(ApiError::AccountNotFound)?;

    Ok(Json(account.profile()))
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// POST /api/auth/password
pub async fn change_password<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<SuccessResponse>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let claims = session::authenticate(&headers, &state.verifier, true)?;
    check_password_length(&req.new_password)?;

    twofactor::change_password(
        &state.account_store,
        &state.account_locks,
        AccountId(claims.sub),
        &req.old_password,
        &req.new_password,
    )
    .await?;

    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Deserialize)]
pub struct RecoverPasswordRequest {
    /// Phone number or email address
    pub username: String,
    /// Required when 2FA is enabled on the account
    #[serde(default)]
    pub otp: Option<String>,
}

#[derive(Serialize)]
pub struct RecoverPasswordResponse {
    pub success: bool,
    /// Fresh password, returned once for out-of-band delivery
    pub password: String,
}

/// POST /api/auth/recover
pub async fn recover_password<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Json(req): Json<RecoverPasswordRequest>,
) -> Result<Json<RecoverPasswordResponse>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let password = twofactor::recover_password(
        &state.account_store,
        &state.account_locks,
        &req.username,
        req.otp.as_deref(),
    )
    .await?;

    Ok(Json(RecoverPasswordResponse {
        success: true,
        password,
    }))
}
