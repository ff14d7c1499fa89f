//! Account management endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::classifier::SpamClassifier;
use crate::error::ApiError;
use crate::session;
use crate::state::AppState;
use crate::store::{AccountId, AccountPatch, AccountProfile, AccountStore, MailStore};

use super::auth::SuccessResponse;

fn require_self(claims_sub: u64, id: u64) -> Result<AccountId, ApiError> {
    if claims_sub != id {
        return Err(ApiError::Forbidden);
    }
    Ok(AccountId(id))
}

/// PUT /api/users/:id
pub async fn update_account<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(patch): Json<AccountPatch>,
) -> Result<Json<AccountProfile>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let claims = session::authenticate(&headers, &state.verifier, true)?;
    let id = require_self(claims.sub, id)?;

    let account = state
        .account_store
        .update_profile(id, patch)?
        .ok_or(ApiError::AccountNotFound)?;

    Ok(Json(account.profile()))
}

/// DELETE /api/users/:id
pub async fn delete_account<U, M, C>(
    State(state): State<Arc<AppState<U, M, C>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, ApiError>
where
    U: AccountStore,
    M: MailStore,
    C: SpamClassifier,
{
    let claims = session::authenticate(&headers, &state.verifier, true)?;
    let id = require_self(claims.sub, id)?;

    if !state.account_store.delete(id)? {
        return Err(ApiError::AccountNotFound);
    }
    tracing::info!(account = id.0, "Account deleted");

    Ok(Json(SuccessResponse { success: true }))
}
