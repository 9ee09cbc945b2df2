/// Refresh Token Rotation
///
/// Every refresh token row is in one of these states:
/// - unused: can be exchanged exactly once
/// - used: exchanged already; presenting it again is treated as theft and
///   revokes every refresh token the owner holds
/// - expired: rejected, nothing else happens
///
/// The whole exchange runs inside one store transaction holding the
/// owner's lock, then the presented row's lock. Concurrent presentations of
/// the same token cannot both succeed, and a revoke-all triggered by a
/// replay sees every successor committed before it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::jwt::AccessTokenIssuer;
use crate::auth::refresh_token::{
    hash_token, issue_refresh_token, revoke_all_user_tokens, revoke_refresh_token,
    stage_refresh_token,
};
use crate::error::{AppError, RefreshError};
use crate::store::RefreshTokenStore;

/// Result of a successful rotation
#[derive(Debug, Clone)]
pub struct RotatedToken {
    pub refresh_token: String,
    pub user_id: Uuid,
}

/// Access/refresh pair handed out at login
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Exchange `raw_token` for a new refresh token
///
/// # Errors
/// - `RefreshError::InvalidToken` if no row matches (never issued, logged out, or revoked)
/// - `RefreshError::ReuseDetected` if the row was already used; all of the
///   owner's refresh tokens are deleted and committed before this returns
/// - `RefreshError::Expired` if the row is past its expiry
pub async fn rotate_refresh_token(
    store: &dyn RefreshTokenStore,
    raw_token: &str,
    now: DateTime<Utc>,
) -> Result<RotatedToken, AppError> {
    let token_hash = hash_token(raw_token);
    let mut tx = store.begin().await?;

    let owner = tx
        .find_owner(&token_hash)
        .await?
        .ok_or(RefreshError::InvalidToken)?;
    tx.lock_user(owner).await?;

    // re-read under the lock: the row may have been used or deleted meanwhile
    let existing = tx
        .find_by_hash_for_update(&token_hash)
        .await?
        .ok_or(RefreshError::InvalidToken)?;

    if existing.used {
        let user_id = existing.user_id;
        let revoked = tx.delete_all_for_user(user_id).await?;
        tx.commit().await?;

        tracing::warn!(
            user_id = %user_id,
            token_id = %existing.id,
            revoked = revoked,
            "Refresh token reuse detected, all sessions revoked"
        );
        return Err(RefreshError::ReuseDetected { user_id }.into());
    }

    if existing.expires_at < now {
        tracing::info!(user_id = %existing.user_id, token_id = %existing.id, "Refresh token expired");
        return Err(RefreshError::Expired.into());
    }

    if !tx.mark_used(existing.id).await? {
        return Err(RefreshError::InvalidToken.into());
    }
    let refresh_token = stage_refresh_token(tx.as_mut(), existing.user_id, now).await?;
    tx.commit().await?;

    tracing::debug!(user_id = %existing.user_id, token_id = %existing.id, "Refresh token rotated");

    Ok(RotatedToken {
        refresh_token,
        user_id: existing.user_id,
    })
}

/// Token lifecycle service shared by the HTTP handlers
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn RefreshTokenStore>,
    issuer: AccessTokenIssuer,
}

impl TokenService {
    pub fn new(store: Arc<dyn RefreshTokenStore>, issuer: AccessTokenIssuer) -> Self {
        Self { store, issuer }
    }

    pub fn issuer(&self) -> &AccessTokenIssuer {
        &self.issuer
    }

    /// Issue an access token and a refresh token together
    ///
    /// The refresh token is inserted first and only committed once the
    /// access token is signed; if either step fails neither is issued.
    pub async fn login(&self, user_id: Uuid, email: &str) -> Result<IssuedTokens, AppError> {
        let mut tx = self.store.begin().await?;
        let refresh_token = stage_refresh_token(tx.as_mut(), user_id, Utc::now()).await?;
        let access_token = self.issuer.sign(&user_id, email)?;
        tx.commit().await?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
        })
    }

    /// Issue a standalone refresh token
    pub async fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        issue_refresh_token(self.store.as_ref(), user_id, Utc::now()).await
    }

    pub async fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String, AppError> {
        issue_refresh_token(self.store.as_ref(), user_id, now).await
    }

    pub async fn rotate(&self, raw_token: &str) -> Result<RotatedToken, AppError> {
        self.rotate_at(raw_token, Utc::now()).await
    }

    pub async fn rotate_at(&self, raw_token: &str, now: DateTime<Utc>) -> Result<RotatedToken, AppError> {
        rotate_refresh_token(self.store.as_ref(), raw_token, now).await
    }

    /// Revoke one refresh token. Never fails: storage errors are logged
    /// and swallowed so logout always succeeds for the caller.
    pub async fn logout(&self, raw_token: &str) {
        if let Err(e) = revoke_refresh_token(self.store.as_ref(), raw_token).await {
            tracing::error!(error = %e, "Failed to revoke refresh token on logout");
        }
    }

    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        revoke_all_user_tokens(self.store.as_ref(), user_id).await
    }
}
