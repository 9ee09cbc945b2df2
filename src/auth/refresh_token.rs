/// Refresh Token Management
///
/// Refresh tokens are:
/// - Cryptographically secure random 64-character alphanumeric strings
/// - Hashed with SHA-256 before storage (plaintext is never stored or logged)
/// - Valid for a fixed seven days from creation
/// - Single-use: each one is exchanged for a new one on refresh (see `rotation`)

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::{RefreshTokenRecord, RefreshTokenStore, RefreshTokenTransaction};

const REFRESH_TOKEN_LENGTH: usize = 64;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Generate a new cryptographically secure refresh token
///
/// 64 symbols from a 62-letter alphabet, about 381 bits of entropy, and
/// safe to put in a cookie without encoding.
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Hash a refresh token using SHA-256 (lowercase hex)
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lifetime of every refresh token
pub fn refresh_token_ttl() -> Duration {
    Duration::days(REFRESH_TOKEN_TTL_DAYS)
}

/// Build the row for a freshly generated raw token
pub fn new_refresh_token_record(user_id: Uuid, raw_token: &str, now: DateTime<Utc>) -> RefreshTokenRecord {
    RefreshTokenRecord {
        id: Uuid::new_v4(),
        token_hash: hash_token(raw_token),
        user_id,
        expires_at: now + refresh_token_ttl(),
        used: false,
        created_at: now,
    }
}

/// Generate a token for `user_id` and insert it inside an open transaction.
/// The raw value is returned to the caller and exists nowhere else.
pub async fn stage_refresh_token(
    tx: &mut dyn RefreshTokenTransaction,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let raw_token = generate_refresh_token();
    tx.lock_user(user_id).await?;
    tx.insert(&new_refresh_token_record(user_id, &raw_token, now)).await?;
    Ok(raw_token)
}

/// Issue a standalone refresh token in its own transaction
pub async fn issue_refresh_token(
    store: &dyn RefreshTokenStore,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let mut tx = store.begin().await?;
    let raw_token = stage_refresh_token(tx.as_mut(), user_id, now).await?;
    tx.commit().await?;
    Ok(raw_token)
}

/// Delete the row for a raw token. Unknown tokens are not an error.
pub async fn revoke_refresh_token(store: &dyn RefreshTokenStore, raw_token: &str) -> Result<u64, AppError> {
    let mut tx = store.begin().await?;
    let deleted = tx.delete_by_hash(&hash_token(raw_token)).await?;
    tx.commit().await?;
    Ok(deleted)
}

/// Delete every refresh token a user holds
pub async fn revoke_all_user_tokens(store: &dyn RefreshTokenStore, user_id: Uuid) -> Result<u64, AppError> {
    let mut tx = store.begin().await?;
    tx.lock_user(user_id).await?;
    let deleted = tx.delete_all_for_user(user_id).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user_id, revoked = deleted, "All refresh tokens revoked for user");
    Ok(deleted)
}
