/// Persistence contracts
///
/// Two stores sit behind the auth service:
/// - `UserStore` for accounts (lookup by email and by id)
/// - `RefreshTokenStore` for hashed refresh tokens, accessed only through
///   transactions so rotation can be made atomic
///
/// `PgStore` implements both on PostgreSQL; `InMemoryStore` implements both
/// in process for tests and local runs.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;

/// Registered account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Account about to be created; `email` is already normalised
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
}

/// Persisted refresh token row. Only the SHA-256 of the raw token is kept.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user.
    ///
    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` if the email is taken.
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
}

/// Source of refresh token transactions
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Open a transaction. Dropping it without `commit` discards every
    /// change made through it.
    async fn begin(&self) -> Result<Box<dyn RefreshTokenTransaction>, AppError>;
}

/// Unit of work over refresh tokens
///
/// Rows returned by `find_by_hash_for_update` stay locked against other
/// transactions until this one commits or is dropped.
///
/// Every transaction that writes a user's tokens takes `lock_user` first,
/// before touching any token row. Writers for one user therefore run one
/// at a time and always lock in the same order.
#[async_trait]
pub trait RefreshTokenTransaction: Send {
    /// Owner of a token hash, read without locking. A token never changes
    /// owner, so the answer stays valid after the lock is taken.
    async fn find_owner(&mut self, token_hash: &str) -> Result<Option<Uuid>, AppError>;

    /// Hold the per-user write lock until commit or drop
    async fn lock_user(&mut self, user_id: Uuid) -> Result<(), AppError>;

    async fn find_by_hash_for_update(
        &mut self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` on a duplicate hash.
    async fn insert(&mut self, record: &RefreshTokenRecord) -> Result<(), AppError>;

    /// Flip `used` from false to true. Returns `false` if the row is gone
    /// or was already used.
    async fn mark_used(&mut self, id: Uuid) -> Result<bool, AppError>;

    async fn delete_by_hash(&mut self, token_hash: &str) -> Result<u64, AppError>;

    async fn delete_all_for_user(&mut self, user_id: Uuid) -> Result<u64, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
