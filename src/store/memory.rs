/// In-process store
///
/// A refresh token transaction holds the table mutex for its whole lifetime
/// and edits a staged copy; `commit` swaps the copy in. That makes every
/// transaction serialisable, and a dropped transaction leaves no trace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::error::{AppError, DatabaseError, USERS_EMAIL_CONSTRAINT};
use crate::store::{
    NewUser, RefreshTokenRecord, RefreshTokenStore, RefreshTokenTransaction, User, UserStore,
};

type RefreshTokenTable = HashMap<String, RefreshTokenRecord>;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    refresh_tokens: Arc<Mutex<RefreshTokenTable>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed refresh tokens belonging to `user_id`
    pub async fn refresh_tokens_for_user(&self, user_id: Uuid) -> Vec<RefreshTokenRecord> {
        self.refresh_tokens
            .lock()
            .await
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.lock().await.len()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write().await;

        if users.values().any(|user| user.email == new_user.email) {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                USERS_EMAIL_CONSTRAINT.to_string(),
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            name: new_user.name,
            password_hash: new_user.password_hash,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn RefreshTokenTransaction>, AppError> {
        let guard = self.refresh_tokens.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, staged }))
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<RefreshTokenTable>,
    staged: RefreshTokenTable,
}

#[async_trait]
impl RefreshTokenTransaction for InMemoryTransaction {
    async fn find_owner(&mut self, token_hash: &str) -> Result<Option<Uuid>, AppError> {
        Ok(self.staged.get(token_hash).map(|record| record.user_id))
    }

    // the table mutex already serialises every transaction
    async fn lock_user(&mut self, _user_id: Uuid) -> Result<(), AppError> {
        Ok(())
    }

    async fn find_by_hash_for_update(
        &mut self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        Ok(self.staged.get(token_hash).cloned())
    }

    async fn insert(&mut self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        if self.staged.contains_key(&record.token_hash) {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "refresh_tokens_token_hash_key".to_string(),
            )));
        }
        self.staged.insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn mark_used(&mut self, id: Uuid) -> Result<bool, AppError> {
        match self.staged.values_mut().find(|record| record.id == id) {
            Some(record) if !record.used => {
                record.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_by_hash(&mut self, token_hash: &str) -> Result<u64, AppError> {
        Ok(self.staged.remove(token_hash).map_or(0, |_| 1))
    }

    async fn delete_all_for_user(&mut self, user_id: Uuid) -> Result<u64, AppError> {
        let before = self.staged.len();
        self.staged.retain(|_, record| record.user_id != user_id);
        Ok((before - self.staged.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let InMemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
