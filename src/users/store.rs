use async_trait::async_trait;
use thiserror::Error;

use crate::users::repo_types::{NewUser, UnknownRole, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already exists")]
    DuplicateEmail,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt user row: {0}")]
    Corrupt(#[from] UnknownRole),
}

/// Persistence for user records. Implementations must enforce email
/// uniqueness among non-deleted users themselves and report a violation as
/// [`StoreError::DuplicateEmail`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;
    /// Writes email, password hash and role of `user`. Returns `None` when the
    /// row no longer exists.
    async fn update(&self, user: &User) -> Result<Option<User>, StoreError>;
    /// Hard delete. Returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
    /// One page ordered by id, plus the total number of users.
    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), StoreError>;
}

#[cfg(test)]
pub mod memory {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use tokio::sync::RwLock;

    use super::{StoreError, UserStore};
    use crate::users::repo_types::{NewUser, User};

    /// In-process store with the same uniqueness rules as the users table.
    #[derive(Default)]
    pub struct MemoryUserStore {
        inner: RwLock<Inner>,
    }

    #[derive(Default)]
    struct Inner {
        next_id: i64,
        rows: BTreeMap<i64, User>,
    }

    impl Inner {
        fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
            self.rows.values().any(|u| {
                u.deleted_at.is_none() && u.email == email && Some(u.id) != except
            })
        }
    }

    impl MemoryUserStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            let inner = self.inner.read().await;
            Ok(inner
                .rows
                .values()
                .find(|u| u.deleted_at.is_none() && u.email == email)
                .cloned())
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
            let inner = self.inner.read().await;
            Ok(inner
                .rows
                .get(&id)
                .filter(|u| u.deleted_at.is_none())
                .cloned())
        }

        async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
            let mut inner = self.inner.write().await;
            if inner.email_taken(&new_user.email, None) {
                return Err(StoreError::DuplicateEmail);
            }
            inner.next_id += 1;
            let now = OffsetDateTime::now_utc();
            let user = User {
                id: inner.next_id,
                email: new_user.email,
                password_hash: new_user.password_hash,
                role: new_user.role,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            inner.rows.insert(user.id, user.clone());
            Ok(user)
        }

        async fn update(&self, user: &User) -> Result<Option<User>, StoreError> {
            let mut inner = self.inner.write().await;
            if inner.email_taken(&user.email, Some(user.id)) {
                return Err(StoreError::DuplicateEmail);
            }
            let Some(row) = inner.rows.get_mut(&user.id).filter(|u| u.deleted_at.is_none())
            else {
                return Ok(None);
            };
            row.email = user.email.clone();
            row.password_hash = user.password_hash.clone();
            row.role = user.role;
            row.updated_at = OffsetDateTime::now_utc();
            Ok(Some(row.clone()))
        }

        async fn delete(&self, id: i64) -> Result<bool, StoreError> {
            let mut inner = self.inner.write().await;
            Ok(inner.rows.remove(&id).is_some())
        }

        async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), StoreError> {
            let inner = self.inner.read().await;
            let live: Vec<&User> = inner
                .rows
                .values()
                .filter(|u| u.deleted_at.is_none())
                .collect();
            let total = live.len() as i64;
            let page = live
                .into_iter()
                .skip(offset.max(0) as usize)
                .take(limit.max(0) as usize)
                .cloned()
                .collect();
            Ok((page, total))
        }
    }

    mod tests {
        use super::*;
        use crate::users::repo_types::Role;

        fn new_user(email: &str) -> NewUser {
            NewUser {
                email: email.into(),
                password_hash: "hash".into(),
                role: Role::User,
            }
        }

        #[tokio::test]
        async fn create_enforces_unique_email() {
            let store = MemoryUserStore::new();
            let first = store.create(new_user("a@x.com")).await.expect("first");
            assert_eq!(first.id, 1);
            let err = store.create(new_user("a@x.com")).await.unwrap_err();
            assert!(matches!(err, StoreError::DuplicateEmail));
        }

        #[tokio::test]
        async fn update_rejects_email_of_other_user() {
            let store = MemoryUserStore::new();
            store.create(new_user("a@x.com")).await.unwrap();
            let mut b = store.create(new_user("b@x.com")).await.unwrap();
            b.email = "a@x.com".into();
            let err = store.update(&b).await.unwrap_err();
            assert!(matches!(err, StoreError::DuplicateEmail));
        }

        #[tokio::test]
        async fn delete_then_lookup_is_none() {
            let store = MemoryUserStore::new();
            let a = store.create(new_user("a@x.com")).await.unwrap();
            assert!(store.delete(a.id).await.unwrap());
            assert!(!store.delete(a.id).await.unwrap());
            assert!(store.find_by_id(a.id).await.unwrap().is_none());
        }
    }
}
