use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use marquee_model::{User, UserRole};
use uuid::Uuid;

use super::MemoryStore;
use crate::database::ports::users::{
    SourceWrite, SourceWriteOutcome, UsersRepository,
};
use crate::error::{MarqueeError, Result};

#[derive(Debug, Clone)]
pub struct InMemoryUsersRepository {
    store: Arc<MemoryStore>,
}

impl InMemoryUsersRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    async fn modify<F>(&self, id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut User) + Send,
    {
        let mut users = self.store.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| MarqueeError::NotFound(format!("user {id}")))?;
        f(user);
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UsersRepository for InMemoryUsersRepository {
    async fn create_user(&self, user: &User) -> Result<()> {
        let mut users = self.store.users.write().await;
        if users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(MarqueeError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.store.users.read().await.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .store
            .users
            .read()
            .await
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> =
            self.store.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut users = self.store.users.write().await;
        match users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(MarqueeError::NotFound(format!("user {}", user.id))),
        }
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<()> {
        self.modify(id, |user| user.role = role).await
    }

    async fn set_image(&self, id: Uuid, image: Option<String>) -> Result<()> {
        self.modify(id, |user| user.image = image).await
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let removed = self.store.users.write().await.remove(&id).is_some();
        if removed {
            self.store
                .watch_history
                .write()
                .await
                .retain(|key, _| key.user_id != id);
            self.store
                .watchlist
                .write()
                .await
                .retain(|_, entry| entry.user_id != id);
            self.store
                .folders
                .write()
                .await
                .retain(|_, folder| folder.user_id != id);
        }
        Ok(removed)
    }

    async fn write_last_used_source(
        &self,
        id: Uuid,
        write: &SourceWrite,
    ) -> Result<SourceWriteOutcome> {
        let mut users = self.store.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(SourceWriteOutcome::UserMissing);
        };
        if !write.may_overwrite(user) {
            return Ok(SourceWriteOutcome::Rejected);
        }
        write.apply_to(user);
        Ok(SourceWriteOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_model::AuthProvider;

    fn repo() -> InMemoryUsersRepository {
        InMemoryUsersRepository::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn emails_are_unique_case_insensitively() {
        let repo = repo();
        let user =
            User::new("Ada@Example.com", None, None, AuthProvider::Google);
        repo.create_user(&user).await.unwrap();

        let dup =
            User::new("ada@example.com", None, None, AuthProvider::Google);
        assert!(matches!(
            repo.create_user(&dup).await,
            Err(MarqueeError::Conflict(_))
        ));
        assert_eq!(
            repo.get_user_by_email("ADA@example.com")
                .await
                .unwrap()
                .map(|u| u.id),
            Some(user.id)
        );
    }

    #[tokio::test]
    async fn set_role_on_missing_user_is_not_found() {
        let repo = repo();
        assert!(matches!(
            repo.set_role(Uuid::new_v4(), UserRole::Admin).await,
            Err(MarqueeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn source_write_reports_missing_user() {
        let repo = repo();
        let write = SourceWrite {
            source: "videasy".into(),
            at: Utc::now(),
            explicit: true,
        };
        assert_eq!(
            repo.write_last_used_source(Uuid::new_v4(), &write)
                .await
                .unwrap(),
            SourceWriteOutcome::UserMissing
        );
    }
}
