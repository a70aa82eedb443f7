use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::users::{
    model::{NewUser, User},
    repo::{UniqueViolation, UserRepo},
};

/// In-process user store with the same uniqueness rules as the `users` table.
#[derive(Default)]
pub struct MemoryUserRepo {
    users: RwLock<Vec<User>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_unique(users: &[User], id: Uuid, username: &str, email: &str) -> anyhow::Result<()> {
        for u in users.iter().filter(|u| u.id != id) {
            if u.username == username {
                return Err(UniqueViolation { field: "username" }.into());
            }
            if u.email == email {
                return Err(UniqueViolation { field: "email" }.into());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let mut users = self.users.write().await;
        let id = Uuid::new_v4();
        Self::ensure_unique(&users, id, &new.username, &new.email)?;
        let user = User {
            id,
            username: new.username,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            bio: new.bio,
            role: new.role,
            is_superuser: new.is_superuser,
            confirmation_code_hash: None,
            confirmation_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> anyhow::Result<User> {
        let mut users = self.users.write().await;
        Self::ensure_unique(&users, user.id, &user.username, &user.email)?;
        let stored = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| anyhow::anyhow!("user {} not found", user.id))?;
        stored.username = user.username.clone();
        stored.email = user.email.clone();
        stored.first_name = user.first_name.clone();
        stored.last_name = user.last_name.clone();
        stored.bio = user.bio.clone();
        stored.role = user.role;
        stored.is_superuser = user.is_superuser;
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() != before)
    }

    async fn list(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<User>, i64)> {
        let needle = search.map(str::to_lowercase);
        let users = self.users.read().await;
        let mut matching: Vec<User> = users
            .iter()
            .filter(|u| match &needle {
                Some(n) => u.username.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.username.cmp(&b.username));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn set_confirmation(
        &self,
        id: Uuid,
        code_hash: Option<String>,
        expires_at: Option<OffsetDateTime>,
    ) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| anyhow::anyhow!("user {id} not found"))?;
        user.confirmation_code_hash = code_hash;
        user.confirmation_expires_at = expires_at;
        Ok(())
    }
}
