use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::model::{NewUser, User, UserRow};

/// Write rejected because `field` (`username` or `email`) already belongs to another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("A user with that {field} already exists.")]
pub struct UniqueViolation {
    pub field: &'static str,
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn create(&self, new: NewUser) -> anyhow::Result<User>;
    /// Persist profile fields and role of an existing user.
    async fn update(&self, user: &User) -> anyhow::Result<User>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    /// Page of users ordered by username, plus the total matching count.
    async fn list(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<User>, i64)>;
    async fn set_confirmation(
        &self,
        id: Uuid,
        code_hash: Option<String>,
        expires_at: Option<OffsetDateTime>,
    ) -> anyhow::Result<()>;
}

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, bio, role, \
     is_superuser, confirmation_code_hash, confirmation_expires_at, created_at";

/// `ILIKE` pattern matching `search` as a literal substring.
pub(crate) fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn write_error(e: sqlx::Error, what: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some(c) if c.contains("email") => "email",
                _ => "username",
            };
            return UniqueViolation { field }.into();
        }
    }
    anyhow::Error::new(e).context(what)
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find user by {column}"))?;
        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one("email", email).await
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, first_name, last_name, bio, role, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.bio)
            .bind(new.role.as_str())
            .bind(new.is_superuser)
            .fetch_one(&self.db)
            .await
            .map_err(|e| write_error(e, "insert user"))?;
        row.try_into()
    }

    async fn update(&self, user: &User) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET username = $2, email = $3, first_name = $4, last_name = $5,
                   bio = $6, role = $7, is_superuser = $8
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.bio)
            .bind(user.role.as_str())
            .bind(user.is_superuser)
            .fetch_one(&self.db)
            .await
            .map_err(|e| write_error(e, "update user"))?;
        row.try_into()
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }

    async fn list(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<User>, i64)> {
        let pattern = search.map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
              FROM users
             WHERE $1::text IS NULL OR username ILIKE $1 ESCAPE '\'
            "#,
        )
        .bind(pattern.as_deref())
        .fetch_one(&self.db)
        .await
        .context("count users")?;

        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE $1::text IS NULL OR username ILIKE $1 ESCAPE '\'
             ORDER BY username ASC
             LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(pattern.as_deref())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .context("list users")?;

        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((users, total))
    }

    async fn set_confirmation(
        &self,
        id: Uuid,
        code_hash: Option<String>,
        expires_at: Option<OffsetDateTime>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET confirmation_code_hash = $2, confirmation_expires_at = $3
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(code_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("store confirmation code")?;
        Ok(())
    }
}
