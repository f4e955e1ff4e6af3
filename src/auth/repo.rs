use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, ProfileChanges, SessionRecord, User, DEFAULT_AVATAR};
use crate::db::{PgStore, RepoResult};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn list(&self) -> RepoResult<Vec<User>>;
    async fn create(&self, user: NewUser) -> RepoResult<User>;
    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> RepoResult<User>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &SessionRecord) -> RepoResult<()>;
    async fn find(&self, id: Uuid) -> RepoResult<Option<SessionRecord>>;
    /// Removing a missing session is not an error.
    async fn delete(&self, id: Uuid) -> RepoResult<()>;
    /// Drops the user's sessions that expired before `now`.
    async fn delete_expired(&self, user_id: Uuid, now: OffsetDateTime) -> RepoResult<u64>;
}

const USER_COLUMNS: &str = "id, username, email, password_hash, avatar, courses, created_at";

#[async_trait]
impl UserRepo for PgStore {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list(&self) -> RepoResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn create(&self, user: NewUser) -> RepoResult<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, avatar, courses)
            VALUES ($1, $2, $3, $4, $5, '')
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(DEFAULT_AVATAR)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> RepoResult<User> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET username = $2,
                   email = $3,
                   avatar = COALESCE($4, avatar),
                   courses = $5
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(changes.avatar.as_deref())
        .bind(&changes.courses)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(updated)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert(&self, session: &SessionRecord) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, remember, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.remember)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> RepoResult<Option<SessionRecord>> {
        let session = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, user_id, remember, expires_at, created_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired(&self, user_id: Uuid, now: OffsetDateTime) -> RepoResult<u64> {
        let done = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND expires_at < $2")
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }
}
