use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{NewPost, Post, PostListRow};
use crate::db::{PgStore, RepoResult};

#[async_trait]
pub trait PostRepo: Send + Sync {
    /// All posts, newest first.
    async fn list_recent(&self) -> RepoResult<Vec<PostListRow>>;
    async fn find(&self, id: Uuid) -> RepoResult<Option<Post>>;
    async fn create(&self, post: NewPost) -> RepoResult<Post>;
    /// Rewrites title and body of a post owned by `author_id`. Returns
    /// `None` when no such post exists for that author.
    async fn update(
        &self,
        id: Uuid,
        author_id: Uuid,
        title: &str,
        body: &str,
    ) -> RepoResult<Option<Post>>;
}

#[async_trait]
impl PostRepo for PgStore {
    async fn list_recent(&self) -> RepoResult<Vec<PostListRow>> {
        let rows = sqlx::query_as::<_, PostListRow>(
            r#"
            SELECT p.id, p.author_id, p.title, p.body, p.created_at,
                   u.username AS author_username, u.avatar AS author_avatar
              FROM posts p
              JOIN users u ON u.id = p.author_id
             ORDER BY p.created_at DESC, p.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> RepoResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, title, body, created_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn create(&self, post: NewPost) -> RepoResult<Post> {
        let created = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, author_id, title, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, author_id, title, body, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.body)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update(
        &self,
        id: Uuid,
        author_id: Uuid,
        title: &str,
        body: &str,
    ) -> RepoResult<Option<Post>> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
               SET title = $3, body = $4
             WHERE id = $1 AND author_id = $2
            RETURNING id, author_id, title, body, created_at
            "#,
        )
        .bind(id)
        .bind(author_id)
        .bind(title)
        .bind(body)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(updated)
    }
}
