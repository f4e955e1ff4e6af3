use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Post, PostListRow};
use crate::{
    auth::repo_types::User,
    config::AppConfig,
    forms::{check_length, require, FieldErrors},
};

/// Body of the create and edit post forms.
#[derive(Debug, Default, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl PostForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        check_length(&mut errors, "title", self.title.trim(), 2, 140);
        require(&mut errors, "body", &self.body);
        errors.into_result()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct PostFormView {
    pub title: String,
    pub body: String,
    pub errors: FieldErrors,
}

impl PostFormView {
    pub fn prefilled(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            body: post.body.clone(),
            errors: FieldErrors::default(),
        }
    }

    pub fn rejected(form: PostForm, errors: FieldErrors) -> Self {
        Self {
            title: form.title,
            body: form.body,
            errors,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorView {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: String,
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author: AuthorView,
}

impl PostView {
    pub fn from_row(row: PostListRow, config: &AppConfig) -> Self {
        Self {
            id: row.id,
            title: row.title,
            body: row.body,
            created_at: row.created_at,
            author: AuthorView {
                id: row.author_id,
                username: row.author_username,
                avatar_url: config.avatar_url(&row.author_avatar),
            },
        }
    }

    pub fn new(post: &Post, author: &User, config: &AppConfig) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            body: post.body.clone(),
            created_at: post.created_at,
            author: AuthorView {
                id: author.id,
                username: author.username.clone(),
                avatar_url: config.avatar_url(&author.avatar),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatePostPage {
    pub form: PostFormView,
}

/// Post page, also used for the edit page. `form` is present only for the
/// post's author.
#[derive(Debug, Serialize)]
pub struct PostPage {
    pub post: PostView,
    pub form: Option<PostFormView>,
}
