use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_AVATAR: &str = "default.jpg";

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub avatar: String,
    pub courses: String, // labels joined with ';'
    pub created_at: OffsetDateTime,
}

impl User {
    /// Course labels stored on the profile, in stored order.
    pub fn course_list(&self) -> Vec<&str> {
        self.courses.split(';').filter(|c| !c.is_empty()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Fields rewritten by a profile edit. `avatar` is left untouched when `None`.
#[derive(Debug, Clone)]
pub struct ProfileChanges {
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub courses: String,
}

/// Server-side half of a login session.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub remember: bool,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}
