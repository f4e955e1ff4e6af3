use super::repo_types::Post;
use crate::auth::repo_types::User;

/// Whether `current` may edit `post`: only its author can.
pub fn can_mutate(current: Option<&User>, post: &Post) -> bool {
    current.is_some_and(|user| user.id == post.author_id)
}
