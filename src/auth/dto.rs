use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{auth::repo_types::User, config::AppConfig, forms::FieldErrors};

/// Query string of the login page.
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Body of `POST /login`. The page carries two forms; the submit button
/// that was pressed decides which one is processed.
#[derive(Debug, Default, Deserialize)]
pub struct LoginPageForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub remember: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub confirm_password: String,
    pub submit_login: Option<String>,
    pub submit_register: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct LoginFormView {
    pub email: String,
    pub remember: bool,
    pub errors: FieldErrors,
}

#[derive(Debug, Default, Serialize)]
pub struct RegisterFormView {
    pub username: String,
    pub email: String,
    pub errors: FieldErrors,
}

#[derive(Debug, Serialize)]
pub struct LoginPage {
    pub next: Option<String>,
    pub login_form: LoginFormView,
    pub register_form: RegisterFormView,
}

/// Public part of a user shown on profile and listing pages.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar_url: String,
    pub courses: Vec<String>,
}

impl PublicProfile {
    pub fn from_user(user: &User, config: &AppConfig) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            avatar_url: config.avatar_url(&user.avatar),
            courses: user.course_list().into_iter().map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UsersPage {
    pub users: Vec<PublicProfile>,
}
