use std::collections::HashSet;

use serde::Serialize;

use super::courses::{Course, COURSES};
use crate::{
    auth::{dto::PublicProfile, repo_types::User},
    forms::FieldErrors,
    images::services::AvatarUpload,
};

/// Submitted profile form, parsed from multipart.
pub struct ProfileForm {
    pub username: String,
    pub email: String,
    pub avatar: Option<AvatarUpload>,
    /// Fields of the checked course boxes.
    pub checked: HashSet<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct CourseCheckbox {
    pub field: &'static str,
    pub label: &'static str,
    pub checked: bool,
}

#[derive(Debug, Serialize)]
pub struct ProfileFormView {
    pub username: String,
    pub email: String,
    pub courses: Vec<CourseCheckbox>,
    pub errors: FieldErrors,
}

impl ProfileFormView {
    /// Form pre-filled from the stored profile.
    pub fn from_user(user: &User) -> Self {
        let stored = user.course_list();
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            courses: checkboxes(|c| stored.contains(&c.label)),
            errors: FieldErrors::default(),
        }
    }

    /// Form echoing a rejected submission.
    pub fn from_submission(form: &ProfileForm, errors: FieldErrors) -> Self {
        Self {
            username: form.username.clone(),
            email: form.email.clone(),
            courses: checkboxes(|c| form.checked.contains(c.field)),
            errors,
        }
    }
}

fn checkboxes(is_checked: impl Fn(&Course) -> bool) -> Vec<CourseCheckbox> {
    COURSES
        .iter()
        .map(|c| CourseCheckbox {
            field: c.field,
            label: c.label,
            checked: is_checked(c),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ProfilePage {
    pub user: PublicProfile,
}

#[derive(Debug, Serialize)]
pub struct EditProfilePage {
    pub avatar_url: String,
    pub form: ProfileFormView,
}
