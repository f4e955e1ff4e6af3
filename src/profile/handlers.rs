use std::collections::HashSet;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tracing::{error, info, instrument, warn};

use super::{
    courses::{find_by_field, join_checked, COURSES},
    dto::{EditProfilePage, ProfileForm, ProfileFormView, ProfilePage},
};
use crate::{
    auth::{
        dto::PublicProfile,
        extractors::CurrentUser,
        repo_types::{ProfileChanges, User},
        session::normalize_email,
    },
    db::RepoError,
    error::{AppError, AppResult},
    forms::{check_email, is_truthy, require, FieldErrors},
    images::services::{format_from_extension, store_avatar, AvatarUpload, ImageError},
    state::AppState,
    view::{FlashLevel, Page},
};

const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/perfil", get(show_profile))
        .route("/perfil/editar", get(edit_profile_page).post(edit_profile))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Page<ProfilePage> {
    Page::new(
        "perfil",
        ProfilePage {
            user: PublicProfile::from_user(&user, &state.config),
        },
    )
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn edit_profile_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Page<EditProfilePage> {
    Page::new(
        "editarperfil",
        EditProfilePage {
            avatar_url: state.config.avatar_url(&user.avatar),
            form: ProfileFormView::from_user(&user),
        },
    )
}

fn rejected(
    state: &AppState,
    user: &User,
    form: &ProfileForm,
    errors: FieldErrors,
) -> Page<EditProfilePage> {
    Page::new(
        "editarperfil",
        EditProfilePage {
            avatar_url: state.config.avatar_url(&user.avatar),
            form: ProfileFormView::from_submission(form, errors),
        },
    )
}

async fn read_form(mut mp: Multipart) -> AppResult<ProfileForm> {
    let mut form = ProfileForm {
        username: String::new(),
        email: String::new(),
        avatar: None,
        checked: HashSet::new(),
    };
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "username" => form.username = field.text().await.map_err(bad_request)?,
            "email" => form.email = field.text().await.map_err(bad_request)?,
            "avatar" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let body = field.bytes().await.map_err(bad_request)?;
                // browsers send an empty part when no file was chosen
                if !file_name.is_empty() && !body.is_empty() {
                    form.avatar = Some(AvatarUpload { file_name, body });
                }
            }
            other => {
                if let Some(course) = find_by_field(other) {
                    let value = field.text().await.map_err(bad_request)?;
                    if is_truthy(&value) {
                        form.checked.insert(course.field);
                    }
                }
            }
        }
    }
    Ok(form)
}

fn bad_request(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(e.to_string())
}

async fn validate(state: &AppState, user: &User, form: &ProfileForm) -> AppResult<FieldErrors> {
    let mut errors = FieldErrors::default();
    require(&mut errors, "username", &form.username);
    check_email(&mut errors, "email", &form.email);
    if let Some(avatar) = &form.avatar {
        let ext = avatar.file_name.rsplit_once('.').map(|(_, e)| e).unwrap_or_default();
        if format_from_extension(ext).is_none() {
            errors.add("avatar", "Only jpg and png images are allowed.");
        }
    }
    if !errors.is_empty() {
        return Ok(errors);
    }

    if form.email != user.email {
        if let Some(other) = state.users.find_by_email(&form.email).await? {
            if other.id != user.id {
                errors.add("email", "Email already registered to another user.");
            }
        }
    }
    if form.username != user.username {
        if let Some(other) = state.users.find_by_username(&form.username).await? {
            if other.id != user.id {
                errors.add("username", "Username already taken.");
            }
        }
    }
    Ok(errors)
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn edit_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Multipart,
) -> AppResult<Response> {
    let mut form = read_form(mp).await?;
    form.username = form.username.trim().to_string();
    form.email = normalize_email(&form.email);

    let errors = validate(&state, &user, &form).await?;
    if !errors.is_empty() {
        return Ok(rejected(&state, &user, &form, errors).into_response());
    }

    let courses = join_checked(COURSES, |c| form.checked.contains(c.field));

    let avatar = match form.avatar.take() {
        None => None,
        Some(upload) => match store_avatar(state.storage.as_ref(), upload).await {
            Ok(name) => Some(name),
            Err(e) => {
                let (status, message) = match &e {
                    ImageError::UnsupportedFormat => (
                        StatusCode::UNSUPPORTED_MEDIA_TYPE,
                        "The photo could not be read as an image.",
                    ),
                    ImageError::Io(err) => {
                        error!(error = ?err, "avatar store failed");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "Could not save the photo. Please try again.",
                        )
                    }
                };
                return Ok(rejected(&state, &user, &form, FieldErrors::default())
                    .flash(FlashLevel::Danger, message)
                    .with_status(status)
                    .into_response());
            }
        },
    };

    let changes = ProfileChanges {
        username: form.username.clone(),
        email: form.email.clone(),
        avatar: avatar.clone(),
        courses,
    };
    match state.users.update_profile(user.id, changes).await {
        Ok(updated) => {
            info!(courses = %updated.courses, avatar = %updated.avatar, "profile updated");
            Ok(Redirect::to("/perfil").into_response())
        }
        Err(e) => {
            if let Some(name) = &avatar {
                if let Err(del) = state.storage.delete_object(name).await {
                    warn!(error = %del, file_name = %name, "orphan avatar left behind");
                }
            }
            match e {
                RepoError::Conflict(field) => {
                    let mut errors = FieldErrors::default();
                    errors.add(field, format!("This {field} is already registered."));
                    Ok(rejected(&state, &user, &form, errors).into_response())
                }
                other => Err(other.into()),
            }
        }
    }
}
