use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreatePostPage, PostForm, PostFormView, PostPage, PostView},
    repo_types::{NewPost, Post},
    services::can_mutate,
};
use crate::{
    auth::{
        extractors::{CurrentUser, MaybeUser},
        repo_types::User,
    },
    error::{AppError, AppResult},
    state::AppState,
    view::Page,
};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/post/:id", get(show_post))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/post/criar", get(create_post_page).post(create_post))
        .route("/post/editar/:id", get(edit_post_page).post(edit_post))
}

/// Loads a post and its author, or 404.
async fn load(state: &AppState, id: Uuid) -> AppResult<(Post, User)> {
    let post = state.posts.find(id).await?.ok_or(AppError::NotFound)?;
    let author = state
        .users
        .find_by_id(post.author_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("post {id} has no author")))?;
    Ok((post, author))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_post_page(CurrentUser(user): CurrentUser) -> Page<CreatePostPage> {
    Page::new(
        "criarpost",
        CreatePostPage {
            form: PostFormView::default(),
        },
    )
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    if let Err(errors) = form.validate() {
        return Ok(Page::new(
            "criarpost",
            CreatePostPage {
                form: PostFormView::rejected(form, errors),
            },
        )
        .into_response());
    }

    let post = state
        .posts
        .create(NewPost {
            author_id: user.id,
            title: form.title.trim().to_string(),
            body: form.body,
        })
        .await?;
    info!(post_id = %post.id, "post created");
    Ok(Redirect::to("/").into_response())
}

#[instrument(skip(state, viewer))]
pub async fn show_post(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<Uuid>,
) -> AppResult<Page<PostPage>> {
    let (post, author) = load(&state, id).await?;
    let form = can_mutate(viewer.as_ref(), &post).then(|| PostFormView::prefilled(&post));
    Ok(Page::new(
        "post",
        PostPage {
            post: PostView::new(&post, &author, &state.config),
            form,
        },
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn edit_post_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Page<PostPage>> {
    let (post, author) = load(&state, id).await?;
    let form = can_mutate(Some(&user), &post).then(|| PostFormView::prefilled(&post));
    Ok(Page::new(
        "editarpost",
        PostPage {
            post: PostView::new(&post, &author, &state.config),
            form,
        },
    ))
}

#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn edit_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let (post, author) = load(&state, id).await?;

    if !can_mutate(Some(&user), &post) {
        warn!(post_id = %post.id, author_id = %post.author_id, "edit by non-author ignored");
        return Ok(Page::new(
            "editarpost",
            PostPage {
                post: PostView::new(&post, &author, &state.config),
                form: None,
            },
        )
        .into_response());
    }

    if let Err(errors) = form.validate() {
        return Ok(Page::new(
            "editarpost",
            PostPage {
                post: PostView::new(&post, &author, &state.config),
                form: Some(PostFormView::rejected(form, errors)),
            },
        )
        .into_response());
    }

    let updated = state
        .posts
        .update(post.id, user.id, form.title.trim(), &form.body)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(post_id = %updated.id, "post updated");
    Ok(Redirect::to("/").into_response())
}
