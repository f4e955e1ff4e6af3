use axum::{extract::State, routing::get, Router};
use serde::Serialize;
use tracing::instrument;

use crate::{
    auth::{dto::PublicProfile, extractors::MaybeUser},
    error::AppResult,
    posts::dto::PostView,
    state::AppState,
    view::Page,
};

#[derive(Debug, Serialize)]
pub struct HomePage {
    pub current_user: Option<PublicProfile>,
    pub posts: Vec<PostView>,
}

#[derive(Debug, Serialize)]
pub struct Empty {}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/contato", get(contact))
}

#[instrument(skip_all)]
pub async fn home(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
) -> AppResult<Page<HomePage>> {
    let posts = state
        .posts
        .list_recent()
        .await?
        .into_iter()
        .map(|row| PostView::from_row(row, &state.config))
        .collect();
    Ok(Page::new(
        "home",
        HomePage {
            current_user: viewer.map(|u| PublicProfile::from_user(&u, &state.config)),
            posts,
        },
    ))
}

pub async fn contact() -> Page<Empty> {
    Page::new("contato", Empty {})
}
