use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderValue, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::error;

use super::{
    repo_types::User,
    session::{current_user, SESSION_COOKIE},
};
use crate::{error::AppError, state::AppState};

/// The logged-in user. Requests without a valid session are redirected to
/// the login page with a `next` hint pointing back at the original target.
pub struct CurrentUser(pub User);

/// The logged-in user if any, for pages that are public.
pub struct MaybeUser(pub Option<User>);

async fn resolve(parts: &mut Parts, state: &AppState) -> Result<Option<User>, Response> {
    let jar = CookieJar::from_headers(&parts.headers);
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    current_user(state, cookie.value()).await.map_err(|e| {
        error!(error = %e, "current_user failed");
        AppError::Internal(e).into_response()
    })
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                let target = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                Err(Redirect::to(&login_url(target)).into_response())
            }
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve(parts, state).await?))
    }
}

/// `/login?next=<target>`, keeping path separators readable.
pub fn login_url(target: &str) -> String {
    let next = urlencoding::encode(target).replace("%2F", "/");
    format!("/login?next={next}")
}

/// Only same-site paths are honored as post-login destinations.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if is_local_path(n) => n,
        _ => "/",
    }
}

/// A path-only URI that is also usable as a `Location` header value.
fn is_local_path(n: &str) -> bool {
    if !n.starts_with('/') || n.starts_with("//") || n.contains('\\') {
        return false;
    }
    if HeaderValue::from_str(n).is_err() {
        return false;
    }
    matches!(Uri::try_from(n), Ok(uri) if uri.scheme().is_none() && uri.authority().is_none())
}
