use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginFormView, LoginPage, LoginPageForm, NextQuery, PublicProfile, RegisterFormView,
            UsersPage,
        },
        extractors::{safe_next, CurrentUser},
        password::hash_password,
        repo_types::NewUser,
        session::{self, normalize_email, removal_cookie, AuthError, SESSION_COOKIE},
    },
    db::RepoError,
    error::AppResult,
    forms::{check_email, check_length, is_truthy, require, FieldErrors},
    state::AppState,
    view::{FlashLevel, Page},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login_submit))
        .route("/sair", get(logout))
}

pub fn users_routes() -> Router<AppState> {
    Router::new().route("/usuarios", get(list_users))
}

fn login_view(next: Option<String>) -> LoginPage {
    LoginPage {
        next,
        login_form: LoginFormView::default(),
        register_form: RegisterFormView::default(),
    }
}

#[instrument(skip_all)]
pub async fn login_page(Query(q): Query<NextQuery>) -> Page<LoginPage> {
    Page::new("login", login_view(q.next))
}

#[instrument(skip_all)]
pub async fn login_submit(
    State(state): State<AppState>,
    Query(q): Query<NextQuery>,
    jar: CookieJar,
    Form(form): Form<LoginPageForm>,
) -> AppResult<Response> {
    if form.submit_login.is_some() {
        return login(state, q, jar, form).await;
    }
    if form.submit_register.is_some() {
        return register(state, q, form).await;
    }
    Ok(Page::new("login", login_view(q.next)).into_response())
}

async fn login(
    state: AppState,
    q: NextQuery,
    jar: CookieJar,
    form: LoginPageForm,
) -> AppResult<Response> {
    let remember = form.remember.as_deref().is_some_and(is_truthy);
    let mut errors = FieldErrors::default();
    check_email(&mut errors, "email", &form.email);
    require(&mut errors, "password", &form.password);

    let mut view = login_view(q.next.clone());
    view.login_form = LoginFormView {
        email: form.email.clone(),
        remember,
        errors,
    };
    if !view.login_form.errors.is_empty() {
        return Ok(Page::new("login", view).into_response());
    }

    match session::login(&state, &form.email, &form.password, remember).await {
        Ok((user, issued)) => {
            let jar = jar.add(issued.cookie(state.config.session.cookie_secure));
            let target = safe_next(q.next.as_deref()).to_string();
            info!(user_id = %user.id, %target, "login redirect");
            Ok((jar, Redirect::to(&target)).into_response())
        }
        Err(AuthError::InvalidCredentials) => Ok(Page::new("login", view)
            .flash(
                FlashLevel::Danger,
                "Login failed. Incorrect email or password!",
            )
            .with_status(StatusCode::UNAUTHORIZED)
            .into_response()),
        Err(AuthError::Internal(e)) => Err(e.into()),
    }
}

async fn register(state: AppState, q: NextQuery, form: LoginPageForm) -> AppResult<Response> {
    let username = form.username.trim().to_string();
    let email = normalize_email(&form.email);

    let mut errors = FieldErrors::default();
    require(&mut errors, "username", &username);
    check_email(&mut errors, "email", &email);
    check_length(&mut errors, "password", &form.password, 6, 20);
    if form.confirm_password != form.password {
        errors.add("confirm_password", "Passwords must match.");
    }
    if errors.is_empty() {
        if state.users.find_by_email(&email).await?.is_some() {
            errors.add("email", "Email already registered. Sign up with another email or log in.");
        }
        if state.users.find_by_username(&username).await?.is_some() {
            errors.add("username", "Username already taken.");
        }
    }

    let mut view = login_view(q.next);
    view.register_form = RegisterFormView {
        username: username.clone(),
        email: email.clone(),
        errors,
    };
    if !view.register_form.errors.is_empty() {
        warn!(email = %email, "registration rejected");
        return Ok(Page::new("login", view).into_response());
    }

    let password_hash = hash_password(&form.password)?;
    let created = state
        .users
        .create(NewUser {
            username,
            email,
            password_hash,
        })
        .await;

    match created {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, "user registered");
            Ok(Redirect::to("/").into_response())
        }
        Err(RepoError::Conflict(field)) => {
            warn!(field, "registration hit unique constraint");
            view.register_form
                .errors
                .add(field, format!("This {field} is already registered."));
            Ok(Page::new("login", view).into_response())
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            Err(e.into())
        }
    }
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, Redirect)> {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    session::logout(&state, token.as_deref()).await?;
    Ok((jar.remove(removal_cookie()), Redirect::to("/")))
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> AppResult<Page<UsersPage>> {
    let users = state
        .users
        .list()
        .await?
        .iter()
        .map(|u| PublicProfile::from_user(u, &state.config))
        .collect();
    Ok(Page::new("usuarios", UsersPage { users }))
}

#[cfg(test)]
mod tests {
    use axum::http::{header, StatusCode};

    use crate::testing::{
        body_json, form_request, get, login_cookie, register, send, test_app, test_state,
    };

    #[tokio::test]
    async fn protected_page_redirects_to_login_then_back() {
        let (state, _dir) = test_state().await;
        register(&state, "ana", "ana@example.com", "secret123").await;
        let app = test_app(state);

        let res = send(&app, get("/usuarios", None)).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/login?next=/usuarios");

        let res = send(
            &app,
            form_request(
                "/login?next=/usuarios",
                "email=ana%40example.com&password=secret123&submit_login=Entrar",
                None,
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/usuarios");
        let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Max-Age"));

        let session = cookie.split(';').next().unwrap().to_string();
        let res = send(&app, get("/usuarios", Some(&session))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let page = body_json(res).await;
        assert_eq!(page["view"], "usuarios");
        assert_eq!(page["users"][0]["username"], "ana");
    }

    #[tokio::test]
    async fn remember_me_sets_persistent_cookie() {
        let (state, _dir) = test_state().await;
        register(&state, "ana", "ana@example.com", "secret123").await;
        let app = test_app(state);

        let res = send(
            &app,
            form_request(
                "/login",
                "email=ana%40example.com&password=secret123&remember=y&submit_login=Entrar",
                None,
            ),
        )
        .await;
        assert_eq!(res.headers()[header::LOCATION], "/");
        let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("Max-Age"));
    }

    #[tokio::test]
    async fn wrong_password_rerenders_with_flash_and_no_cookie() {
        let (state, _dir) = test_state().await;
        register(&state, "ana", "ana@example.com", "secret123").await;
        let app = test_app(state);

        let res = send(
            &app,
            form_request(
                "/login",
                "email=ana%40example.com&password=nope-nope&submit_login=Entrar",
                None,
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res.headers().get(header::SET_COOKIE).is_none());
        let page = body_json(res).await;
        assert_eq!(page["view"], "login");
        assert_eq!(page["flashes"][0]["level"], "alert-danger");
        assert_eq!(page["login_form"]["email"], "ana@example.com");
    }

    #[tokio::test]
    async fn open_redirects_are_ignored() {
        let (state, _dir) = test_state().await;
        register(&state, "ana", "ana@example.com", "secret123").await;
        let app = test_app(state);

        let res = send(
            &app,
            form_request(
                "/login?next=https://evil.example/",
                "email=ana%40example.com&password=secret123&submit_login=Entrar",
                None,
            ),
        )
        .await;
        assert_eq!(res.headers()[header::LOCATION], "/");
    }

    #[tokio::test]
    async fn next_with_control_characters_falls_back_to_home() {
        let (state, _dir) = test_state().await;
        register(&state, "ana", "ana@example.com", "secret123").await;
        let app = test_app(state);

        let res = send(
            &app,
            form_request(
                "/login?next=/usuarios%0Ax",
                "email=ana%40example.com&password=secret123&submit_login=Entrar",
                None,
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/");
        assert!(res.headers().contains_key(header::SET_COOKIE));
    }

    #[tokio::test]
    async fn registration_creates_user_and_rejects_duplicates() {
        let (state, _dir) = test_state().await;
        let app = test_app(state.clone());

        let body = "username=ana&email=Ana%40Example.com&password=secret123\
                    &confirm_password=secret123&submit_register=Criar";
        let res = send(&app, form_request("/login", body, None)).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/");

        let user = state.users.find_by_email("ana@example.com").await.unwrap().unwrap();
        assert_ne!(user.password_hash, "secret123");
        assert_eq!(user.avatar, "default.jpg");

        let res = send(&app, form_request("/login", body, None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let page = body_json(res).await;
        assert!(page["register_form"]["errors"]["email"].is_array());
        assert!(page["register_form"]["errors"]["username"].is_array());
    }

    #[tokio::test]
    async fn registration_validates_fields() {
        let (state, _dir) = test_state().await;
        let app = test_app(state);

        let body = "username=&email=bad&password=123&confirm_password=456&submit_register=Criar";
        let res = send(&app, form_request("/login", body, None)).await;
        let page = body_json(res).await;
        let errors = &page["register_form"]["errors"];
        for field in ["username", "email", "password", "confirm_password"] {
            assert!(errors[field].is_array(), "{field}");
        }
    }

    #[tokio::test]
    async fn logout_twice_is_harmless() {
        let (state, _dir) = test_state().await;
        register(&state, "ana", "ana@example.com", "secret123").await;
        let cookie = login_cookie(&state, "ana@example.com", "secret123").await;
        let app = test_app(state);

        let res = send(&app, get("/sair", Some(&cookie))).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/");
        let cleared = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cleared.starts_with("session="));

        // the old cookie no longer identifies anyone
        let res = send(&app, get("/sair", Some(&cookie))).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/login?next=/sair");
    }
}
