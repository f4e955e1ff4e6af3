use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::SessionClaims,
        password::verify_password,
        repo_types::{SessionRecord, User},
    },
    config::SessionConfig,
    db::RepoError,
    state::AppState,
};

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RepoError> for AuthError {
    fn from(e: RepoError) -> Self {
        AuthError::Internal(e.into())
    }
}

/// Signing and verification keys for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: TimeDuration,
    remember_ttl: TimeDuration,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let SessionConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
            remember_ttl_minutes,
            ..
        } = state.config.session.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: TimeDuration::minutes(ttl_minutes),
            remember_ttl: TimeDuration::minutes(remember_ttl_minutes),
        }
    }
}

impl SessionKeys {
    pub fn ttl_for(&self, remember: bool) -> TimeDuration {
        if remember {
            self.remember_ttl
        } else {
            self.ttl
        }
    }

    pub fn sign(&self, session: &SessionRecord) -> anyhow::Result<String> {
        let claims = SessionClaims {
            sub: session.user_id,
            sid: session.id,
            iat: session.created_at.unix_timestamp() as usize,
            exp: session.expires_at.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            remember: session.remember,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %session.user_id, session_id = %session.id, "session token signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<SessionClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// A freshly established session, ready to be handed to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub id: Uuid,
    pub token: String,
    pub remember: bool,
    pub expires_at: OffsetDateTime,
    pub max_age: TimeDuration,
}

impl IssuedSession {
    /// Cookie carrying the token. Only remembered sessions get a `Max-Age`;
    /// the others end with the browser.
    pub fn cookie(&self, secure: bool) -> Cookie<'static> {
        let mut builder = Cookie::build((SESSION_COOKIE, self.token.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(secure);
        if self.remember {
            builder = builder.max_age(self.max_age);
        }
        builder.build()
    }
}

/// Cookie that clears the session on the client.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[instrument(skip(state, password))]
pub async fn login(
    state: &AppState,
    email: &str,
    password: &str,
    remember: bool,
) -> Result<(User, IssuedSession), AuthError> {
    let email = normalize_email(email);
    let user = match state.users.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    if !verify_password(password, &user.password_hash) {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let keys = SessionKeys::from_ref(state);
    let now = OffsetDateTime::now_utc();
    let max_age = keys.ttl_for(remember);
    let record = SessionRecord {
        id: Uuid::new_v4(),
        user_id: user.id,
        remember,
        expires_at: now + max_age,
        created_at: now,
    };
    let purged = state.sessions.delete_expired(user.id, now).await?;
    if purged > 0 {
        debug!(user_id = %user.id, purged, "expired sessions removed");
    }
    state.sessions.insert(&record).await?;
    let token = keys.sign(&record)?;

    info!(user_id = %user.id, session_id = %record.id, remember, "user logged in");
    Ok((
        user,
        IssuedSession {
            id: record.id,
            token,
            remember,
            expires_at: record.expires_at,
            max_age,
        },
    ))
}

/// Ends the session behind `token`. Missing, invalid or already ended
/// sessions are left alone.
#[instrument(skip(state, token))]
pub async fn logout(state: &AppState, token: Option<&str>) -> anyhow::Result<()> {
    let Some(token) = token else {
        return Ok(());
    };
    let keys = SessionKeys::from_ref(state);
    match keys.verify(token) {
        Ok(claims) => {
            state.sessions.delete(claims.sid).await?;
            info!(user_id = %claims.sub, session_id = %claims.sid, "user logged out");
        }
        Err(e) => debug!(error = %e, "logout with unusable token"),
    }
    Ok(())
}

/// Resolves the user behind a session token, or `None` when the token is
/// invalid, the session has ended, or the user no longer exists.
pub async fn current_user(state: &AppState, token: &str) -> anyhow::Result<Option<User>> {
    let keys = SessionKeys::from_ref(state);
    let claims = match keys.verify(token) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "rejected session token");
            return Ok(None);
        }
    };

    let Some(session) = state.sessions.find(claims.sid).await? else {
        debug!(session_id = %claims.sid, "session not found");
        return Ok(None);
    };
    if session.user_id != claims.sub || session.expires_at <= OffsetDateTime::now_utc() {
        debug!(session_id = %claims.sid, "session expired or mismatched");
        return Ok(None);
    }

    Ok(state.users.find_by_id(claims.sub).await?)
}
