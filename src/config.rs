use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Lifetime of a session that ends with the browser.
    pub ttl_minutes: i64,
    /// Lifetime of a "remember me" session.
    pub remember_ttl_minutes: i64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub avatar_dir: PathBuf,
    pub avatar_url_prefix: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET")?,
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "comunidade".into()),
            audience: std::env::var("SESSION_AUDIENCE")
                .unwrap_or_else(|_| "comunidade-web".into()),
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 12),
            remember_ttl_minutes: std::env::var("SESSION_REMEMBER_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
            cookie_secure: std::env::var("COOKIE_SECURE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        };
        let avatar_dir = std::env::var("AVATAR_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("static/fotos_perfil"));
        let avatar_url_prefix = std::env::var("AVATAR_URL_PREFIX")
            .unwrap_or_else(|_| "/static/fotos_perfil".into());
        Ok(Self {
            database_url,
            session,
            avatar_dir,
            avatar_url_prefix: avatar_url_prefix.trim_end_matches('/').to_string(),
        })
    }

    /// Public URL of an avatar file.
    pub fn avatar_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.avatar_url_prefix, file_name)
    }
}
