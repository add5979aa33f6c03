use std::env;

use thiserror::Error;

/// Two weeks, the usual lifetime of a login session.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60 * 24 * 14;
/// Upper bound for `SESSION_TTL_SECS`: one year.
pub const MAX_SESSION_TTL_SECS: u64 = 60 * 60 * 24 * 365;

const LOCAL_JWT_SECRET: &str = "blog-local-development-secret";
const LOCAL_DATABASE_URL: &str = "sqlite://blog.db?mode=rwc";

/// AppConfig
///
/// The whole runtime configuration, read once at startup and then shared immutably
/// through `AppState`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker.
    pub env: Env,
    // Accept the `x-user-id` header as a login. Only ever true in Env::Local.
    pub dev_auth_bypass: bool,
    // sqlx connection string for the SQLite store.
    pub db_url: String,
    // Address the HTTP server binds to.
    pub bind_addr: String,
    // HMAC secret used to sign and verify session tokens.
    pub jwt_secret: String,
    // Lifetime of a session token and of its cookie.
    pub session_ttl_secs: u64,
    // Account created at startup when both are set and the username is free.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

/// Env
///
/// Local is for development (pretty logs, optional header bypass); Production demands
/// every secret.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Default for AppConfig {
    /// Local settings with an in-memory database, safe to use from tests without
    /// touching the environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            dev_auth_bypass: false,
            db_url: "sqlite::memory:".to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            admin_username: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment.
    ///
    /// # Errors
    /// In production a missing `DATABASE_URL` or `BLOG_JWT_SECRET` is an error, so the
    /// server never starts with a guessable signing key. An unknown `APP_ENV` and a
    /// `SESSION_TTL_SECS` that is not a number between 1 and `MAX_SESSION_TTL_SECS`
    /// are errors in either environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV") {
            Ok(value) if value == "production" => Env::Production,
            Ok(value) if value == "local" => Env::Local,
            Ok(value) => {
                return Err(ConfigError::Invalid {
                    name: "APP_ENV",
                    value,
                });
            }
            Err(_) => Env::Local,
        };

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
                env::var("BLOG_JWT_SECRET").map_err(|_| ConfigError::Missing("BLOG_JWT_SECRET"))?,
            ),
            Env::Local => (
                env::var("DATABASE_URL").unwrap_or_else(|_| LOCAL_DATABASE_URL.to_string()),
                env::var("BLOG_JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        let session_ttl_secs = match env::var("SESSION_TTL_SECS") {
            Ok(value) => match value.parse::<u64>() {
                Ok(secs) if (1..=MAX_SESSION_TTL_SECS).contains(&secs) => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "SESSION_TTL_SECS",
                        value,
                    });
                }
            },
            Err(_) => DEFAULT_SESSION_TTL_SECS,
        };

        // Opt-in only, and never outside Local.
        let dev_auth_bypass = env == Env::Local
            && matches!(
                env::var("BLOG_DEV_AUTH_BYPASS").as_deref(),
                Ok("1") | Ok("true")
            );

        Ok(Self {
            env,
            dev_auth_bypass,
            db_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            jwt_secret,
            session_ttl_secs,
            admin_username: env::var("BLOG_ADMIN_USERNAME").ok(),
            admin_password: env::var("BLOG_ADMIN_PASSWORD").ok(),
        })
    }
}
