use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    repository::RepositoryState,
};

/// Where unauthenticated visitors of login-gated pages are sent.
pub const LOGIN_URL: &str = "/accounts/login/";
/// Name of the cookie that carries the session token.
pub const SESSION_COOKIE: &str = "blog_session";

/// Claims
///
/// Payload of the session JWT handed out by the login form.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the `users.id` of the logged-in account.
    pub sub: i64,
    /// Expiration Time (exp): seconds since the epoch after which the session is dead.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of a request that passed the login check.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument (and by the `require_login` middleware).
///
/// Resolution order:
/// 1. Local Bypass: in `Env::Local` with `dev_auth_bypass` switched on, an `x-user-id`
///    header naming an existing user is accepted.
/// 2. `Authorization: Bearer <jwt>`.
/// 3. The `blog_session` cookie set by the login form.
///
/// Whatever token is found, its subject must still exist in the `users` table.
///
/// Rejection: `AppError::AuthenticationRequired`, which answers with a 302 to the login
/// page carrying the requested path as `next`.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let next = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        let denied = || AppError::AuthenticationRequired { next: next.clone() };

        if config.env == Env::Local && config.dev_auth_bypass {
            let bypass = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|id| id.parse::<i64>().ok());
            if let Some(user_id) = bypass {
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(AuthUser {
                        id: user.id,
                        username: user.username,
                    });
                }
            }
        }

        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_value(&parts.headers, SESSION_COOKIE))
            .ok_or_else(denied)?;

        let claims = match decode_token(&config, token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                return Err(denied());
            }
        };

        // The account may have been removed after the token was issued.
        let user = repo.get_user(claims.sub).await?.ok_or_else(denied)?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
        })
    }
}

/// login_url
///
/// Builds `/accounts/login/?next=<path>`. Slashes stay readable, every other reserved
/// character in `next` is percent-encoded.
pub fn login_url(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{}?next={}", LOGIN_URL, encoded.replace("%2F", "/"))
}

/// safe_next
///
/// Only same-site absolute paths are honoured as post-login targets; anything else
/// (including protocol-relative `//host` URLs) falls back to the post list.
/// Control characters are refused outright: browsers drop tabs and newlines while
/// parsing a `Location`, which would turn `/\t/host` into `//host`.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(|c| c.is_control()) =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

pub fn issue_token(config: &AppConfig, user_id: i64) -> Result<String, AppError> {
    let now = Utc::now().timestamp().max(0) as usize;
    let ttl = usize::try_from(config.session_ttl_secs).unwrap_or(usize::MAX);
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now.saturating_add(ttl),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn decode_token(config: &AppConfig, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Set-Cookie value for a fresh session.
pub fn session_cookie(token: &str, max_age_secs: u64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

/// Set-Cookie value that expires the session immediately.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

// --- Password Hashing ---

/// hash_password
///
/// Salted SHA-256, stored as `salt$hexdigest` with a random UUID as salt.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, hex::encode(digest(&salt, password)))
}

/// verify_password
///
/// Recomputes the digest with the stored salt and compares it in constant time.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    let Ok(expected) = hex::decode(expected) else {
        return false;
    };
    let actual = digest(salt, password);
    if expected.len() != actual.len() {
        return false;
    }
    actual
        .iter()
        .zip(expected.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

fn digest(salt: &str, password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

// --- Header Helpers ---

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Value of cookie `name` from the request's `Cookie` header(s).
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
