mod common;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, Method, Request, Uri, header, request::Parts},
};
use blog::{
    AppConfig, AppError, AppState,
    auth::{self, AuthUser, Claims},
    config::Env,
};
use chrono::Utc;
use common::{seed_user, test_repo, test_state};
use jsonwebtoken::{EncodingKey, Header, encode};

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

/// Signs claims for `user_id` expiring `offset_secs` from now (negative means already expired).
fn create_token(state: &AppState, user_id: i64, offset_secs: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + offset_secs) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt_secret.as_bytes()),
    )
    .unwrap()
}

fn assert_login_redirect(result: Result<AuthUser, AppError>, expected_next: &str) {
    match result {
        Err(AppError::AuthenticationRequired { next }) => assert_eq!(next, expected_next),
        other => panic!("expected a login redirect, got {other:?}"),
    }
}

// --- Extractor ---

#[tokio::test]
async fn test_auth_success_with_bearer_token() {
    let repo = test_repo().await;
    let user = seed_user(&repo).await;
    let state = test_state(&repo);
    let token = auth::issue_token(&state.config, user.id).unwrap();

    let mut parts = get_request_parts(Method::GET, "/post/new/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.username, common::TEST_USERNAME);
}

#[tokio::test]
async fn test_auth_success_with_session_cookie() {
    let repo = test_repo().await;
    let user = seed_user(&repo).await;
    let state = test_state(&repo);
    let token = auth::issue_token(&state.config, user.id).unwrap();

    let mut parts = get_request_parts(Method::GET, "/post/new/".parse().unwrap());
    parts.headers.insert(
        header::COOKIE,
        header::HeaderValue::from_str(&format!("theme=dark; {}={}", auth::SESSION_COOKIE, token))
            .unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(auth_user.id, user.id);
}

#[tokio::test]
async fn test_auth_failure_without_credentials_carries_next() {
    let repo = test_repo().await;
    let state = test_state(&repo);

    let mut parts = get_request_parts(Method::POST, "/post/3/edit/?draft=1".parse().unwrap());
    let result = AuthUser::from_request_parts(&mut parts, &state).await;

    assert_login_redirect(result, "/post/3/edit/?draft=1");
}

#[tokio::test]
async fn test_auth_failure_with_expired_token() {
    let repo = test_repo().await;
    let user = seed_user(&repo).await;
    let state = test_state(&repo);
    // Well past the default validation leeway.
    let token = create_token(&state, user.id, -3600);

    let mut parts = get_request_parts(Method::GET, "/post/new/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert_login_redirect(result, "/post/new/");
}

#[tokio::test]
async fn test_auth_failure_with_foreign_signature() {
    let repo = test_repo().await;
    let user = seed_user(&repo).await;
    let state = test_state(&repo);

    let mut other = state.clone();
    other.config.jwt_secret = "some-other-secret".to_string();
    let token = create_token(&other, user.id, 3600);

    let mut parts = get_request_parts(Method::GET, "/post/new/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert_login_redirect(result, "/post/new/");
}

#[tokio::test]
async fn test_auth_failure_for_unknown_subject() {
    let repo = test_repo().await;
    let state = test_state(&repo);
    let token = create_token(&state, 4242, 3600);

    let mut parts = get_request_parts(Method::GET, "/post/new/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert_login_redirect(result, "/post/new/");
}

#[tokio::test]
async fn test_local_bypass_success() {
    let repo = test_repo().await;
    let user = seed_user(&repo).await;
    let state = test_state(&repo);
    assert_eq!(state.config.env, Env::Local);

    let mut parts = get_request_parts(Method::GET, "/post/new/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.username, common::TEST_USERNAME);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let repo = test_repo().await;
    let user = seed_user(&repo).await;
    let mut state = test_state(&repo);
    state.config.env = Env::Production;

    let mut parts = get_request_parts(Method::GET, "/post/new/".parse().unwrap());
    // Provide ONLY the local bypass header
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert_login_redirect(result, "/post/new/");
}

#[tokio::test]
async fn test_local_bypass_off_by_default() {
    let repo = test_repo().await;
    let user = seed_user(&repo).await;
    let state = AppState {
        config: AppConfig::default(),
        ..test_state(&repo)
    };
    assert_eq!(state.config.env, Env::Local);

    let mut parts = get_request_parts(Method::POST, "/post/new/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert_login_redirect(result, "/post/new/");
}

#[tokio::test]
async fn test_token_with_huge_ttl_is_still_valid() {
    let repo = test_repo().await;
    let user = seed_user(&repo).await;
    let mut state = test_state(&repo);
    state.config.session_ttl_secs = u64::MAX;

    let token = auth::issue_token(&state.config, user.id).unwrap();
    let claims = auth::decode_token(&state.config, &token).unwrap();

    assert_eq!(claims.sub, user.id);
    assert!(claims.exp > claims.iat);
}

// --- Helpers ---

#[test]
fn test_login_url_keeps_path_readable() {
    assert_eq!(auth::login_url("/post/new/"), "/accounts/login/?next=/post/new/");
    assert_eq!(
        auth::login_url("/post/1/edit/?a=b&c"),
        "/accounts/login/?next=/post/1/edit/%3Fa%3Db%26c"
    );
}

#[test]
fn test_safe_next_only_allows_local_paths() {
    assert_eq!(auth::safe_next(Some("/post/new/")), "/post/new/");
    assert_eq!(auth::safe_next(None), "/");
    assert_eq!(auth::safe_next(Some("")), "/");
    assert_eq!(auth::safe_next(Some("https://evil.example/")), "/");
    assert_eq!(auth::safe_next(Some("//evil.example/")), "/");
    assert_eq!(auth::safe_next(Some("/\\evil.example/")), "/");
    // Browsers strip these while parsing, leaving `//evil.example/`.
    assert_eq!(auth::safe_next(Some("/\t/evil.example/")), "/");
    assert_eq!(auth::safe_next(Some("/\n/evil.example/")), "/");
    assert_eq!(auth::safe_next(Some("/post/new/\r\nX-Evil: 1")), "/");
}

#[test]
fn test_password_hash_round_trip() {
    let stored = auth::hash_password("testpass");
    assert!(auth::verify_password("testpass", &stored));
    assert!(!auth::verify_password("TestPass", &stored));
    assert!(!auth::verify_password("testpass", "no-separator"));
    let truncated = &stored[..stored.len() - 2];
    assert!(!auth::verify_password("testpass", truncated));
    let (salt, _) = stored.split_once('$').unwrap();
    assert!(!auth::verify_password("testpass", &format!("{salt}$not-hex")));
    // Fresh salt every time.
    assert_ne!(stored, auth::hash_password("testpass"));
}

#[test]
fn test_cookie_value_lookup() {
    let mut headers = HeaderMap::new();
    headers.append(header::COOKIE, "a=1; blog_session=tok".parse().unwrap());
    headers.append(header::COOKIE, "b=2".parse().unwrap());

    assert_eq!(auth::cookie_value(&headers, "blog_session"), Some("tok"));
    assert_eq!(auth::cookie_value(&headers, "b"), Some("2"));
    assert_eq!(auth::cookie_value(&headers, "missing"), None);

    let mut cleared = HeaderMap::new();
    cleared.insert(header::COOKIE, "blog_session=".parse().unwrap());
    assert_eq!(auth::cookie_value(&cleared, "blog_session"), None);
}

#[test]
fn test_session_cookie_attributes() {
    let cookie = auth::session_cookie("tok", 60);
    assert!(cookie.starts_with("blog_session=tok;"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age=60"));
    assert!(auth::clear_session_cookie().contains("Max-Age=0"));
}
