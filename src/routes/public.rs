use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints any visitor may call. Everything here is read-only apart from the
/// session endpoints, which only touch the visitor's own cookie.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // Every post in insertion order.
        .route("/", get(handlers::post_list))
        // GET /post/{id}/
        // Single post, 404 when the id is unknown.
        .route("/post/{id}/", get(handlers::post_detail))
        // GET/POST /accounts/login/
        // Login form, and the credential check that sets the session cookie.
        .route(
            "/accounts/login/",
            get(handlers::login_form).post(handlers::login),
        )
        // POST /accounts/logout/
        .route("/accounts/logout/", post(handlers::logout))
}
