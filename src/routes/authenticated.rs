use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Every mutating endpoint of the blog. GET renders the form or confirmation page,
/// POST performs the change and redirects to the post list.
///
/// Access Control Strategy:
/// `create_router` wraps this router in `require_login`, and each handler also takes
/// `AuthUser`. Visitors without a session are redirected to
/// `/accounts/login/?next=<path>` before anything else runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/POST /post/new/
        .route(
            "/post/new/",
            get(handlers::post_create_form).post(handlers::post_create),
        )
        // GET/POST /post/{id}/edit/
        // 404 when the post does not exist.
        .route(
            "/post/{id}/edit/",
            get(handlers::post_update_form).post(handlers::post_update),
        )
        // GET/POST /post/{id}/delete/
        // POST deletes unconditionally; no body is read.
        .route(
            "/post/{id}/delete/",
            get(handlers::post_delete_confirm).post(handlers::post_delete),
        )
}
