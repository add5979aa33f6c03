use crate::{
    AppState,
    auth::{self, AuthUser},
    error::AppError,
    forms::PostForm,
    pages::{
        FormMode, FormOutcome, Found, LoginPage, PostConfirmDeletePage, PostDetailPage,
        PostFormPage, PostListPage,
    },
};
use axum::{
    Form,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

// --- Public Handlers ---

/// post_list
///
/// [Public Route] Every post, oldest first.
pub async fn post_list(State(state): State<AppState>) -> Result<PostListPage, AppError> {
    let posts = state.repo.list_posts().await?;
    Ok(PostListPage { posts })
}

/// post_detail
///
/// [Public Route] One post by id, or 404.
pub async fn post_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<PostDetailPage, AppError> {
    let post = state.repo.get_post(id).await?;
    Ok(PostDetailPage { post })
}

// --- Authenticated Handlers ---
//
// Each of these takes `AuthUser`, so a missing session is answered with the login
// redirect before any form is parsed or any row is touched.

/// post_create_form
///
/// [Authenticated Route] Empty create form.
pub async fn post_create_form(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Result<PostFormPage, AppError> {
    let categories = state.repo.list_categories().await?;
    Ok(PostFormPage::new(FormMode::Create, PostForm::default(), categories))
}

/// post_create
///
/// [Authenticated Route] Validates the submission and stores a new post.
/// Invalid input re-renders the form (200) with every field error and writes nothing.
pub async fn post_create(
    user: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<PostForm>,
) -> Result<FormOutcome, AppError> {
    let saved = match form.clean(state.repo.as_ref()).await {
        Ok(changes) => state.repo.create_post(changes).await,
        Err(e) => Err(e),
    };

    match saved {
        Ok(post) => {
            tracing::info!(post_id = post.id, user = %user.username, "post created");
            Ok(FormOutcome::Saved(Found::post_list()))
        }
        Err(AppError::Validation(errors)) => {
            let categories = state.repo.list_categories().await?;
            Ok(FormOutcome::Invalid(
                PostFormPage::new(FormMode::Create, form, categories).with_errors(errors),
            ))
        }
        Err(e) => Err(e),
    }
}

/// post_update_form
///
/// [Authenticated Route] Edit form prefilled from the stored post.
pub async fn post_update_form(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<PostFormPage, AppError> {
    let post = state.repo.get_post(id).await?;
    let categories = state.repo.list_categories().await?;
    Ok(PostFormPage::new(FormMode::Edit(id), PostForm::from_post(&post), categories))
}

/// post_update
///
/// [Authenticated Route] Replaces the post's title, content and category.
/// A missing post is a 404 regardless of what was submitted.
pub async fn post_update(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<PostForm>,
) -> Result<FormOutcome, AppError> {
    state.repo.get_post(id).await?;

    let saved = match form.clean(state.repo.as_ref()).await {
        Ok(changes) => state.repo.update_post(id, changes).await,
        Err(e) => Err(e),
    };

    match saved {
        Ok(post) => {
            tracing::info!(post_id = post.id, user = %user.username, "post updated");
            Ok(FormOutcome::Saved(Found::post_list()))
        }
        Err(AppError::Validation(errors)) => {
            let categories = state.repo.list_categories().await?;
            Ok(FormOutcome::Invalid(
                PostFormPage::new(FormMode::Edit(id), form, categories).with_errors(errors),
            ))
        }
        Err(e) => Err(e),
    }
}

/// post_delete_confirm
///
/// [Authenticated Route] "Are you sure?" page.
pub async fn post_delete_confirm(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<PostConfirmDeletePage, AppError> {
    let post = state.repo.get_post(id).await?;
    Ok(PostConfirmDeletePage { post })
}

/// post_delete
///
/// [Authenticated Route] Deletes the post; no body is read.
pub async fn post_delete(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Found, AppError> {
    state.repo.delete_post(id).await?;
    tracing::info!(post_id = id, user = %user.username, "post deleted");
    Ok(Found::post_list())
}

// --- Session Handlers ---

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

/// login_form
///
/// [Public Route] Login page; `next` is carried through a hidden field.
pub async fn login_form(Query(query): Query<LoginQuery>) -> LoginPage {
    LoginPage {
        next: query.next.unwrap_or_default(),
        ..LoginPage::default()
    }
}

/// login
///
/// [Public Route] Checks the credentials. On success the session cookie is set and the
/// browser is sent to `next` (local paths only). On failure the form comes back with a
/// single, deliberately vague error.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let user = state.repo.get_user_by_username(form.username.trim()).await?;

    let user = match user {
        Some(user) if auth::verify_password(&form.password, &user.password_hash) => user,
        _ => {
            tracing::warn!(username = %form.username, "failed login attempt");
            let page = LoginPage {
                next: form.next.unwrap_or_default(),
                username: form.username,
                error: Some(
                    "Please enter a correct username and password. Note that both fields may be case-sensitive."
                        .to_string(),
                ),
            };
            return Ok(page.into_response());
        }
    };

    let token = auth::issue_token(&state.config, user.id)?;
    let target = auth::safe_next(form.next.as_deref());
    tracing::info!(user = %user.username, "user logged in");

    Ok((
        StatusCode::FOUND,
        [
            (header::LOCATION, target),
            (
                header::SET_COOKIE,
                auth::session_cookie(&token, state.config.session_ttl_secs),
            ),
        ],
    )
        .into_response())
}

/// logout
///
/// [Public Route] Expires the session cookie and returns to the post list.
pub async fn logout() -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, Found::post_list().0),
            (header::SET_COOKIE, auth::clear_session_cookie()),
        ],
    )
        .into_response()
}
