//! Page contexts and their HTML.
//!
//! Handlers return these structs rather than raw HTML so tests can inspect what a page
//! was built from. Each one renders through `maud` when turned into a response.

use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use maud::{DOCTYPE, Markup, html};

use crate::{
    error::{FieldError, FieldErrors},
    forms::PostForm,
    models::{Category, POST_TITLE_MAX, Post},
};

/// Where successful create/update/delete submissions land.
pub const POST_LIST_URL: &str = "/";

/// Found
///
/// A `302 Found` redirect to the wrapped location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found(pub String);

impl Found {
    pub fn post_list() -> Self {
        Found(POST_LIST_URL.to_string())
    }
}

impl IntoResponse for Found {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(header::LOCATION, self.0)]).into_response()
    }
}

fn layout(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " | Blog" }
            }
            body {
                header {
                    nav {
                        a href=(POST_LIST_URL) { "Blog" }
                        " | "
                        a href="/post/new/" { "New post" }
                        form method="post" action="/accounts/logout/" style="display:inline" {
                            " | "
                            button type="submit" { "Log out" }
                        }
                    }
                }
                main { (body) }
            }
        }
    }
}

fn error_list(errors: &[FieldError]) -> Markup {
    html! {
        @if !errors.is_empty() {
            ul class="errorlist" {
                @for e in errors {
                    li data-code=(e.code) { (e.message) }
                }
            }
        }
    }
}

fn category_label(post: &Post) -> &str {
    post.category_name.as_deref().unwrap_or("Uncategorized")
}

// --- Post List ---

#[derive(Debug, Clone)]
pub struct PostListPage {
    pub posts: Vec<Post>,
}

impl PostListPage {
    pub fn render(&self) -> Markup {
        layout(
            "Posts",
            html! {
                h1 { "Posts" }
                @if self.posts.is_empty() {
                    p { "No posts yet." }
                } @else {
                    ul class="posts" {
                        @for post in &self.posts {
                            li {
                                a href={ "/post/" (post.id) "/" } { (post.title) }
                                " "
                                small { (category_label(post)) " · " (post.created_at.format("%Y-%m-%d %H:%M")) }
                            }
                        }
                    }
                }
            },
        )
    }
}

impl IntoResponse for PostListPage {
    fn into_response(self) -> Response {
        Html(self.render().into_string()).into_response()
    }
}

// --- Post Detail ---

#[derive(Debug, Clone)]
pub struct PostDetailPage {
    pub post: Post,
}

impl PostDetailPage {
    pub fn render(&self) -> Markup {
        let post = &self.post;
        layout(
            &post.title,
            html! {
                article {
                    h1 { (post.title) }
                    p class="meta" {
                        (category_label(post))
                        " · created " (post.created_at.format("%Y-%m-%d %H:%M"))
                        " · updated " (post.updated_at.format("%Y-%m-%d %H:%M"))
                    }
                    div class="content" style="white-space:pre-wrap" { (post.content) }
                }
                p {
                    a href={ "/post/" (post.id) "/edit/" } { "Edit" }
                    " | "
                    a href={ "/post/" (post.id) "/delete/" } { "Delete" }
                }
            },
        )
    }
}

impl IntoResponse for PostDetailPage {
    fn into_response(self) -> Response {
        Html(self.render().into_string()).into_response()
    }
}

// --- Post Form (create + edit) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(i64),
}

impl FormMode {
    pub fn action(&self) -> String {
        match self {
            FormMode::Create => "/post/new/".to_string(),
            FormMode::Edit(id) => format!("/post/{id}/edit/"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostFormPage {
    pub mode: FormMode,
    pub form: PostForm,
    pub errors: FieldErrors,
    pub categories: Vec<Category>,
}

impl PostFormPage {
    pub fn new(mode: FormMode, form: PostForm, categories: Vec<Category>) -> Self {
        Self {
            mode,
            form,
            errors: FieldErrors::new(),
            categories,
        }
    }

    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = errors;
        self
    }

    pub fn render(&self) -> Markup {
        let heading = match self.mode {
            FormMode::Create => "New post",
            FormMode::Edit(_) => "Edit post",
        };
        let selected = self.form.category_id();
        layout(
            heading,
            html! {
                h1 { (heading) }
                form method="post" action=(self.mode.action()) {
                    p {
                        label for="id_title" { "Title" }
                        (error_list(self.errors.get("title")))
                        input #id_title type="text" name="title" maxlength=(POST_TITLE_MAX) value=(self.form.title());
                    }
                    p {
                        label for="id_content" { "Content" }
                        (error_list(self.errors.get("content")))
                        textarea #id_content name="content" rows="12" cols="60" { (self.form.content()) }
                    }
                    p {
                        label for="id_category" { "Category" }
                        (error_list(self.errors.get("category")))
                        select #id_category name="category" {
                            option value="" selected[selected.is_none()] { "---------" }
                            @for category in &self.categories {
                                option value=(category.id) selected[selected == Some(category.id)] { (category.name) }
                            }
                        }
                    }
                    button type="submit" { "Save" }
                }
            },
        )
    }
}

impl IntoResponse for PostFormPage {
    fn into_response(self) -> Response {
        Html(self.render().into_string()).into_response()
    }
}

/// FormOutcome
///
/// Result of a create/edit submission: saved (redirect to the list) or rejected
/// (the form again, with errors, answered as 200).
#[derive(Debug, Clone)]
pub enum FormOutcome {
    Saved(Found),
    Invalid(PostFormPage),
}

impl IntoResponse for FormOutcome {
    fn into_response(self) -> Response {
        match self {
            FormOutcome::Saved(found) => found.into_response(),
            FormOutcome::Invalid(page) => page.into_response(),
        }
    }
}

// --- Delete Confirmation ---

#[derive(Debug, Clone)]
pub struct PostConfirmDeletePage {
    pub post: Post,
}

impl PostConfirmDeletePage {
    pub fn render(&self) -> Markup {
        layout(
            "Delete post",
            html! {
                h1 { "Delete post" }
                p { "Are you sure you want to delete \"" (self.post.title) "\"?" }
                form method="post" action={ "/post/" (self.post.id) "/delete/" } {
                    button type="submit" { "Confirm" }
                    " "
                    a href={ "/post/" (self.post.id) "/" } { "Cancel" }
                }
            },
        )
    }
}

impl IntoResponse for PostConfirmDeletePage {
    fn into_response(self) -> Response {
        Html(self.render().into_string()).into_response()
    }
}

// --- Login ---

#[derive(Debug, Clone, Default)]
pub struct LoginPage {
    pub next: String,
    pub username: String,
    pub error: Option<String>,
}

impl LoginPage {
    pub fn render(&self) -> Markup {
        layout(
            "Log in",
            html! {
                h1 { "Log in" }
                @if let Some(error) = &self.error {
                    ul class="errorlist nonfield" { li { (error) } }
                }
                form method="post" action="/accounts/login/" {
                    p {
                        label for="id_username" { "Username" }
                        input #id_username type="text" name="username" value=(self.username) autofocus;
                    }
                    p {
                        label for="id_password" { "Password" }
                        input #id_password type="password" name="password";
                    }
                    input type="hidden" name="next" value=(self.next);
                    button type="submit" { "Log in" }
                }
            },
        )
    }
}

impl IntoResponse for LoginPage {
    fn into_response(self) -> Response {
        Html(self.render().into_string()).into_response()
    }
}

// --- Errors ---

/// ErrorPage
///
/// Body for error statuses. The status code itself is set by the caller.
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub title: &'static str,
    pub messages: Vec<String>,
}

impl ErrorPage {
    pub fn not_found() -> Self {
        Self {
            title: "Not found",
            messages: vec!["The requested page does not exist.".to_string()],
        }
    }

    pub fn internal() -> Self {
        Self {
            title: "Server error",
            messages: vec!["Something went wrong on our side.".to_string()],
        }
    }

    pub fn validation(errors: &FieldErrors) -> Self {
        let messages = errors
            .fields()
            .flat_map(|field| {
                errors
                    .get(field)
                    .iter()
                    .map(move |e| format!("{field}: {}", e.message))
            })
            .collect();
        Self {
            title: "Invalid input",
            messages,
        }
    }

    pub fn render(&self) -> Markup {
        layout(
            self.title,
            html! {
                h1 { (self.title) }
                @for message in &self.messages {
                    p { (message) }
                }
            },
        )
    }
}

impl IntoResponse for ErrorPage {
    fn into_response(self) -> Response {
        Html(self.render().into_string()).into_response()
    }
}
