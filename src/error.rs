use std::collections::BTreeMap;
use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{auth, pages};

/// FieldError
///
/// A single human-readable rejection reason attached to one input field.
/// `code` is stable and machine-checkable (`required`, `max_length`, `does_not_exist`, ...),
/// `message` is what gets rendered next to the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub code: String,
    pub message: String,
}

/// FieldErrors
///
/// Field name -> rejection reasons. Produced by both the model-level validators and the
/// post form; an empty map means the input was accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, Vec<FieldError>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, code: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(FieldError {
            code: code.to_string(),
            message: message.into(),
        });
    }

    /// Folds another set of errors into this one, keeping existing entries first.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, errors) in other.0 {
            self.0.entry(field).or_default().extend(errors);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[FieldError] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str, code: &str) -> bool {
        self.get(field).iter().any(|e| e.code == code)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Ok(()) when nothing was recorded, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for FieldErrors {}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            for e in errs {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", e.code));
                out.add(&field, &e.code, message);
            }
        }
        out
    }
}

/// AppError
///
/// Every failure a request can run into. All variants are recovered at the request
/// boundary by the `IntoResponse` impl below; none of them terminate the process.
#[derive(Debug, Error)]
pub enum AppError {
    /// A field constraint was violated; nothing was written.
    #[error(transparent)]
    Validation(#[from] FieldErrors),

    #[error("record not found")]
    NotFound,

    /// A login-gated route was hit without a valid session. Answered with a redirect.
    #[error("authentication required for {next}")]
    AuthenticationRequired { next: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, pages::ErrorPage::validation(&errors))
                    .into_response()
            }
            AppError::NotFound => {
                (StatusCode::NOT_FOUND, pages::ErrorPage::not_found()).into_response()
            }
            AppError::AuthenticationRequired { next } => {
                pages::Found(auth::login_url(&next)).into_response()
            }
            other => {
                tracing::error!(error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, pages::ErrorPage::internal()).into_response()
            }
        }
    }
}
