use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

/// Longest accepted category name, in characters.
pub const CATEGORY_NAME_MAX: usize = 100;
/// Longest accepted post title, in characters.
pub const POST_TITLE_MAX: usize = 200;

// --- Stored Records ---

/// Category
///
/// A named bucket for posts, stored in the `categories` table.
/// Deleting a category removes every post that references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Post
///
/// A blog entry from the `posts` table. `category_name` is not a column of its own;
/// the repository fills it through a join on `categories`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    // None means "uncategorized".
    pub category_id: Option<i64>,
    #[sqlx(default)]
    pub category_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User
///
/// An account allowed to create, edit and delete posts.
/// `password_hash` is never rendered or logged.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

// --- Write Payloads (validated by the repository before touching the store) ---

/// NewCategory
///
/// Payload for creating or renaming a category.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(
        custom(function = "not_blank"),
        length(max = 100, message = "Ensure this value has at most 100 characters.")
    )]
    pub name: String,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// PostChanges
///
/// Full replacement of a post's editable fields, used for both create and update.
/// `content` carries no constraint here; only the form insists on it being non-blank.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PostChanges {
    #[validate(
        custom(function = "not_blank"),
        length(max = 200, message = "Ensure this value has at most 200 characters.")
    )]
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
}

impl PostChanges {
    pub fn new(title: impl Into<String>, content: impl Into<String>, category_id: Option<i64>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category_id,
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required").with_message("This field cannot be blank.".into()));
    }
    Ok(())
}
