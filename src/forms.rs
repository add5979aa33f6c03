use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, FieldErrors},
    models::{POST_TITLE_MAX, Post, PostChanges},
    repository::Repository,
};

const REQUIRED: &str = "This field is required.";

/// PostForm
///
/// The create/edit form exactly as the browser submitted it. Every field is optional
/// text; `clean` turns it into a `PostChanges` or reports every bad field at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Category id as text; blank means "no category".
    #[serde(default)]
    pub category: Option<String>,
}

impl PostForm {
    pub fn new(title: &str, content: &str, category: Option<i64>) -> Self {
        Self {
            title: Some(title.to_string()),
            content: Some(content.to_string()),
            category: category.map(|id| id.to_string()),
        }
    }

    /// Prefilled form for the edit page.
    pub fn from_post(post: &Post) -> Self {
        Self::new(&post.title, &post.content, post.category_id)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// The submitted category id, if it parses.
    pub fn category_id(&self) -> Option<i64> {
        self.category.as_deref().and_then(|c| c.trim().parse().ok())
    }

    /// clean
    ///
    /// Validates the submission without writing anything.
    ///
    /// - `title` and `content` are trimmed and must not end up empty; `title` is capped
    ///   at 200 characters.
    /// - `category` may be blank. Otherwise it has to be the id of an existing category.
    ///
    /// # Errors
    /// `AppError::Validation` with one entry per offending field, or whatever the
    /// repository fails with while looking the category up.
    pub async fn clean(&self, repo: &dyn Repository) -> Result<PostChanges, AppError> {
        let mut errors = FieldErrors::new();

        let title = self.title().trim();
        if title.is_empty() {
            errors.add("title", "required", REQUIRED);
        } else if title.chars().count() > POST_TITLE_MAX {
            errors.add(
                "title",
                "max_length",
                format!(
                    "Ensure this value has at most {} characters (it has {}).",
                    POST_TITLE_MAX,
                    title.chars().count()
                ),
            );
        }

        let content = self.content().trim();
        if content.is_empty() {
            errors.add("content", "required", REQUIRED);
        }

        let category_id = match self.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => match repo.get_category(id).await {
                    Ok(category) => Some(category.id),
                    Err(AppError::NotFound) => {
                        errors.add(
                            "category",
                            "does_not_exist",
                            format!("Select a valid choice. Category {id} does not exist."),
                        );
                        None
                    }
                    Err(e) => return Err(e),
                },
                Err(_) => {
                    errors.add(
                        "category",
                        "does_not_exist",
                        "Select a valid choice. That category does not exist.",
                    );
                    None
                }
            },
        };

        errors.into_result()?;
        Ok(PostChanges::new(title, content, category_id))
    }
}
