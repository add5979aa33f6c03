use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    Executor, Sqlite, SqliteConnection, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use validator::Validate;

use crate::{
    error::{AppError, FieldErrors},
    models::{Category, NewCategory, Post, PostChanges, User},
};

/// Repository Trait
///
/// The contract every handler talks to instead of reaching for the database directly.
/// Writes validate their payload first and run inside a single transaction, so a
/// rejected or failed write leaves the store exactly as it was.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across Axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Categories ---
    async fn list_categories(&self) -> Result<Vec<Category>, AppError>;
    async fn get_category(&self, id: i64) -> Result<Category, AppError>;
    async fn create_category(&self, new: NewCategory) -> Result<Category, AppError>;
    async fn update_category(&self, id: i64, changes: NewCategory) -> Result<Category, AppError>;
    /// Removes the category and every post filed under it. Returns how many posts went with it.
    async fn delete_category(&self, id: i64) -> Result<u64, AppError>;

    // --- Posts ---
    /// All posts in insertion order.
    async fn list_posts(&self) -> Result<Vec<Post>, AppError>;
    async fn get_post(&self, id: i64) -> Result<Post, AppError>;
    async fn create_post(&self, changes: PostChanges) -> Result<Post, AppError>;
    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Post, AppError>;
    async fn delete_post(&self, id: i64) -> Result<(), AppError>;

    // --- Users ---
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const POST_COLUMNS: &str = r#"
    SELECT p.id, p.title, p.content, p.category_id, c.name AS category_name,
           p.created_at, p.updated_at
    FROM posts p
    LEFT JOIN categories c ON c.id = p.category_id
"#;

/// SqliteRepository
///
/// The `Repository` implementation backed by SQLite through a sqlx pool.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// connect
    ///
    /// Opens a pool against `url` with foreign keys switched on and the embedded
    /// migrations applied.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let repo = Self::new(pool);
        repo.migrate().await?;
        Ok(repo)
    }

    /// in_memory
    ///
    /// A private, migrated database that lives as long as the returned repository.
    /// The pool keeps one connection open for good; the data goes away with it.
    pub async fn in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let repo = Self::new(pool);
        repo.migrate().await?;
        Ok(repo)
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn fetch_post<'e, E>(executor: E, id: i64) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!("{POST_COLUMNS} WHERE p.id = ?");
    sqlx::query_as::<_, Post>(&query)
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Fails with a `does_not_exist` field error when `category_id` names no category.
async fn ensure_category(conn: &mut SqliteConnection, category_id: Option<i64>) -> Result<(), AppError> {
    let Some(id) = category_id else {
        return Ok(());
    };
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    if found.is_none() {
        let mut errors = FieldErrors::new();
        errors.add(
            "category",
            "does_not_exist",
            format!("Select a valid choice. Category {id} does not exist."),
        );
        return Err(errors.into());
    }
    Ok(())
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    async fn get_category(&self, id: i64) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn create_category(&self, new: NewCategory) -> Result<Category, AppError> {
        new.validate().map_err(FieldErrors::from)?;

        let id = sqlx::query("INSERT INTO categories (name) VALUES (?)")
            .bind(&new.name)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        tracing::debug!(category_id = id, "category created");
        Ok(Category { id, name: new.name })
    }

    async fn update_category(&self, id: i64, changes: NewCategory) -> Result<Category, AppError> {
        changes.validate().map_err(FieldErrors::from)?;

        let rows = sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
            .bind(&changes.name)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(AppError::NotFound);
        }
        Ok(Category { id, name: changes.name })
    }

    /// delete_category
    ///
    /// The posts go first, then the category, in one transaction. Dropping the
    /// transaction on any early return rolls both back.
    async fn delete_category(&self, id: i64) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let posts_removed = sqlx::query("DELETE FROM posts WHERE category_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let rows = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(AppError::NotFound);
        }

        tx.commit().await?;
        tracing::info!(category_id = id, posts_removed, "category deleted");
        Ok(posts_removed)
    }

    async fn list_posts(&self) -> Result<Vec<Post>, AppError> {
        let query = format!("{POST_COLUMNS} ORDER BY p.id");
        let posts = sqlx::query_as::<_, Post>(&query).fetch_all(&self.pool).await?;
        Ok(posts)
    }

    async fn get_post(&self, id: i64) -> Result<Post, AppError> {
        fetch_post(&self.pool, id).await?.ok_or(AppError::NotFound)
    }

    async fn create_post(&self, changes: PostChanges) -> Result<Post, AppError> {
        changes.validate().map_err(FieldErrors::from)?;

        let mut tx = self.pool.begin().await?;
        ensure_category(&mut *tx, changes.category_id).await?;

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO posts (title, content, category_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(changes.category_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let post = fetch_post(&mut *tx, id).await?.ok_or(AppError::NotFound)?;
        tx.commit().await?;

        tracing::debug!(post_id = id, "post created");
        Ok(post)
    }

    /// update_post
    ///
    /// Replaces title, content and category. `created_at` is never written here;
    /// `updated_at` moves to now.
    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Post, AppError> {
        changes.validate().map_err(FieldErrors::from)?;

        let mut tx = self.pool.begin().await?;
        if fetch_post(&mut *tx, id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        ensure_category(&mut *tx, changes.category_id).await?;

        sqlx::query("UPDATE posts SET title = ?, content = ?, category_id = ?, updated_at = ? WHERE id = ?")
            .bind(&changes.title)
            .bind(&changes.content)
            .bind(changes.category_id)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let post = fetch_post(&mut *tx, id).await?.ok_or(AppError::NotFound)?;
        tx.commit().await?;

        tracing::debug!(post_id = id, "post updated");
        Ok(post)
    }

    async fn delete_post(&self, id: i64) -> Result<(), AppError> {
        let rows = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(AppError::NotFound);
        }
        tracing::debug!(post_id = id, "post deleted");
        Ok(())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let mut errors = FieldErrors::new();
        if username.trim().is_empty() {
            errors.add("username", "required", "This field is required.");
        }
        errors.into_result()?;

        let created_at = Utc::now();
        let result = sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password_hash)
            .bind(created_at)
            .execute(&self.pool)
            .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let mut errors = FieldErrors::new();
                errors.add("username", "unique", "A user with that username already exists.");
                return Err(errors.into());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        })
    }
}
