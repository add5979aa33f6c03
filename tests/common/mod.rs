#![allow(dead_code)]

use std::sync::Arc;

use blog::{
    AppConfig, AppState, SqliteRepository,
    auth::{self, AuthUser},
    models::{Category, NewCategory, Post, PostChanges, User},
    repository::{Repository, RepositoryState},
};

pub const TEST_USERNAME: &str = "testuser";
pub const TEST_PASSWORD: &str = "testpass";

/// A fresh, migrated in-memory store.
pub async fn test_repo() -> SqliteRepository {
    SqliteRepository::in_memory()
        .await
        .expect("Failed to open in-memory database")
}

/// AppState over `repo` with the local default configuration plus the `x-user-id`
/// bypass, so router tests can act as a user without logging in.
pub fn test_state(repo: &SqliteRepository) -> AppState {
    AppState {
        repo: Arc::new(repo.clone()) as RepositoryState,
        config: AppConfig {
            dev_auth_bypass: true,
            ..AppConfig::default()
        },
    }
}

pub async fn seed_user(repo: &SqliteRepository) -> User {
    repo.create_user(TEST_USERNAME, &auth::hash_password(TEST_PASSWORD))
        .await
        .expect("Failed to create test user")
}

pub fn as_auth_user(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        username: user.username.clone(),
    }
}

pub async fn seed_category(repo: &SqliteRepository, name: &str) -> Category {
    repo.create_category(NewCategory::new(name))
        .await
        .expect("Failed to create test category")
}

pub async fn seed_post(repo: &SqliteRepository, title: &str, category_id: Option<i64>) -> Post {
    repo.create_post(PostChanges::new(title, format!("Content of {title}"), category_id))
        .await
        .expect("Failed to create test post")
}
