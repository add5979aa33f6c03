use std::sync::Arc;

use anyhow::Context;
use blog::{
    AppState,
    auth,
    config::{AppConfig, Env},
    create_router,
    models::NewCategory,
    repository::{Repository, RepositoryState, SqliteRepository},
};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Minimal blog: posts, categories, and a login-gated editor.
#[derive(Debug, Parser)]
#[command(name = "blog", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Add a category.
    CreateCategory { name: String },
    /// Print every category as `id<TAB>name`.
    ListCategories,
    /// Delete a category together with all of its posts.
    DeleteCategory { id: i64 },
    /// Add an account that may create, edit and delete posts.
    CreateUser { username: String, password: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = AppConfig::load().context("invalid configuration")?;
    init_tracing(config.env);

    let cli = Cli::parse();

    let repo = SqliteRepository::connect(&config.db_url)
        .await
        .with_context(|| format!("failed to open database at {}", config.db_url))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, repo).await?,
        Command::CreateCategory { name } => {
            let category = repo.create_category(NewCategory::new(name)).await?;
            println!("created category {} ({})", category.id, category.name);
        }
        Command::ListCategories => {
            for category in repo.list_categories().await? {
                println!("{}\t{}", category.id, category.name);
            }
        }
        Command::DeleteCategory { id } => {
            let posts_removed = repo.delete_category(id).await?;
            println!("deleted category {id} and {posts_removed} post(s)");
        }
        Command::CreateUser { username, password } => {
            let user = repo
                .create_user(&username, &auth::hash_password(&password))
                .await?;
            println!("created user {} ({})", user.id, user.username);
        }
    }

    Ok(())
}

/// Pretty logs locally, JSON in production. `RUST_LOG` overrides the default filter.
fn init_tracing(env: Env) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blog=debug,tower_http=info".into());

    match env {
        Env::Local => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
        Env::Production => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn serve(config: AppConfig, repo: SqliteRepository) -> anyhow::Result<()> {
    tracing::info!("Application starting in {:?} mode", config.env);
    if config.dev_auth_bypass {
        tracing::warn!("x-user-id login bypass is enabled (BLOG_DEV_AUTH_BYPASS)");
    }

    ensure_admin(&config, &repo).await?;

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        repo: Arc::new(repo) as RepositoryState,
        config,
    };
    let app = create_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Creates the bootstrap account from `BLOG_ADMIN_USERNAME` / `BLOG_ADMIN_PASSWORD`
/// unless it already exists.
async fn ensure_admin(config: &AppConfig, repo: &SqliteRepository) -> anyhow::Result<()> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };
    if repo.get_user_by_username(username).await?.is_some() {
        return Ok(());
    }
    repo.create_user(username, &auth::hash_password(password)).await?;
    tracing::info!(username = %username, "bootstrap account created");
    Ok(())
}
