//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use redis::Client as RedisClient;
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::file::{FileService, LocalFileStorage};
use crate::lockout::LockoutService;
use crate::models::{CreateUser, User};
use crate::secret;
use crate::services::{PublishService, SideloadService};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool.
    db: PgPool,

    /// Account lockout service.
    lockout: LockoutService,

    /// File service for uploads.
    files: Arc<FileService>,

    /// Publish pipeline.
    publisher: PublishService,

    /// Public site URL without a trailing slash.
    site_url: String,
}

impl AppState {
    /// Create new application state with database connections.
    ///
    /// Connects to PostgreSQL and Redis, runs migrations, makes sure an API
    /// key exists, and bootstraps the initial operator account when one is
    /// configured and the users table is empty.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        // Create Redis client and verify it is reachable
        let redis = RedisClient::open(config.redis_url.as_str())
            .context("failed to create Redis client")?;

        let mut conn = redis
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to Redis")?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .context("Redis PING failed")?;

        let lockout = LockoutService::new(redis);

        if secret::ensure(&db)
            .await
            .context("failed to ensure API key")?
        {
            info!("generated initial API key");
        }

        bootstrap_admin(&db, config).await?;

        let storage = Arc::new(LocalFileStorage::new(
            &config.uploads_dir,
            &config.files_url,
        ));
        let files = Arc::new(FileService::new(db.clone(), storage));

        let sideload = SideloadService::new(files.as_ref().clone());
        let publisher = PublishService::new(db.clone(), sideload, &config.site_url);

        let site_url = config.site_url.trim_end_matches('/').to_string();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                db,
                lockout,
                files,
                publisher,
                site_url,
            }),
        })
    }

    /// Get the database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    /// Get the lockout service.
    pub fn lockout(&self) -> &LockoutService {
        &self.inner.lockout
    }

    /// Get the file service.
    pub fn files(&self) -> &Arc<FileService> {
        &self.inner.files
    }

    /// Get the publish pipeline.
    pub fn publisher(&self) -> &PublishService {
        &self.inner.publisher
    }

    /// Public site URL without a trailing slash.
    pub fn site_url(&self) -> &str {
        &self.inner.site_url
    }
}

/// Create the initial operator account on first boot.
///
/// Runs only when both ADMIN_USER and ADMIN_PASSWORD are configured and
/// the users table is empty.
async fn bootstrap_admin(db: &PgPool, config: &Config) -> Result<()> {
    let (Some(name), Some(password)) = (&config.admin_user, &config.admin_password) else {
        return Ok(());
    };

    if User::count(db).await? > 0 {
        return Ok(());
    }

    let user = User::create(
        db,
        CreateUser {
            name: name.clone(),
            password: password.clone(),
            mail: String::new(),
            display_name: name.clone(),
            roles: vec!["administrator".to_string()],
        },
    )
    .await
    .context("failed to create initial admin account")?;

    info!(user_id = user.id, name = %user.name, "created initial admin account");
    Ok(())
}
