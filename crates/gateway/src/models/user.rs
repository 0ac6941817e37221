//! User model and role queries.

use anyhow::{Context, Result};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub pass: String,
    pub mail: String,
    pub display_name: String,
    pub status: i16,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new user.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub password: String,
    pub mail: String,
    pub display_name: String,
    pub roles: Vec<String>,
}

/// One row of the authors listing: a user holding at least one publishing
/// role, with every role the account has joined into `roles`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuthorEntry {
    pub id: i64,
    pub display: String,
    pub mail: String,
    pub roles: Option<String>,
}

impl User {
    /// Check if this user is active.
    pub fn is_active(&self) -> bool {
        self.status == 1
    }

    /// Name shown on published content; falls back to the login name.
    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Find a user by ID.
    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by id")?;

        Ok(user)
    }

    /// Find a user by login name (case-insensitive).
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by name")?;

        Ok(user)
    }

    /// Create a new user with its roles.
    pub async fn create(pool: &PgPool, input: CreateUser) -> Result<Self> {
        let pass = hash_password(&input.password)?;

        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, pass, mail, display_name)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&pass)
        .bind(&input.mail)
        .bind(&input.display_name)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create user")?;

        for role in &input.roles {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(user.id)
                .bind(role)
                .execute(&mut *tx)
                .await
                .context("failed to assign role")?;
        }

        tx.commit().await.context("failed to commit user creation")?;

        Ok(user)
    }

    /// Count all users.
    pub async fn count(pool: &PgPool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .context("failed to count users")?;

        Ok(count)
    }

    /// List the roles held by a user.
    pub async fn roles(pool: &PgPool, id: i64) -> Result<Vec<String>> {
        let roles: Vec<String> =
            sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role")
                .bind(id)
                .fetch_all(pool)
                .await
                .context("failed to fetch user roles")?;

        Ok(roles)
    }

    /// Check whether a user holds the administrator role.
    pub async fn is_admin(pool: &PgPool, id: i64) -> Result<bool> {
        let found: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM user_roles WHERE user_id = $1 AND role = 'administrator'",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to check administrator role")?;

        Ok(found.is_some())
    }

    /// The default publishing author: the lowest-id user holding one of the
    /// publishing roles, or id 1 when no such user exists.
    pub async fn default_author_id(pool: &PgPool) -> Result<i64> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT u.id FROM users u
            WHERE EXISTS (
                SELECT 1 FROM user_roles r
                WHERE r.user_id = u.id
                  AND r.role IN ('administrator', 'editor', 'author')
            )
            ORDER BY u.id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(pool)
        .await
        .context("failed to resolve default author")?;

        Ok(id.unwrap_or(1))
    }

    /// List every user holding a publishing role, ordered by display name.
    pub async fn list_authors(pool: &PgPool) -> Result<Vec<AuthorEntry>> {
        let authors = sqlx::query_as::<_, AuthorEntry>(
            r#"
            SELECT u.id,
                   COALESCE(NULLIF(u.display_name, ''), u.name) AS display,
                   u.mail,
                   (SELECT STRING_AGG(r2.role, ', ' ORDER BY r2.role)
                      FROM user_roles r2
                     WHERE r2.user_id = u.id) AS roles
            FROM users u
            WHERE EXISTS (
                SELECT 1 FROM user_roles r
                WHERE r.user_id = u.id
                  AND r.role IN ('administrator', 'editor', 'author')
            )
            ORDER BY display ASC, u.id ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .context("failed to list authors")?;

        Ok(authors)
    }

    /// Verify a password against this user's hash.
    pub fn verify_password(&self, password: &str) -> bool {
        if self.pass.is_empty() {
            return false;
        }

        let Ok(parsed_hash) = PasswordHash::new(&self.pass) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
