//! Post model and CRUD operations.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::sanitize;

/// Publication status for a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Publish,
    Pending,
    Future,
    Private,
}

impl PostStatus {
    /// Parse a requested status, silently falling back to draft on anything
    /// outside the allowed set. A malformed status never blocks publishing.
    pub fn parse_or_draft(value: &str) -> Self {
        match value {
            "publish" => PostStatus::Publish,
            "pending" => PostStatus::Pending,
            "future" => PostStatus::Future,
            "private" => PostStatus::Private,
            _ => PostStatus::Draft,
        }
    }

    /// The storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Publish => "publish",
            PostStatus::Pending => "pending",
            PostStatus::Future => "future",
            PostStatus::Private => "private",
        }
    }
}

/// Post record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub slug: String,
    pub status: String,
    pub author_id: i64,
    pub featured_image_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a post. Fields are expected to be sanitized already;
/// an empty slug is derived from the title.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub slug: String,
    pub status: PostStatus,
    pub author_id: i64,
}

impl Post {
    /// Find a post by ID.
    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch post by id")?;

        Ok(post)
    }

    /// Create a post, deriving a collision-free slug.
    pub async fn create(pool: &PgPool, input: NewPost) -> Result<Self> {
        let base = if input.slug.is_empty() {
            sanitize::slugify(&input.title)
        } else {
            input.slug.clone()
        };
        // A title with no slug-safe characters still needs a usable slug.
        let base = if base.is_empty() {
            format!("post-{}", Utc::now().timestamp())
        } else {
            base
        };

        let slug = unique_slug(pool, &base).await?;

        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (title, content, excerpt, slug, status, author_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&input.title)
        .bind(&input.content)
        .bind(&input.excerpt)
        .bind(&slug)
        .bind(input.status.as_str())
        .bind(input.author_id)
        .fetch_one(pool)
        .await
        .context("failed to create post")?;

        Ok(post)
    }

    /// Set the post's featured image.
    pub async fn set_featured_image(pool: &PgPool, id: i64, attachment_id: i64) -> Result<()> {
        sqlx::query("UPDATE posts SET featured_image_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(attachment_id)
            .execute(pool)
            .await
            .context("failed to set featured image")?;

        Ok(())
    }

    /// Upsert one post metadata pair.
    pub async fn set_meta(pool: &PgPool, id: i64, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO post_meta (post_id, key, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (post_id, key) DO UPDATE SET value = $3
            "#,
        )
        .bind(id)
        .bind(key)
        .bind(value)
        .execute(pool)
        .await
        .context("failed to set post meta")?;

        Ok(())
    }
}

/// Find a slug not yet taken, appending `-2`, `-3`, … to the base on
/// collision. One prefix query instead of sequential lookups.
async fn unique_slug(pool: &PgPool, base: &str) -> Result<String> {
    // Escape LIKE wildcards in the base before building the pattern
    let escaped = base
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let like_pattern = format!("{escaped}%");

    let existing: Vec<(String,)> =
        sqlx::query_as("SELECT slug FROM posts WHERE slug LIKE $1 LIMIT 200")
            .bind(&like_pattern)
            .fetch_all(pool)
            .await
            .context("failed to check slug uniqueness")?;

    let existing_set: std::collections::HashSet<&str> =
        existing.iter().map(|(s,)| s.as_str()).collect();

    if !existing_set.contains(base) {
        return Ok(base.to_string());
    }

    for i in 2..100 {
        let candidate = format!("{base}-{i}");
        if !existing_set.contains(candidate.as_str()) {
            return Ok(candidate);
        }
    }

    // Fallback: timestamp suffix for guaranteed uniqueness
    Ok(format!("{base}-{}", Utc::now().timestamp()))
}
