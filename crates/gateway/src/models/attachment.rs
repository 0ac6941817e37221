//! Attachment model: stored files linked to posts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// A stored file, typically a sideloaded featured image.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attachment {
    pub id: i64,

    /// Post this file belongs to.
    pub post_id: Option<i64>,

    /// Original filename, sanitized.
    pub filename: String,

    /// Storage URI (e.g. `local://2025/08/a1b2c3d4_cover.jpg`).
    pub uri: String,

    pub mime_type: String,
    pub filesize: i64,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    /// Create an attachment record for a stored file.
    pub async fn create(
        pool: &PgPool,
        post_id: i64,
        filename: &str,
        uri: &str,
        mime_type: &str,
        filesize: i64,
    ) -> Result<Self> {
        let attachment = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO attachments (post_id, filename, uri, mime_type, filesize)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(post_id)
        .bind(filename)
        .bind(uri)
        .bind(mime_type)
        .bind(filesize)
        .fetch_one(pool)
        .await
        .context("failed to create attachment")?;

        Ok(attachment)
    }
}
