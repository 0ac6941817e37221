//! Key/value settings model.
//!
//! Holds the handful of values the gateway persists outside content rows:
//! the shared API secret and the public site name.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Settings record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setting {
    /// Setting key.
    pub key: String,

    /// Setting value (JSON).
    pub value: serde_json::Value,

    /// When this setting was last updated.
    pub updated: chrono::DateTime<chrono::Utc>,
}

impl Setting {
    /// Get a setting value by key.
    pub async fn get(pool: &PgPool, key: &str) -> Result<Option<serde_json::Value>> {
        let result =
            sqlx::query_scalar::<_, serde_json::Value>("SELECT value FROM settings WHERE key = $1")
                .bind(key)
                .fetch_optional(pool)
                .await
                .context("failed to get setting")?;

        Ok(result)
    }

    /// Set a setting value.
    pub async fn set(pool: &PgPool, key: &str, value: serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = $2, updated = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await
        .context("failed to set setting")?;

        Ok(())
    }

    /// Get a string-valued setting by key.
    pub async fn get_string(pool: &PgPool, key: &str) -> Result<Option<String>> {
        let value = Self::get(pool, key).await?;
        Ok(value.and_then(|v| v.as_str().map(String::from)))
    }

    /// Set a string-valued setting.
    pub async fn set_string(pool: &PgPool, key: &str, value: &str) -> Result<()> {
        Self::set(pool, key, serde_json::json!(value)).await
    }

    /// Get the site name.
    pub async fn site_name(pool: &PgPool) -> Result<String> {
        let value = Self::get_string(pool, "site_name").await?;
        Ok(value.unwrap_or_else(|| "Scrivano".to_string()))
    }
}
