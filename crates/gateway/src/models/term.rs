//! Term models: categories and tags stored in a single table.
//!
//! Both vocabularies share the `terms` table, keyed by taxonomy.
//! Categories may carry a parent reference; tags are always flat.
//! Posts are linked to terms through the `post_terms` junction table.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::sanitize;

/// Which vocabulary a term belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxonomy {
    Category,
    Tag,
}

impl Taxonomy {
    /// Database value for this taxonomy.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Tag => "tag",
        }
    }
}

/// A single category or tag.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Term {
    pub id: i64,

    /// Taxonomy this term belongs to ("category" or "tag").
    pub taxonomy: String,

    /// Human-readable name.
    pub name: String,

    /// URL-safe identifier, unique within its taxonomy.
    pub slug: String,

    /// Optional description (empty string when unset).
    pub description: String,

    /// Parent term for hierarchical categories (NULL for roots and tags).
    pub parent_id: Option<i64>,
}

/// Term row joined with its post count, for the listing endpoints.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TermWithCount {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub parent_id: Option<i64>,
    pub count: i64,
}

impl Term {
    /// Find a term by slug within a taxonomy.
    pub async fn find_by_slug(pool: &PgPool, taxonomy: Taxonomy, slug: &str) -> Result<Option<Self>> {
        let term = sqlx::query_as::<_, Self>(
            "SELECT * FROM terms WHERE taxonomy = $1 AND slug = $2",
        )
        .bind(taxonomy.as_str())
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("failed to fetch term by slug")?;

        Ok(term)
    }

    /// Find a term by name within a taxonomy (case-insensitive).
    pub async fn find_by_name(pool: &PgPool, taxonomy: Taxonomy, name: &str) -> Result<Option<Self>> {
        let term = sqlx::query_as::<_, Self>(
            "SELECT * FROM terms WHERE taxonomy = $1 AND LOWER(name) = LOWER($2)",
        )
        .bind(taxonomy.as_str())
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("failed to fetch term by name")?;

        Ok(term)
    }

    /// Create a new term with a slug derived from its name.
    pub async fn create(pool: &PgPool, taxonomy: Taxonomy, name: &str) -> Result<Self> {
        let slug = sanitize::slugify(name);
        if slug.is_empty() {
            anyhow::bail!("term name produces an empty slug");
        }

        let term = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO terms (taxonomy, name, slug, description)
            VALUES ($1, $2, $3, '')
            RETURNING *
            "#,
        )
        .bind(taxonomy.as_str())
        .bind(name)
        .bind(&slug)
        .fetch_one(pool)
        .await
        .context("failed to create term")?;

        Ok(term)
    }

    /// Resolve a name to an existing term, creating one if nothing matches.
    /// The returned flag is true when this call inserted the term.
    ///
    /// Lookup order mirrors what callers send: an exact slug match wins,
    /// then a case-insensitive name match, then a fresh insert. If two
    /// requests race to create the same slug, the loser re-reads the row
    /// the winner inserted.
    pub async fn find_or_create(
        pool: &PgPool,
        taxonomy: Taxonomy,
        name: &str,
    ) -> Result<(Self, bool)> {
        let slug = sanitize::slugify(name);

        if !slug.is_empty()
            && let Some(term) = Self::find_by_slug(pool, taxonomy, &slug).await?
        {
            return Ok((term, false));
        }

        if let Some(term) = Self::find_by_name(pool, taxonomy, name).await? {
            return Ok((term, false));
        }

        match Self::create(pool, taxonomy, name).await {
            Ok(term) => Ok((term, true)),
            Err(err) => {
                // Unique violation on (taxonomy, slug) means we lost the race.
                if !slug.is_empty()
                    && let Some(term) = Self::find_by_slug(pool, taxonomy, &slug).await?
                {
                    return Ok((term, false));
                }
                Err(err)
            }
        }
    }

    /// Replace a post's term assignments within one taxonomy.
    pub async fn set_for_post(
        pool: &PgPool,
        post_id: i64,
        taxonomy: Taxonomy,
        term_ids: &[i64],
    ) -> Result<()> {
        let mut tx = pool.begin().await.context("failed to start transaction")?;

        sqlx::query(
            r#"
            DELETE FROM post_terms
            USING terms
            WHERE post_terms.term_id = terms.id
              AND post_terms.post_id = $1
              AND terms.taxonomy = $2
            "#,
        )
        .bind(post_id)
        .bind(taxonomy.as_str())
        .execute(&mut *tx)
        .await
        .context("failed to clear post terms")?;

        for term_id in term_ids {
            sqlx::query(
                "INSERT INTO post_terms (post_id, term_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(term_id)
            .execute(&mut *tx)
            .await
            .context("failed to assign term")?;
        }

        tx.commit().await.context("failed to commit transaction")?;

        Ok(())
    }

    /// List all categories with post counts, busiest first.
    pub async fn list_categories(pool: &PgPool) -> Result<Vec<TermWithCount>> {
        let categories = sqlx::query_as::<_, TermWithCount>(
            r#"
            SELECT t.id, t.name, t.slug, t.description, t.parent_id,
                   COUNT(pt.post_id) AS count
            FROM terms t
            LEFT JOIN post_terms pt ON pt.term_id = t.id
            WHERE t.taxonomy = 'category'
            GROUP BY t.id
            ORDER BY COUNT(pt.post_id) DESC, t.name ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .context("failed to list categories")?;

        Ok(categories)
    }

    /// List the most-used tags with post counts, up to `limit` entries.
    pub async fn list_tags(pool: &PgPool, limit: i64) -> Result<Vec<TermWithCount>> {
        let tags = sqlx::query_as::<_, TermWithCount>(
            r#"
            SELECT t.id, t.name, t.slug, t.description, t.parent_id,
                   COUNT(pt.post_id) AS count
            FROM terms t
            LEFT JOIN post_terms pt ON pt.term_id = t.id
            WHERE t.taxonomy = 'tag'
            GROUP BY t.id
            ORDER BY COUNT(pt.post_id) DESC, t.name ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("failed to list tags")?;

        Ok(tags)
    }

    /// Names of the terms assigned to a post within one taxonomy.
    pub async fn names_for_post(
        pool: &PgPool,
        post_id: i64,
        taxonomy: Taxonomy,
    ) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT t.name
            FROM terms t
            INNER JOIN post_terms pt ON pt.term_id = t.id
            WHERE pt.post_id = $1 AND t.taxonomy = $2
            ORDER BY t.name
            "#,
        )
        .bind(post_id)
        .bind(taxonomy.as_str())
        .fetch_all(pool)
        .await
        .context("failed to fetch post terms")?;

        Ok(names)
    }
}
