//! The publish pipeline.
//!
//! Turns an authenticated publish request into a stored post plus its side
//! effects. Post creation is the only fatal step; categories, tags, the
//! featured image, and metadata are each best-effort, so a caller never
//! loses a created post because a decorative step failed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{NewPost, Post, PostStatus, Taxonomy, Term, User};
use crate::sanitize;
use crate::services::sideload::{FeaturedImageOutcome, SideloadService};

/// Incoming publish payload. Every field except the title is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublishRequest {
    pub title: String,
    pub content: String,
    pub status: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub featured_image_url: String,
    pub excerpt: String,
    pub slug: String,
    pub author_id: i64,
    pub meta: HashMap<String, String>,
}

/// The created post as reported back to the caller.
#[derive(Debug, Serialize)]
pub struct PublishedPost {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub status: String,
    pub url: String,
    pub edit_url: String,
    pub author: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub featured_image: Option<FeaturedImageOutcome>,
    pub created_at: DateTime<Utc>,
}

/// What the category step did: how many terms ended up assigned to the
/// post and which ones this request created.
#[derive(Debug, Default, Serialize)]
pub struct CategorySummary {
    pub assigned: usize,
    pub created: Vec<String>,
}

/// Success envelope for the publish endpoint.
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub success: bool,
    pub post: PublishedPost,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<CategorySummary>,
    pub message: String,
}

/// Drives the publish pipeline against the content store.
#[derive(Clone)]
pub struct PublishService {
    pool: PgPool,
    sideload: SideloadService,
    site_url: String,
}

impl PublishService {
    /// Create a new publish service.
    pub fn new(pool: PgPool, sideload: SideloadService, site_url: &str) -> Self {
        Self {
            pool,
            sideload,
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Run the pipeline: create the post, then apply categories, tags, the
    /// featured image, and metadata in order.
    ///
    /// Only a missing title or a failed insert aborts; every later step
    /// logs its failure and lets the rest proceed.
    pub async fn publish(&self, request: PublishRequest) -> ApiResult<PublishResponse> {
        let title = sanitize::plain_text(&request.title);
        if title.is_empty() {
            return Err(ApiError::MissingTitle);
        }

        let author_id = if request.author_id > 0 {
            request.author_id
        } else {
            User::default_author_id(&self.pool).await?
        };

        let post = Post::create(
            &self.pool,
            NewPost {
                title,
                content: sanitize::rich_html(&request.content),
                excerpt: sanitize::textarea(&request.excerpt),
                slug: sanitize::slugify(&request.slug),
                status: PostStatus::parse_or_draft(&request.status),
                author_id,
            },
        )
        .await
        .map_err(creation_error)?;

        let categories = if request.categories.is_empty() {
            None
        } else {
            Some(self.assign_categories(post.id, &request.categories).await)
        };

        if !request.tags.is_empty() {
            self.assign_tags(post.id, &request.tags).await;
        }

        let featured_image = match request.featured_image_url.trim() {
            "" => None,
            url => Some(
                self.sideload
                    .attach_featured_image(&self.pool, post.id, url)
                    .await,
            ),
        };

        for (key, value) in &request.meta {
            let key = sanitize::meta_key(key);
            if key.is_empty() {
                continue;
            }
            let value = sanitize::plain_text(value);
            if let Err(err) = Post::set_meta(&self.pool, post.id, &key, &value).await {
                warn!(post_id = post.id, key = %key, error = %err, "failed to set post meta");
            }
        }

        info!(post_id = post.id, status = %post.status, "post published");

        Ok(self.assemble(post, categories, featured_image).await)
    }

    /// Resolve category names to terms and assign them in one call.
    ///
    /// Names that cannot be resolved or created are skipped; the summary
    /// reflects only what actually happened.
    async fn assign_categories(&self, post_id: i64, names: &[String]) -> CategorySummary {
        let mut term_ids = Vec::new();
        let mut created = Vec::new();

        for raw in names {
            let name = sanitize::plain_text(raw);
            if name.is_empty() {
                continue;
            }
            match Term::find_or_create(&self.pool, Taxonomy::Category, &name).await {
                Ok((term, inserted)) => {
                    term_ids.push(term.id);
                    if inserted {
                        created.push(term.name);
                    }
                }
                Err(err) => {
                    warn!(category = %name, error = %err, "skipping category");
                }
            }
        }

        if term_ids.is_empty() {
            return CategorySummary { assigned: 0, created };
        }

        if let Err(err) =
            Term::set_for_post(&self.pool, post_id, Taxonomy::Category, &term_ids).await
        {
            warn!(post_id = post_id, error = %err, "failed to assign categories");
            return CategorySummary { assigned: 0, created };
        }

        CategorySummary {
            assigned: term_ids.len(),
            created,
        }
    }

    /// Find or create tag terms and assign them; failures only log.
    async fn assign_tags(&self, post_id: i64, names: &[String]) {
        let mut term_ids = Vec::new();

        for raw in names {
            let name = sanitize::plain_text(raw);
            if name.is_empty() {
                continue;
            }
            match Term::find_or_create(&self.pool, Taxonomy::Tag, &name).await {
                Ok((term, _)) => term_ids.push(term.id),
                Err(err) => {
                    warn!(tag = %name, error = %err, "skipping tag");
                }
            }
        }

        if term_ids.is_empty() {
            return;
        }

        if let Err(err) = Term::set_for_post(&self.pool, post_id, Taxonomy::Tag, &term_ids).await {
            warn!(post_id = post_id, error = %err, "failed to assign tags");
        }
    }

    /// Re-read canonical state after all mutations and shape the response.
    async fn assemble(
        &self,
        post: Post,
        categories: Option<CategorySummary>,
        featured_image: Option<FeaturedImageOutcome>,
    ) -> PublishResponse {
        let post = match Post::find(&self.pool, post.id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => post,
            Err(err) => {
                warn!(post_id = post.id, error = %err, "failed to re-read post");
                post
            }
        };

        let category_names = self.term_names(post.id, Taxonomy::Category).await;
        let tag_names = self.term_names(post.id, Taxonomy::Tag).await;

        let author = match User::find(&self.pool, post.author_id).await {
            Ok(Some(user)) => user.display_name().to_string(),
            Ok(None) => String::new(),
            Err(err) => {
                warn!(post_id = post.id, error = %err, "failed to load post author");
                String::new()
            }
        };

        let url = format!("{}/post/{}", self.site_url, post.slug);
        let edit_url = format!("{}/admin/posts/{}", self.site_url, post.id);
        let message = format!(
            "Post \"{}\" created successfully as {}.",
            post.title, post.status
        );

        PublishResponse {
            success: true,
            post: PublishedPost {
                id: post.id,
                title: post.title,
                slug: post.slug,
                status: post.status,
                url,
                edit_url,
                author,
                categories: category_names,
                tags: tag_names,
                featured_image,
                created_at: post.created_at,
            },
            categories,
            message,
        }
    }

    async fn term_names(&self, post_id: i64, taxonomy: Taxonomy) -> Vec<String> {
        match Term::names_for_post(&self.pool, post_id, taxonomy).await {
            Ok(names) => names,
            Err(err) => {
                warn!(post_id = post_id, error = %err, "failed to read assigned terms");
                Vec::new()
            }
        }
    }
}

/// Map a post insert failure to the caller-facing error.
///
/// A foreign-key violation on the author column means the caller named a
/// user that does not exist; anything else stays generic so storage detail
/// never reaches the response.
fn creation_error(err: anyhow::Error) -> ApiError {
    if let Some(db_err) = err
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        && db_err.constraint() == Some("posts_author_id_fkey")
    {
        return ApiError::PostCreationFailed("post author does not exist".to_string());
    }

    warn!(error = %err, "post insert failed");
    ApiError::PostCreationFailed("failed to create post".to_string())
}
