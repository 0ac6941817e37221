//! File ingestion service.
//!
//! Validates fetched image bytes, writes them to storage, and records
//! an attachment row pointing at the stored file.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use tracing::debug;

use super::storage::FileStorage;
use crate::models::Attachment;

/// Maximum ingested file size (10 MB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// MIME types accepted for sideloaded images.
pub const ALLOWED_IMAGE_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// A successfully stored file.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub attachment_id: i64,
    pub filename: String,
    pub uri: String,
    pub url: String,
    pub size: i64,
    pub mime_type: String,
}

/// File service: validates, stores, and records ingested files.
#[derive(Clone)]
pub struct FileService {
    pool: PgPool,
    storage: Arc<dyn FileStorage>,
}

impl FileService {
    /// Create a new file service.
    pub fn new(pool: PgPool, storage: Arc<dyn FileStorage>) -> Self {
        Self { pool, storage }
    }

    /// Store image bytes and record them as an attachment of `post_id`.
    ///
    /// Validates size and MIME type before writing. If the database insert
    /// fails after the file was written, the stored file is removed again.
    pub async fn attach_image(
        &self,
        post_id: i64,
        filename: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<StoredFile> {
        if data.len() > MAX_FILE_SIZE {
            bail!(
                "file too large: {} bytes (max {} bytes)",
                data.len(),
                MAX_FILE_SIZE
            );
        }

        if !ALLOWED_IMAGE_TYPES.contains(&mime_type) {
            bail!("file type not allowed: {mime_type}");
        }

        let uri = self.storage.generate_uri(filename);

        self.storage
            .write(&uri, data)
            .await
            .context("failed to write file to storage")?;

        let attachment = match Attachment::create(
            &self.pool,
            post_id,
            filename,
            &uri,
            mime_type,
            data.len() as i64,
        )
        .await
        {
            Ok(attachment) => attachment,
            Err(err) => {
                // Do not leave an orphaned file behind.
                if let Err(delete_err) = self.storage.delete(&uri).await {
                    tracing::warn!(error = %delete_err, uri = %uri, "failed to remove orphaned file");
                }
                return Err(err);
            }
        };

        let url = self.storage.public_url(&uri);

        debug!(
            attachment_id = attachment.id,
            filename = %filename,
            uri = %uri,
            size = data.len(),
            "image attached"
        );

        Ok(StoredFile {
            attachment_id: attachment.id,
            filename: filename.to_string(),
            uri,
            url,
            size: data.len() as i64,
            mime_type: mime_type.to_string(),
        })
    }

    /// Get the storage backend.
    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.storage
    }
}

impl std::fmt::Debug for FileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileService").finish()
    }
}
