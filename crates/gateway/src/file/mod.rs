//! File storage and ingestion.
//!
//! Sideloaded images are written to a storage backend and recorded as
//! attachment rows.

pub mod service;
pub mod storage;

pub use service::{ALLOWED_IMAGE_TYPES, FileService, MAX_FILE_SIZE, StoredFile};
pub use storage::{FileStorage, LocalFileStorage};
