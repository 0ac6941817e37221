//! HTTP middleware components.

pub mod api_key;

pub use api_key::{API_KEY_HEADER, LEGACY_API_KEY_HEADER, require_api_key, require_api_key_legacy};
