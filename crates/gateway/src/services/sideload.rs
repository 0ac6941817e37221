//! Featured-image sideloading.
//!
//! Fetches a remote image over HTTP, stores it through the file service,
//! and marks it as a post's featured image. Every failure is folded into
//! the reported outcome; sideloading never aborts a publish.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use sqlx::PgPool;
use tracing::debug;

use crate::file::FileService;
use crate::models::Post;

/// Image fetch timeout in seconds.
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Recognized image filename extensions.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static IMAGE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp)$").expect("valid regex literal")
});

/// Result of the featured-image step, reported inline in the publish
/// response. `success: false` carries an `error` instead of the id/url.
#[derive(Debug, Clone, Serialize)]
pub struct FeaturedImageOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeaturedImageOutcome {
    fn attached(attachment_id: i64, url: String) -> Self {
        Self {
            success: true,
            attachment_id: Some(attachment_id),
            url: Some(url),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            attachment_id: None,
            url: None,
            error: Some(error.into()),
        }
    }
}

/// Fetches remote images and attaches them to posts.
#[derive(Clone)]
pub struct SideloadService {
    client: reqwest::Client,
    files: FileService,
}

impl SideloadService {
    /// Create a new sideload service.
    pub fn new(files: FileService) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            // A followed redirect would sidestep the URL validation below.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self { client, files }
    }

    /// Fetch `image_url` and set it as the featured image of `post_id`.
    ///
    /// Never fails the caller: all errors are reported in the outcome.
    pub async fn attach_featured_image(
        &self,
        pool: &PgPool,
        post_id: i64,
        image_url: &str,
    ) -> FeaturedImageOutcome {
        if let Err(err) = validate_image_url(image_url) {
            return FeaturedImageOutcome::failed(err.to_string());
        }

        let response = match self.client.get(image_url).send().await {
            Ok(response) => response,
            Err(err) => {
                return FeaturedImageOutcome::failed(format!("failed to download image: {err}"));
            }
        };

        if !response.status().is_success() {
            return FeaturedImageOutcome::failed(format!(
                "image download returned HTTP {}",
                response.status().as_u16()
            ));
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                return FeaturedImageOutcome::failed(format!("failed to read image body: {err}"));
            }
        };

        let filename = derive_filename(image_url, post_id);
        let mime_type = mime_for_filename(&filename);

        let stored = match self
            .files
            .attach_image(post_id, &filename, mime_type, &bytes)
            .await
        {
            Ok(stored) => stored,
            Err(err) => return FeaturedImageOutcome::failed(err.to_string()),
        };

        if let Err(err) = Post::set_featured_image(pool, post_id, stored.attachment_id).await {
            return FeaturedImageOutcome::failed(err.to_string());
        }

        debug!(
            post_id = post_id,
            attachment_id = stored.attachment_id,
            filename = %filename,
            "featured image attached"
        );

        FeaturedImageOutcome::attached(stored.attachment_id, stored.url)
    }
}

/// Derive a filename from the URL path basename.
///
/// Falls back to a generated `scrivano-<post>-<time>.jpg` name when the
/// path has no usable basename or its extension is not a recognized
/// image format.
fn derive_filename(image_url: &str, post_id: i64) -> String {
    let basename = url::Url::parse(image_url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .map(|s| s.to_string())
        })
        .unwrap_or_default();

    if basename.is_empty() || !IMAGE_EXTENSION.is_match(&basename) {
        return format!(
            "scrivano-{}-{}.jpg",
            post_id,
            chrono::Utc::now().timestamp()
        );
    }

    basename
}

/// MIME type from the filename extension.
fn mime_for_filename(filename: &str) -> &'static str {
    match filename.rsplit('.').next().map(str::to_ascii_lowercase) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Validate that an image URL is safe to fetch (SSRF prevention).
///
/// Blocks non-HTTP(S) schemes, loopback and private addresses, link-local
/// ranges, cloud metadata endpoints, and known private hostnames.
fn validate_image_url(url_str: &str) -> Result<()> {
    let parsed = url::Url::parse(url_str).context("invalid image URL")?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => anyhow::bail!("unsupported URL scheme: {scheme}"),
    }

    let Some(host) = parsed.host() else {
        anyhow::bail!("image URL has no host");
    };

    match host {
        url::Host::Domain(domain) => {
            let domain_lower = domain.to_lowercase();
            if domain_lower == "localhost"
                || domain_lower.ends_with(".local")
                || domain_lower.ends_with(".internal")
                || domain_lower.ends_with(".localhost")
            {
                anyhow::bail!("image URL points to a private hostname: {domain}");
            }
            // Domain could also be a raw IP string in some edge cases
            if let Ok(ip) = domain.parse::<std::net::IpAddr>()
                && !is_public_ip(ip)
            {
                anyhow::bail!("image URL points to a non-public IP: {ip}");
            }
        }
        url::Host::Ipv4(ip) => {
            if !is_public_ip(std::net::IpAddr::V4(ip)) {
                anyhow::bail!("image URL points to a non-public IPv4: {ip}");
            }
        }
        url::Host::Ipv6(ip) => {
            if !is_public_ip(std::net::IpAddr::V6(ip)) {
                anyhow::bail!("image URL points to a non-public IPv6: {ip}");
            }
        }
    }

    Ok(())
}

/// Check if an IP address is publicly routable.
fn is_public_ip(ip: std::net::IpAddr) -> bool {
    match ip {
        std::net::IpAddr::V4(v4) => {
            let octets = v4.octets();
            !v4.is_loopback()         // 127.0.0.0/8
                && !v4.is_private()       // 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16
                && !v4.is_link_local()    // 169.254.0.0/16
                && !v4.is_unspecified()   // 0.0.0.0
                && !v4.is_broadcast()     // 255.255.255.255
                && !v4.is_documentation() // 192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24
                // Cloud metadata endpoint
                && v4 != std::net::Ipv4Addr::new(169, 254, 169, 254)
                // CGNAT / Shared Address Space (RFC 6598): 100.64.0.0/10
                && !(octets[0] == 100 && (octets[1] & 0xC0) == 64)
        }
        std::net::IpAddr::V6(v6) => {
            // IPv4-mapped addresses (::ffff:x.x.x.x) hide an embedded IPv4.
            if let Some(mapped_v4) = v6.to_ipv4_mapped() {
                return is_public_ip(std::net::IpAddr::V4(mapped_v4));
            }
            !v6.is_loopback()       // ::1
                && !v6.is_unspecified() // ::
                // fc00::/7 (unique local)
                && (v6.segments()[0] & 0xfe00) != 0xfc00
                // fe80::/10 (link-local)
                && (v6.segments()[0] & 0xffc0) != 0xfe80
        }
    }
}
