//! Input sanitization helpers.
//!
//! Publish payloads arrive as untrusted text. Each helper reduces a field to
//! the shape the store expects: single-line display text, rich text limited to
//! a safe HTML subset, URL slugs, metadata keys, and filenames.

use std::sync::LazyLock;

use regex::Regex;

/// Regex for markup tags to strip from plain-text fields.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex literal"));

/// Regex for script/style elements whose content must go with them.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static SCRIPT_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").expect("valid regex literal")
});

/// Reduce untrusted input to a single line of display text.
///
/// Removes script/style elements with their content, strips remaining markup
/// and control characters, collapses whitespace runs into single spaces, and
/// trims the ends.
pub fn plain_text(input: &str) -> String {
    let without_scripts = SCRIPT_STYLE.replace_all(input, "");
    let stripped = MARKUP.replace_all(&without_scripts, "");

    let mut out = String::with_capacity(stripped.len());
    let mut prev_space = true; // Start true to drop leading whitespace
    for c in stripped.chars() {
        if c.is_whitespace() || c.is_control() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }

    while out.ends_with(' ') {
        out.pop();
    }

    out
}

/// Like [`plain_text`] but keeps line breaks, for multi-line fields such as
/// excerpts.
pub fn textarea(input: &str) -> String {
    input
        .lines()
        .map(plain_text)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

/// Reduce rich text to a safe HTML subset.
///
/// ammonia's default allow list keeps the usual formatting tags and removes
/// script/style elements (including their content), event handlers, and
/// non-whitelisted attributes.
pub fn rich_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Convert text into a URL-safe slug.
///
/// Lowercases, replaces non-alphanumeric characters with hyphens, collapses
/// consecutive hyphens, trims the ends, and caps the length at 128.
pub fn slugify(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();

    let mut slug = String::with_capacity(mapped.len());
    let mut prev_was_hyphen = true; // Start true to skip leading hyphens
    for c in mapped.chars() {
        if c == '-' {
            if !prev_was_hyphen {
                slug.push('-');
            }
            prev_was_hyphen = true;
        } else {
            slug.push(c);
            prev_was_hyphen = false;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.len() > 128 {
        // The slug is pure ASCII at this point, but stay on a char boundary
        // in case the mapping above ever changes.
        let mut end = 128;
        while end > 0 && !slug.is_char_boundary(end) {
            end -= 1;
        }
        let truncated = &slug[..end];
        // Break at a hyphen rather than mid-word when possible.
        if let Some(last_hyphen) = truncated.rfind('-') {
            return truncated[..last_hyphen].to_string();
        }
        return truncated.to_string();
    }

    slug
}

/// Reduce a metadata key to a storage-safe token (`[a-z0-9_-]`).
pub fn meta_key(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Sanitize a filename for safe storage.
///
/// Drops any path component and maps characters outside
/// `[a-zA-Z0-9._-]` to underscores.
pub fn file_name(filename: &str) -> String {
    use std::path::Path;

    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect::<String>()
        .chars()
        .take(200)
        .collect()
}
