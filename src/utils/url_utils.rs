//! URL and path helpers for image sources.
//!
//! A preview's `<img src>` can be a remote URL, a data URI, a blob URI, a
//! `file://` URL, an absolute path, or an Obsidian `app://` resource URL that
//! points into the vault on disk.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// Where an image source lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Already self-contained
    Data,
    /// `http://` or `https://`
    Remote(String),
    /// A file on the local disk
    LocalFile(PathBuf),
    /// `blob:` URI owned by a live page; not reachable from here
    Blob,
    /// Relative reference that needs a base URL
    Relative(String),
}

/// Resolve a potentially relative URL against a base URL
///
/// Query strings are re-encoded so sources copied out of HTML with unencoded
/// special characters (`:`, `,`, `@`, `;`) still produce a valid request.
pub fn resolve_url(base_url: &str, url: &str) -> Result<String> {
    let base = Url::parse(base_url).context("Invalid base URL")?;
    let mut resolved = base.join(url).context("Failed to resolve URL")?;

    if resolved.query().is_some() {
        let query_pairs: Vec<(String, String)> = resolved
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        resolved.query_pairs_mut().clear();
        for (key, value) in query_pairs {
            resolved.query_pairs_mut().append_pair(&key, &value);
        }
    }

    Ok(resolved.to_string())
}

/// Classify an `<img src>` value
///
/// `vault_base` is used to map Obsidian `app://<id>/<path>` resource URLs back
/// onto the disk; without it the path part is taken as absolute.
pub fn classify_source(src: &str, vault_base: Option<&Path>) -> SourceKind {
    let trimmed = src.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with("data:") {
        return SourceKind::Data;
    }
    if lower.starts_with("blob:") {
        return SourceKind::Blob;
    }
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return SourceKind::Remote(trimmed.to_string());
    }
    if lower.starts_with("file://") {
        if let Some(path) = Url::parse(trimmed).ok().and_then(|u| u.to_file_path().ok()) {
            return SourceKind::LocalFile(path);
        }
        return SourceKind::LocalFile(PathBuf::from(&trimmed["file://".len()..]));
    }
    if lower.starts_with("app://") {
        return SourceKind::LocalFile(app_resource_path(trimmed, vault_base));
    }
    if Path::new(trimmed).is_absolute() {
        return SourceKind::LocalFile(PathBuf::from(trimmed));
    }
    SourceKind::Relative(trimmed.to_string())
}

/// Map an Obsidian resource URL to a path on disk
///
/// Resource URLs look like `app://8c2d1f/home/me/vault/img/a.png?1700000000`:
/// a host id, the percent-encoded absolute path, and a cache-busting query.
fn app_resource_path(src: &str, vault_base: Option<&Path>) -> PathBuf {
    let without_scheme = &src["app://".len()..];
    let after_host = without_scheme
        .find('/')
        .map_or("", |idx| &without_scheme[idx..]);
    let path_part = after_host
        .split(['?', '#'])
        .next()
        .unwrap_or(after_host);
    let decoded = urlencoding::decode(path_part)
        .map_or_else(|_| path_part.to_string(), std::borrow::Cow::into_owned);

    // Windows resource URLs carry a leading slash before the drive letter
    let has_drive_letter = matches!(
        decoded.as_bytes(),
        [b'/', drive, b':', ..] if drive.is_ascii_alphabetic()
    );
    let decoded = if has_drive_letter {
        decoded[1..].to_string()
    } else {
        decoded
    };

    let path = PathBuf::from(&decoded);
    match vault_base {
        Some(base) if !path.starts_with(base) && path.is_relative() => base.join(path),
        _ => path,
    }
}

/// Guess a MIME type from a file extension in a path or URL
#[must_use]
pub fn mime_from_extension(src: &str) -> Option<&'static str> {
    let trimmed = src.split(['?', '#']).next().unwrap_or(src);
    let extension = trimmed.rsplit('.').next().unwrap_or("");
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        "woff2" => Some("font/woff2"),
        "woff" => Some("font/woff"),
        "ttf" => Some("font/ttf"),
        "otf" => Some("font/otf"),
        _ => None,
    }
}

/// File extension to use when persisting a blob of the given MIME type
#[must_use]
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime.split(';').next().unwrap_or(mime).trim() {
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        _ => "png",
    }
}
