//! The `/surprise` endpoint: a random file out of a fixed directory.

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::ErrorResponse;
use crate::server::response::Response;

/// Serve a random regular file from `dir`. An empty or missing
/// directory yields 404.
pub async fn serve(dir: &Path) -> Response {
    match pick(dir).await {
        Some((content_type, body)) => Response::with_content_type(200, content_type, body),
        None => Response::json(404, ErrorResponse::new("Not found").to_bytes()),
    }
}

async fn pick(dir: &Path) -> Option<(&'static str, Vec<u8>)> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut files: Vec<PathBuf> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        match entry.file_type().await {
            Ok(kind) if kind.is_file() => files.push(entry.path()),
            _ => {}
        }
    }
    if files.is_empty() {
        tracing::debug!(dir = %dir.display(), "no surprise files available");
        return None;
    }
    let choice = &files[rand::rng().random_range(0..files.len())];
    let body = tokio::fs::read(choice).await.ok()?;
    tracing::debug!(file = %choice.display(), bytes = body.len(), "serving surprise");
    Some((content_type_for(choice), body))
}

/// MIME type from the file extension, octet-stream fallback.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
