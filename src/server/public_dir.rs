//! Public directory
//!
//! Files under `public_dir` are served verbatim at the root of the public
//! path. The directory is scanned once at startup; files added later are
//! picked up through the watcher by the host, not here.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, Method, StatusCode};
use axum::response::Response;
use futures_util::future::BoxFuture;
use percent_encoding::percent_decode_str;
use walkdir::WalkDir;

use super::errors::{ServerError, ServerResult};
use super::middleware::{status_response, Middleware, Next};
use crate::config::DevConfig;
use crate::observability::{log_event_with_fields, Event};

/// Scanned public files, as URL paths relative to the public path
#[derive(Debug, Clone, Default)]
pub struct PublicFiles {
    dir: Option<PathBuf>,
    files: HashSet<String>,
}

impl PublicFiles {
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Whether `url_path` (e.g. `/favicon.ico`) names a public file
    pub fn contains(&self, url_path: &str) -> bool {
        self.files.contains(url_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Scan the public directory
///
/// A missing or disabled directory yields an empty set.
pub async fn init_public_files(config: &DevConfig) -> ServerResult<PublicFiles> {
    let Some(dir) = config.public_dir_path() else {
        return Ok(PublicFiles::default());
    };

    let scan_dir = dir.clone();
    let files = tokio::task::spawn_blocking(move || scan(&scan_dir))
        .await
        .map_err(|e| ServerError::Internal(format!("public dir scan failed: {}", e)))??;

    log_event_with_fields(
        Event::PublicFilesScanned,
        &[
            ("dir", &dir.display().to_string()),
            ("files", &files.len().to_string()),
        ],
    );

    Ok(PublicFiles {
        dir: Some(dir),
        files,
    })
}

fn scan(dir: &Path) -> ServerResult<HashSet<String>> {
    let mut files = HashSet::new();
    if !dir.is_dir() {
        return Ok(files);
    }

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| ServerError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(dir) {
            let url: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.insert(format!("/{}", url.join("/")));
        }
    }

    Ok(files)
}

/// Serves GET/HEAD requests that name a scanned public file
pub struct PublicFilesMiddleware {
    files: PublicFiles,
    public_path: String,
}

impl PublicFilesMiddleware {
    pub fn new(files: PublicFiles, public_path: impl Into<String>) -> Self {
        Self {
            files,
            public_path: public_path.into(),
        }
    }

    /// File for a request path, which arrives percent-encoded
    fn lookup(&self, uri_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(uri_path).decode_utf8().ok()?;
        let base = self.public_path.trim_end_matches('/');
        let relative = decoded.strip_prefix(base)?;
        if !self.files.contains(relative) {
            return None;
        }
        let dir = self.files.dir()?;
        Some(dir.join(relative.trim_start_matches('/')))
    }

    async fn serve(path: PathBuf, head: bool) -> Response {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => return status_response(StatusCode::NOT_FOUND),
        };

        let length = bytes.len();
        let body = if head { Body::empty() } else { Body::from(bytes) };

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type(&path))
            .header(header::CONTENT_LENGTH, length)
            .header(header::CACHE_CONTROL, "no-cache")
            .body(body)
            .unwrap_or_else(|_| status_response(StatusCode::INTERNAL_SERVER_ERROR))
    }
}

impl Middleware for PublicFilesMiddleware {
    fn name(&self) -> &str {
        "publicFiles"
    }

    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let method = req.method().clone();
            if method != Method::GET && method != Method::HEAD {
                return next.run(req).await;
            }
            match self.lookup(req.uri().path()) {
                Some(path) => Self::serve(path, method == Method::HEAD).await,
                None => next.run(req).await,
            }
        })
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "wasm" => "application/wasm",
        "woff2" => "font/woff2",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
