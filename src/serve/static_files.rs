//! Static file serving from the output directory.

use super::inject_client;
use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use mime_guess::{mime, Mime, MimeGuess};
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};

/// Map a percent-encoded request path onto a file under `root`.
///
/// Returns `None` for paths that try to leave `root` or are not valid UTF-8.
pub fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(request_path).decode_utf8().ok()?;

    let mut path = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if path.is_dir() {
        path.push("index.html");
    }
    Some(path)
}

/// Content type guessed from a file extension.
pub fn content_type(path: &Path) -> Mime {
    MimeGuess::from_path(path).first_or_octet_stream()
}

fn is_html(mime: &Mime) -> bool {
    mime.type_() == mime::TEXT && mime.subtype() == mime::HTML
}

fn status(code: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::from(code.canonical_reason().unwrap_or_default()));
    *response.status_mut() = code;
    response
}

/// Serve `request_path` from `root`, injecting the live-reload client into HTML.
pub async fn serve(root: &Path, request_path: &str) -> Response<Body> {
    let Some(path) = resolve(root, request_path) else {
        return status(StatusCode::FORBIDDEN);
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return status(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to read file: {}", e);
            return status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let mime = content_type(&path);
    let body = if is_html(&mime) {
        Body::from(inject_client(&String::from_utf8_lossy(&bytes)))
    } else {
        Body::from(bytes)
    };

    let mut response = Response::new(body);
    let content_type = HeaderValue::from_str(mime.as_ref())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    response.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}
