//! Reverse proxy to an existing local web server.

use super::{inject_client, ServeError};
use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, Response, StatusCode};
use reqwest::redirect::Policy;

/// Prefix `http://` when no scheme is given and drop any trailing slash.
pub fn normalize_upstream(target: &str) -> String {
    let target = target.trim();
    let with_scheme = if target.contains("://") {
        target.to_string()
    } else {
        format!("http://{}", target)
    };
    with_scheme.trim_end_matches('/').to_string()
}

/// Forwards requests to the upstream, rewriting redirects and HTML.
#[derive(Debug, Clone)]
pub struct Proxy {
    client: reqwest::Client,
    upstream: String,
}

impl Proxy {
    pub fn new(target: &str) -> Result<Self, ServeError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| ServeError::Proxy(e.to_string()))?;
        Ok(Self { client, upstream: normalize_upstream(target) })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Point redirects to the upstream back at the dev server.
    fn rewrite_location(&self, location: &str) -> String {
        match location.strip_prefix(&self.upstream) {
            Some("") => "/".to_string(),
            Some(rest) if rest.starts_with('/') || rest.starts_with('?') => rest.to_string(),
            _ => location.to_string(),
        }
    }

    pub async fn forward(&self, request: Request) -> Response<Body> {
        match self.try_forward(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(upstream = %self.upstream, "proxy request failed: {}", e);
                let mut response = Response::new(Body::from(format!("Bad gateway: {}", e)));
                *response.status_mut() = StatusCode::BAD_GATEWAY;
                response
            }
        }
    }

    async fn try_forward(&self, request: Request) -> Result<Response<Body>, ServeError> {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let url = format!("{}{}", self.upstream, path);

        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|e| ServeError::Proxy(e.to_string()))?;

        let mut headers = parts.headers.clone();
        headers.remove(header::HOST);
        headers.remove(header::ACCEPT_ENCODING);
        headers.remove(header::CONTENT_LENGTH);

        let upstream = self
            .client
            .request(parts.method.clone(), &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| ServeError::Proxy(e.to_string()))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::TRANSFER_ENCODING);

        if let Some(location) = headers.get(header::LOCATION).and_then(|v| v.to_str().ok()) {
            let rewritten = self.rewrite_location(location);
            if let Ok(value) = HeaderValue::from_str(&rewritten) {
                headers.insert(header::LOCATION, value);
            }
        }

        let is_html = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/html"));

        let bytes = upstream.bytes().await.map_err(|e| ServeError::Proxy(e.to_string()))?;
        let body = if is_html {
            Body::from(inject_client(&String::from_utf8_lossy(&bytes)))
        } else {
            Body::from(bytes)
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
