//! Development server with live reload.
//!
//! Serves the output directory (or proxies an existing server) on all
//! interfaces and pushes reload events to browsers over a WebSocket.

pub mod proxy;
pub mod reload;
pub mod static_files;

pub use proxy::{normalize_upstream, Proxy};
pub use reload::{ReloadEvent, ReloadHandle};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Request, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// WebSocket endpoint browsers connect to.
pub const LIVERELOAD_PATH: &str = "/__assetflow/livereload";
/// Live-reload client script.
pub const CLIENT_PATH: &str = "/__assetflow/client.js";

const CLIENT_JS: &str = include_str!("client.js");

/// Dev server errors.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("Proxy error: {0}")]
    Proxy(String),
}

/// Where and what to serve.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Port on all interfaces; 0 picks a free port
    pub port: u16,
    /// Upstream to proxy instead of serving `dist`
    pub proxy: Option<String>,
    /// Output directory served when not proxying
    pub dist: PathBuf,
}

#[derive(Clone)]
struct AppState {
    reload: ReloadHandle,
    dist: Arc<PathBuf>,
    proxy: Option<Arc<Proxy>>,
}

/// Insert the live-reload script tag before `</body>`, or append it.
pub fn inject_client(html: &str) -> String {
    let tag = format!("<script src=\"{}\" async></script>", CLIENT_PATH);
    match html.rfind("</body>") {
        Some(index) => format!("{}{}{}", &html[..index], tag, &html[index..]),
        None => format!("{}{}", html, tag),
    }
}

/// A running dev server.
#[derive(Debug)]
pub struct DevServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl DevServer {
    /// Bind and start serving in the background.
    pub async fn start(options: ServeOptions, reload: ReloadHandle) -> Result<Self, ServeError> {
        let proxy = options.proxy.as_deref().map(Proxy::new).transpose()?.map(Arc::new);
        let state = AppState { reload, dist: Arc::new(options.dist), proxy };

        let addr = SocketAddr::from(([0, 0, 0, 0], options.port));
        let listener =
            TcpListener::bind(addr).await.map_err(|source| ServeError::Bind { addr, source })?;
        let addr = listener.local_addr().map_err(|source| ServeError::Bind { addr, source })?;

        let port = addr.port();
        match &state.proxy {
            Some(proxy) => {
                tracing::info!("Proxying {} at http://localhost:{}", proxy.upstream(), port)
            }
            None => tracing::info!("Serving {} at http://localhost:{}", state.dist.display(), port),
        }

        let app = router(state);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("dev server stopped: {}", e);
            }
        });

        Ok(Self { addr, handle })
    }

    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait until the server task ends.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            tracing::error!("dev server task failed: {}", e);
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route(LIVERELOAD_PATH, get(livereload))
        .route(CLIENT_PATH, get(client_script))
        .fallback(fallback)
        .with_state(state)
}

async fn client_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], CLIENT_JS)
}

async fn livereload(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| push_events(socket, state.reload))
}

async fn push_events(mut socket: WebSocket, reload: ReloadHandle) {
    let mut events = reload.subscribe();
    tracing::debug!("live-reload client connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let Ok(json) = serde_json::to_string(&event) else { continue };
                    if socket.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "live-reload client lagged");
                }
                Err(RecvError::Closed) => break,
            },
            message = socket.recv() => match message {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("live-reload client disconnected");
}

async fn fallback(State(state): State<AppState>, request: Request) -> Response {
    match &state.proxy {
        Some(proxy) => proxy.forward(request).await,
        None => static_files::serve(&state.dist, request.uri().path()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_inject_client_before_body_close() {
        let html = inject_client("<html><body><p>x</p></body></html>");
        assert_eq!(
            html,
            "<html><body><p>x</p>\
             <script src=\"/__assetflow/client.js\" async></script></body></html>"
        );
    }

    #[test]
    fn test_inject_client_without_body() {
        assert!(inject_client("<p>fragment</p>").ends_with("</script>"));
    }

    #[tokio::test]
    async fn test_server_serves_client_and_dist() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("style.css"), "body{}").unwrap();

        let options = ServeOptions { port: 0, proxy: None, dist: temp.path().to_path_buf() };
        let server = DevServer::start(options, ReloadHandle::new()).await.unwrap();
        let base = format!("http://127.0.0.1:{}", server.local_addr().port());

        let client = reqwest::get(format!("{}{}", base, CLIENT_PATH)).await.unwrap();
        assert!(client.text().await.unwrap().contains("WebSocket"));

        let css = reqwest::get(format!("{}/style.css", base)).await.unwrap();
        assert_eq!(css.headers()["content-type"], "text/css");
        assert_eq!(css.text().await.unwrap(), "body{}");
    }

    #[tokio::test]
    async fn test_server_proxies_upstream() {
        let upstream_dir = TempDir::new().unwrap();
        std::fs::write(upstream_dir.path().join("index.html"), "<body>upstream</body>").unwrap();
        let upstream = DevServer::start(
            ServeOptions { port: 0, proxy: None, dist: upstream_dir.path().to_path_buf() },
            ReloadHandle::new(),
        )
        .await
        .unwrap();

        let options = ServeOptions {
            port: 0,
            proxy: Some(format!("127.0.0.1:{}", upstream.local_addr().port())),
            dist: PathBuf::from("unused"),
        };
        let server = DevServer::start(options, ReloadHandle::new()).await.unwrap();

        let body = reqwest::get(format!("http://127.0.0.1:{}/", server.local_addr().port()))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("upstream"));
        assert!(body.contains(CLIENT_PATH));
    }
}
