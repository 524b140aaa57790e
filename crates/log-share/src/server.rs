//! Log HTTP server
//!
//! axum router serving a directory listing and individual log files, plus a
//! handle that runs it in the background until shut down.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, debug};

use emuctl_core::{EmuError, Result};

#[derive(Clone)]
struct AppState {
    log_dir: Arc<PathBuf>,
}

/// Where and what to serve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogServerConfig {
    pub log_dir: PathBuf,
    pub host: IpAddr,
    pub port: u16,
}

impl LogServerConfig {
    /// Listen on every interface
    pub fn new(log_dir: PathBuf, port: u16) -> Self {
        Self {
            log_dir,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
        }
    }
}

/// A running log server
pub struct LogServer {
    address: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join: tokio::task::JoinHandle<()>,
}

impl LogServer {
    /// Bind and start serving in the background
    pub async fn start(config: LogServerConfig) -> Result<Self> {
        if !config.log_dir.is_dir() {
            return Err(EmuError::NotFound(config.log_dir));
        }

        let listener = TcpListener::bind((config.host, config.port))
            .await
            .map_err(|e| EmuError::Server(format!("failed to bind listener: {}", e)))?;
        let address = listener.local_addr()?;
        let app = build_router(config.log_dir);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                error!("Log server stopped: {}", e);
            }
        });

        Ok(Self {
            address,
            shutdown: Some(shutdown_tx),
            join,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Stop accepting connections and wait for the server task
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.join
            .await
            .map_err(|e| EmuError::Server(format!("server join failed: {}", e)))
    }
}

/// `/` lists the log directory, `/<name>` returns one file
pub fn build_router(log_dir: PathBuf) -> Router {
    let state = AppState {
        log_dir: Arc::new(log_dir),
    };

    Router::new()
        .route("/", get(directory_listing))
        .route("/*name", get(log_file))
        .with_state(state)
}

async fn directory_listing(State(state): State<AppState>) -> Response {
    let mut names = match list_dir(&state.log_dir).await {
        Ok(names) => names,
        Err(e) => {
            error!("Error listing {:?}: {}", state.log_dir, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };
    names.sort();

    let mut html = String::from("<html><body>");
    for name in &names {
        let name = escape_html(name);
        html.push_str(&format!("<p><a href=\"{}\">{}</a></p>", name, name));
    }
    html.push_str("</body></html>");

    ([(header::CONTENT_TYPE, "text/html")], html).into_response()
}

async fn list_dir(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

async fn log_file(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> Response {
    let Some(path) = resolve(&state.log_dir, &name) else {
        debug!("Refusing to serve {:?}", name);
        return (StatusCode::FORBIDDEN, "Permission denied to access log file").into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(contents) => ([(header::CONTENT_TYPE, "text/plain")], contents).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "Log file not found").into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            (StatusCode::FORBIDDEN, "Permission denied to access log file").into_response()
        }
        Err(e) => {
            error!("Error serving log file {:?}: {}", path, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Join a request path onto the log directory; `None` if it would leave it
fn resolve(log_dir: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name.trim_start_matches('/'));
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    (contained && relative.components().next().is_some()).then(|| log_dir.join(relative))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
