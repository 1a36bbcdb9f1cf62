//! Local serving of the output directory.
//!
//! The server exposes every file in the output directory and, for
//! development sessions with live reload, a server-sent event stream that
//! emits one `change` event per successful rebuild.

mod port;

use std::convert::Infallible;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

use crate::bundle::ChangeSender;

pub use port::bind_free_port;

/// Path of the change-event stream.
pub const EVENTS_PATH: &str = "esbuild";

/// Errors raised while setting up the server.
#[derive(Debug, Error)]
pub enum ServeError {
  #[error("no free port on {host} between {start} and 65535")]
  PortUnavailable { host: String, start: u16 },

  #[error("failed to bind {host}:{port}: {source}")]
  Bind {
    host: String,
    port: u16,
    source: std::io::Error,
  },

  #[error("`{host}` does not form a valid server address: {source}")]
  Address { host: String, source: url::ParseError },
}

/// A listener bound to a free port, not yet serving.
#[derive(Debug)]
pub struct BoundPort {
  listener: TcpListener,
  host: String,
  port: u16,
  base: Url,
}

impl BoundPort {
  pub fn new(listener: TcpListener, host: impl Into<String>, port: u16) -> Result<Self, ServeError> {
    let host = host.into();
    let base = Url::parse(&base_url(&host, port)).map_err(|source| ServeError::Address {
      host: host.clone(),
      source,
    })?;
    Ok(Self {
      listener,
      host,
      port,
      base,
    })
  }

  pub fn port(&self) -> u16 {
    self.port
  }

  /// `http://host:port/`
  pub fn base_url(&self) -> String {
    self.base.to_string()
  }

  /// Address of the file `name` directly under the served directory.
  ///
  /// The name is percent-encoded as a single path segment, so `#`, `?` and
  /// `%` in file names survive the round trip.
  pub fn url_for(&self, name: &str) -> String {
    let mut url = self.base.clone();
    // http URLs always have path segments
    if let Ok(mut segments) = url.path_segments_mut() {
      segments.pop_if_empty().push(name);
    }
    url.into()
  }

  /// Address of the change-event stream.
  pub fn events_url(&self) -> String {
    self.url_for(EVENTS_PATH)
  }

  /// Start serving `root` in the background.
  ///
  /// The change stream is only exposed when `changes` is given.
  pub fn serve(self, root: PathBuf, changes: Option<ChangeSender>) -> ServingEndpoint {
    let base = self.base_url();
    let app = router(root.clone(), changes);

    info!(url = %base, root = %root.display(), "serving output directory");
    let task = tokio::spawn(async move {
      if let Err(e) = axum::serve(self.listener, app).await {
        error!(error = %e, "server stopped");
      }
    });

    ServingEndpoint {
      host: self.host,
      port: self.port,
      root,
      base: self.base,
      task,
    }
  }
}

/// A running server. It stops when the process exits or the endpoint is dropped.
#[derive(Debug)]
pub struct ServingEndpoint {
  pub host: String,
  pub port: u16,
  pub root: PathBuf,
  base: Url,
  task: JoinHandle<()>,
}

impl ServingEndpoint {
  pub fn base_url(&self) -> String {
    self.base.to_string()
  }
}

impl Drop for ServingEndpoint {
  fn drop(&mut self) {
    self.task.abort();
  }
}

fn base_url(host: &str, port: u16) -> String {
  if host.contains(':') {
    format!("http://[{host}]:{port}/")
  } else {
    format!("http://{host}:{port}/")
  }
}

#[derive(Clone)]
struct ServerState {
  root: Arc<PathBuf>,
  changes: Option<ChangeSender>,
}

/// Routes for the output directory and the change stream.
pub fn router(root: PathBuf, changes: Option<ChangeSender>) -> Router {
  let state = ServerState {
    root: Arc::new(root),
    changes: changes.clone(),
  };

  let mut app = Router::new().route("/{*path}", get(serve_file));
  if changes.is_some() {
    app = app.route(&format!("/{EVENTS_PATH}"), get(change_events));
  }
  app.with_state(state)
}

async fn serve_file(State(state): State<ServerState>, UrlPath(path): UrlPath<String>) -> Response {
  let Some(file) = resolve(&state.root, &path) else {
    return StatusCode::NOT_FOUND.into_response();
  };

  match tokio::fs::read(&file).await {
    Ok(bytes) => {
      debug!(path = %file.display(), size = bytes.len(), "serving file");
      (
        [
          (CONTENT_TYPE, content_type(&file)),
          (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
          (CACHE_CONTROL, "no-cache"),
        ],
        bytes,
      )
        .into_response()
    }
    Err(_) => StatusCode::NOT_FOUND.into_response(),
  }
}

async fn change_events(State(state): State<ServerState>) -> Response {
  let Some(changes) = state.changes else {
    return StatusCode::NOT_FOUND.into_response();
  };
  debug!("change stream subscriber connected");

  let stream = futures::stream::unfold(changes.subscribe(), |mut rx| async move {
    match rx.recv().await {
      // a lagged receiver still learns that something changed
      Ok(()) | Err(RecvError::Lagged(_)) => Some((Ok::<_, Infallible>(Event::default().event("change").data("{}")), rx)),
      Err(RecvError::Closed) => None,
    }
  });

  (
    [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
    Sse::new(stream).keep_alive(KeepAlive::default()),
  )
    .into_response()
}

/// Map a request path onto a file under `root`, rejecting anything that
/// would leave it.
fn resolve(root: &Path, request: &str) -> Option<PathBuf> {
  let relative = Path::new(request.trim_start_matches('/'));
  if relative.as_os_str().is_empty() {
    return None;
  }
  if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
    return None;
  }
  Some(root.join(relative))
}

fn content_type(path: &Path) -> &'static str {
  match path.extension().and_then(|e| e.to_str()) {
    Some("js" | "mjs") => "application/javascript; charset=utf-8",
    Some("json" | "map") => "application/json",
    Some("html" | "htm") => "text/html; charset=utf-8",
    Some("css") => "text/css; charset=utf-8",
    Some("txt") => "text/plain; charset=utf-8",
    _ => "application/octet-stream",
  }
}
