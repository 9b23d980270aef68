//! Development server.
//!
//! Serves the SPA output root over HTTP with tiny_http. The request loop
//! runs on its own thread; [`DevServer::shutdown`] unblocks it. Request
//! paths are percent-decoded and must stay inside the output root. With
//! live reload on, HTML responses get the [`reload`] client injected at
//! serve time; files on disk never carry it.
//!
//! ## Readiness
//!
//! [`DevServer::start`] hands back a [`ReadySignal`] that fires once the
//! socket is bound and the loop is about to accept requests. Waiting on it
//! yields one of three outcomes:
//!
//! - [`Readiness::Ready`]: the server is listening
//! - [`Readiness::Cancelled`]: the server thread ended without ever
//!   signalling (its notifier was dropped)
//! - [`Readiness::TimedOut`]: no signal within the configured timeout
//!
//! The browser is only opened on `Ready`.

use crate::reload;
use percent_encoding::percent_decode_str;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Failed to bind after {attempts} attempts (ports {first}-{last}): {message}")]
    Bind {
        attempts: u16,
        first: u16,
        last: u16,
        message: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Bind to `host`, trying successive ports from `base_port` when taken.
/// Returns the server and the port it ended up on.
pub fn bind_with_retry(host: &str, base_port: u16) -> Result<(Server, u16), ServeError> {
    let mut last_error = String::new();
    let mut last_port = base_port;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        last_port = port;
        match Server::http((host, port)) {
            Ok(server) => {
                if offset > 0 {
                    tracing::warn!("port {base_port} in use, using {port} instead");
                }
                return Ok((server, port));
            }
            Err(e) => last_error = e.to_string(),
        }
        if port == u16::MAX {
            break;
        }
    }
    Err(ServeError::Bind {
        attempts: MAX_PORT_RETRIES,
        first: base_port,
        last: last_port,
        message: last_error,
    })
}

// ============================================================================
// Readiness
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Cancelled,
    TimedOut,
}

/// Sending half of the one-shot readiness signal.
#[derive(Debug)]
pub struct ReadyNotifier(Sender<()>);

impl ReadyNotifier {
    /// Fire the signal. Consumes the notifier, so it fires at most once.
    pub fn notify(self) {
        let _ = self.0.send(());
    }
}

/// Receiving half of the one-shot readiness signal.
#[derive(Debug)]
pub struct ReadySignal(Receiver<()>);

impl ReadySignal {
    /// Block until ready, cancelled, or `timeout` elapses. `None` waits
    /// without limit.
    pub fn wait(self, timeout: Option<Duration>) -> Readiness {
        let outcome = match timeout {
            Some(limit) => self.0.recv_timeout(limit),
            None => self.0.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match outcome {
            Ok(()) => Readiness::Ready,
            Err(RecvTimeoutError::Disconnected) => Readiness::Cancelled,
            Err(RecvTimeoutError::Timeout) => Readiness::TimedOut,
        }
    }
}

pub fn ready_channel() -> (ReadyNotifier, ReadySignal) {
    let (tx, rx) = mpsc::channel();
    (ReadyNotifier(tx), ReadySignal(rx))
}

// ============================================================================
// Static files
// ============================================================================

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "application/javascript",
        "css" => "text/css",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Map a request URL to a file under `root`. `/` maps to `index`. Paths
/// escaping the root or not decoding to UTF-8 resolve to `None`.
pub fn resolve_request_path(root: &Path, url: &str, index: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let rel = decoded.trim_start_matches('/');
    let rel = if rel.is_empty() { index } else { rel };

    let rel = Path::new(rel);
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    let candidate = root.join(rel);
    if candidate.is_dir() {
        return Some(candidate.join("index.html"));
    }
    Some(candidate)
}

fn respond(
    request: Request,
    root: &Path,
    index: &str,
    reload_port: Option<u16>,
) -> io::Result<()> {
    let target = resolve_request_path(root, request.url(), index).filter(|p| p.is_file());
    let Some(path) = target else {
        tracing::debug!(url = %request.url(), "404");
        return request.respond(Response::from_string("Not Found").with_status_code(StatusCode(404)));
    };

    let mut body = fs::read(&path)?;
    let mime = content_type(&path);
    if let Some(port) = reload_port
        && mime.starts_with("text/html")
    {
        body = reload::inject_client(body, port);
    }
    let mut response = Response::from_data(body);
    if let Ok(header) = Header::from_bytes("Content-Type", mime) {
        response.add_header(header);
    }
    // Development names are fixed; never let the browser keep stale builds.
    if let Ok(header) = Header::from_bytes("Cache-Control", "no-store") {
        response.add_header(header);
    }
    request.respond(response)
}

// ============================================================================
// Server
// ============================================================================

/// A running development server.
pub struct DevServer {
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
    url: String,
}

impl DevServer {
    /// Bind and start serving `root` on a background thread. `index` is the
    /// file served for `/`. With a `reload_port`, HTML responses carry the
    /// live reload client.
    pub fn start(
        root: PathBuf,
        host: &str,
        port: u16,
        index: &str,
        reload_port: Option<u16>,
    ) -> Result<(Self, ReadySignal), ServeError> {
        let (server, port) = bind_with_retry(host, port)?;
        let server = Arc::new(server);
        let (notifier, signal) = ready_channel();
        let url = format!("http://{host}:{port}/");

        let worker = Arc::clone(&server);
        let index = index.to_string();
        let handle = thread::Builder::new()
            .name("pagepack-serve".into())
            .spawn(move || {
                notifier.notify();
                for request in worker.incoming_requests() {
                    if let Err(e) = respond(request, &root, &index, reload_port) {
                        tracing::warn!("failed to answer request: {e}");
                    }
                }
            })?;

        tracing::info!("serving {url}");
        Ok((
            Self {
                server,
                handle: Some(handle),
                url,
            },
            signal,
        ))
    }

    /// Base URL, ending in `/`.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop accepting requests and wait for the loop to exit.
    pub fn shutdown(mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Open `url` in the system browser. Failure is logged, never fatal.
pub fn open_browser(url: &str) {
    use std::process::Command;

    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    match result {
        Ok(_) => tracing::info!("opened browser at {url}"),
        Err(e) => tracing::warn!("failed to open browser: {e}"),
    }
}

/// Wait for readiness and open the browser at `url` if it arrives.
pub fn open_when_ready(signal: ReadySignal, url: &str, timeout: Option<Duration>) -> Readiness {
    let readiness = signal.wait(timeout);
    match readiness {
        Readiness::Ready => open_browser(url),
        Readiness::Cancelled => tracing::warn!("server stopped before it was ready"),
        Readiness::TimedOut => tracing::warn!("server not ready in time, not opening {url}"),
    }
    readiness
}
