//! Watch-and-rebuild loop for development SPA builds.
//!
//! ```text
//! initial build → serve output root → open browser once ready
//!       ↓
//! source change → debounce → rebuild → (Ready | Failed) → wait for next change
//!                                          ↓
//!                                 Ready → reload open pages
//!       ↓
//! Ctrl-C → stop watching → stop server
//! ```
//!
//! A failed rebuild is logged and the loop keeps running; the server goes on
//! serving the last good output until the next change fixes the build.
//! Pages are only told to reload after a build that succeeded.

use crate::config::{ServerConfig, WatchConfig};
use crate::pipeline::{BuildError, BuildState, Builder};
use crate::reload::{ReloadHandle, ReloadServer};
use crate::server::{self, DevServer, ServeError};
use crate::transform::TransformBackend;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error("Failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error(transparent)]
    Serve(#[from] ServeError),
    #[error(transparent)]
    Build(#[from] BuildError),
}

enum Message {
    Changed(Vec<PathBuf>),
    Shutdown,
}

// ============================================================================
// Event filtering
// ============================================================================

/// Editor swap files and similar noise that never affect a build.
fn is_temp_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    name.starts_with(".#")
        || name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".swx")
        || name.ends_with(".tmp")
}

/// Whether a changed path can affect the next build.
pub fn is_relevant(path: &Path, root: &Path, ignored: &[PathBuf]) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    let hidden = rel
        .components()
        .any(|c| c.as_os_str().to_str().is_some_and(|s| s.starts_with('.')));
    !hidden && !is_temp_file(path) && !ignored.iter().any(|ig| path.starts_with(ig))
}

/// Paths of a notify event worth a rebuild. Metadata-only changes (mtime,
/// permissions) are dropped.
fn relevant_paths(event: &Event, root: &Path, ignored: &[PathBuf]) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => {}
        EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => {}
        _ => return Vec::new(),
    }
    event
        .paths
        .iter()
        .filter(|p| is_relevant(p, root, ignored))
        .cloned()
        .collect()
}

// ============================================================================
// Debouncer
// ============================================================================

/// Collects changed paths until no new change arrived for the quiet period.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: BTreeSet<PathBuf>,
    last_change: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: BTreeSet::new(),
            last_change: None,
        }
    }

    pub fn record(&mut self, paths: impl IntoIterator<Item = PathBuf>, now: Instant) {
        let mut any = false;
        for path in paths {
            self.pending.insert(path);
            any = true;
        }
        if any {
            self.last_change = Some(now);
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The batch, once the quiet period has passed since the last change.
    pub fn take_if_ready(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        let last = self.last_change?;
        if self.pending.is_empty() || now.duration_since(last) < self.quiet {
            return None;
        }
        self.last_change = None;
        Some(std::mem::take(&mut self.pending).into_iter().collect())
    }
}

// ============================================================================
// Loop
// ============================================================================

/// Build once and, on success, tell connected pages to reload.
fn rebuild<B: TransformBackend>(
    builder: &mut Builder<B>,
    reload: Option<&ReloadHandle>,
) -> BuildState {
    match builder.build() {
        Ok(report) => {
            tracing::info!(files = report.files.len(), "rebuilt");
            if let Some(reload) = reload {
                reload.broadcast_reload();
            }
        }
        Err(err) => tracing::error!("build failed: {err}"),
    }
    let state = builder.state();
    debug_assert!(matches!(state, BuildState::Ready | BuildState::Failed));
    state
}

/// Build, serve, and rebuild on change until Ctrl-C.
pub fn run_dev<B: TransformBackend>(
    mut builder: Builder<B>,
    server_config: &ServerConfig,
    watch_config: &WatchConfig,
) -> Result<(), WatchError> {
    let locations = builder.locations()?;
    rebuild(&mut builder, None);

    let (tx, rx) = mpsc::channel();
    let shutdown_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(Message::Shutdown);
    })?;

    let reload_server = if server_config.live_reload {
        Some(ReloadServer::start(&server_config.host, server_config.reload_port)?)
    } else {
        None
    };
    let reload = reload_server.as_ref().map(ReloadServer::handle);

    let (server, ready) = DevServer::start(
        locations.output_root.clone(),
        &server_config.host,
        server_config.port,
        &locations.document,
        reload_server.as_ref().map(ReloadServer::port),
    )?;
    let page = format!("{}{}", server.url(), locations.document);
    if server_config.open_browser {
        let timeout = server_config.ready_timeout_secs.map(Duration::from_secs);
        thread::spawn(move || server::open_when_ready(ready, &page, timeout));
    }

    let root = locations.source_root.clone();
    let ignored = vec![locations.output_root.join(&locations.assets_dir)];
    let watch_root = root.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            let paths = relevant_paths(&event, &watch_root, &ignored);
            if !paths.is_empty() {
                let _ = tx.send(Message::Changed(paths));
            }
        }
        Err(e) => tracing::warn!("watch error: {e}"),
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tracing::info!("watching {} (Ctrl-C to stop)", root.display());

    let mut debouncer = Debouncer::new(Duration::from_millis(watch_config.debounce_ms));
    loop {
        let wait = if debouncer.is_pending() {
            Duration::from_millis(watch_config.debounce_ms.max(10))
        } else {
            Duration::from_secs(3600)
        };
        match rx.recv_timeout(wait) {
            Ok(Message::Changed(paths)) => debouncer.record(paths, Instant::now()),
            Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        if let Some(changed) = debouncer.take_if_ready(Instant::now()) {
            for path in &changed {
                tracing::debug!(path = %path.display(), "changed");
            }
            tracing::info!(changes = changed.len(), "rebuilding");
            rebuild(&mut builder, reload.as_ref());
        }
    }

    tracing::info!("shutting down");
    drop(watcher);
    server.shutdown();
    if let Some(reload_server) = reload_server {
        reload_server.shutdown();
    }
    Ok(())
}
