//! Live reload over WebSocket.
//!
//! A [`ReloadServer`] listens on its own port next to the dev server. HTML
//! served by [`DevServer`](crate::server::DevServer) carries a small script
//! that connects back to it, and [`ReloadHandle::broadcast_reload`] tells
//! every connected page to reload after a successful rebuild.

use crate::server::ServeError;
use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::{Message, WebSocket};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Text frame telling a page to reload.
pub const RELOAD_MESSAGE: &str = "reload";

const ACCEPT_POLL: Duration = Duration::from_millis(100);
const SEND_TIMEOUT: Duration = Duration::from_secs(1);

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Cloneable handle for notifying connected pages.
#[derive(Clone, Default)]
pub struct ReloadHandle {
    clients: Clients,
}

impl ReloadHandle {
    fn lock(&self) -> MutexGuard<'_, Vec<WebSocket<TcpStream>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    /// Send the reload message to every client. Clients whose socket fails
    /// are dropped. Returns how many are still connected.
    pub fn broadcast_reload(&self) -> usize {
        let mut clients = self.lock();
        clients.retain_mut(|ws| ws.send(Message::Text(RELOAD_MESSAGE.into())).is_ok());
        tracing::debug!(clients = clients.len(), "sent reload");
        clients.len()
    }

    fn add(&self, stream: TcpStream) {
        let _ = stream.set_nonblocking(false);
        let _ = stream.set_read_timeout(Some(SEND_TIMEOUT));
        let _ = stream.set_write_timeout(Some(SEND_TIMEOUT));
        match tungstenite::accept(stream) {
            Ok(ws) => self.lock().push(ws),
            Err(e) => tracing::debug!("reload handshake failed: {e}"),
        }
    }
}

fn bind_with_retry(host: &str, base_port: u16) -> Result<(TcpListener, u16), ServeError> {
    let mut last_error = String::new();
    let mut last_port = base_port;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        last_port = port;
        match TcpListener::bind((host, port)) {
            Ok(listener) => {
                let port = listener.local_addr()?.port();
                return Ok((listener, port));
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

/// A running live reload endpoint.
pub struct ReloadServer {
    handle: ReloadHandle,
    port: u16,
    stop: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

impl ReloadServer {
    /// Bind on `host`, from `base_port` upwards, and accept clients on a
    /// background thread.
    pub fn start(host: &str, base_port: u16) -> Result<Self, ServeError> {
        let (listener, port) = bind_with_retry(host, base_port)?;
        listener.set_nonblocking(true)?;

        let handle = ReloadHandle::default();
        let stop = Arc::new(AtomicBool::new(false));
        let clients = handle.clone();
        let stopped = Arc::clone(&stop);
        let acceptor = thread::Builder::new()
            .name("pagepack-reload".into())
            .spawn(move || {
                while !stopped.load(Ordering::Relaxed) {
                    match listener.accept() {
                        Ok((stream, addr)) => {
                            tracing::debug!(%addr, "reload client connected");
                            clients.add(stream);
                        }
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                            thread::sleep(ACCEPT_POLL);
                        }
                        Err(e) => {
                            tracing::warn!("reload accept error: {e}");
                            thread::sleep(ACCEPT_POLL);
                        }
                    }
                }
            })?;

        tracing::info!("live reload on port {port}");
        Ok(Self {
            handle,
            port,
            stop,
            acceptor: Some(acceptor),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn handle(&self) -> ReloadHandle {
        self.handle.clone()
    }

    /// Stop accepting and close every client.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
        for mut ws in self.handle.lock().drain(..) {
            let _ = ws.close(None);
            let _ = ws.flush();
        }
    }
}

/// Client script connecting a page to the reload endpoint on `port`.
pub fn client_script(port: u16) -> String {
    format!(
        "<script>(function(){{var ws=new WebSocket(\"ws://\"+location.hostname+\":{port}/\");\
         ws.onmessage=function(e){{if(e.data===\"{RELOAD_MESSAGE}\")location.reload();}};}})();</script>"
    )
}

/// Insert the client script before the last `</body>`, or append it when
/// the document has none.
pub fn inject_client(body: Vec<u8>, port: u16) -> Vec<u8> {
    const MARKER: &[u8] = b"</body>";
    let script = client_script(port);
    let at = body
        .windows(MARKER.len())
        .rposition(|w| w.eq_ignore_ascii_case(MARKER))
        .unwrap_or(body.len());
    let mut out = Vec::with_capacity(body.len() + script.len());
    out.extend_from_slice(&body[..at]);
    out.extend_from_slice(script.as_bytes());
    out.extend_from_slice(&body[at..]);
    out
}
