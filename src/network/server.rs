//! TCP Server
//!
//! Accepts connections on a dedicated thread and runs one worker thread
//! per connection. Workers speak whichever protocol the first byte
//! selects and dispatch requests into the shared store.

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{FerroError, Result};
use crate::protocol::{Command, Request, Response};
use crate::store::Store;

use super::handler::ProtocolDriver;

/// Construction options for [`Server`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Address to bind.
    pub host: String,

    /// Port to bind; 0 binds an ephemeral port, query it via
    /// [`Server::port`].
    pub port: u16,

    /// Maximum simultaneous client connections; the accept loop stalls
    /// while at the limit.
    pub max_connections: usize,

    /// Per-client socket read/write timeout.
    pub client_timeout: Option<Duration>,

    /// Skip auto-detection and treat every connection as binary.
    pub force_binary: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            max_connections: 1000,
            client_timeout: Some(Duration::from_secs(300)),
            force_binary: false,
        }
    }
}

/// Worker handle plus its completion flag. Handles live on the heap via
/// `Arc` so the list can grow without invalidating the flag an in-flight
/// worker writes to.
struct ClientHandle {
    handle: JoinHandle<()>,
    finished: Arc<AtomicBool>,
}

/// Multi-threaded TCP server over one storage backend.
pub struct Server {
    store: Arc<dyn Store>,
    options: ServerOptions,
    running: Arc<AtomicBool>,
    actual_port: Arc<AtomicU16>,
    accept_handle: Mutex<Option<JoinHandle<()>>>,
    clients: Arc<Mutex<Vec<ClientHandle>>>,
}

impl Server {
    pub fn new(store: Arc<dyn Store>, options: ServerOptions) -> Self {
        Self {
            store,
            options,
            running: Arc::new(AtomicBool::new(false)),
            actual_port: Arc::new(AtomicU16::new(0)),
            accept_handle: Mutex::new(None),
            clients: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Bind the listener and spawn the accept thread. Returns once the
    /// server is accepting; it keeps running until [`Server::stop`].
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let addr = format!("{}:{}", self.options.host, self.options.port);
        let listener = TcpListener::bind(&addr)
            .map_err(|e| FerroError::Network(format!("failed to bind {}: {}", addr, e)))?;
        let local = listener
            .local_addr()
            .map_err(|e| FerroError::Network(format!("failed to query bound address: {}", e)))?;
        self.actual_port.store(local.port(), Ordering::SeqCst);

        // nonblocking accept so the loop can observe the running flag
        listener.set_nonblocking(true)?;

        let store = Arc::clone(&self.store);
        let running = Arc::clone(&self.running);
        let clients = Arc::clone(&self.clients);
        let options = self.options.clone();

        let handle = thread::Builder::new()
            .name("ferrokv-accept".to_string())
            .spawn(move || accept_loop(listener, store, options, running, clients))
            .map_err(|e| FerroError::Network(format!("failed to spawn accept thread: {}", e)))?;
        *self.accept_handle.lock() = Some(handle);

        tracing::info!("server listening on {}", local);
        Ok(())
    }

    /// Stop accepting, then join the accept thread and every client
    /// worker. Idempotent.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!("server stopping");

        if let Some(handle) = self.accept_handle.lock().take() {
            let _ = handle.join();
        }

        let mut clients = self.clients.lock();
        for client in clients.drain(..) {
            let _ = client.handle.join();
        }

        tracing::info!("server stopped");
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The actually bound port (meaningful after `start`, also when the
    /// configured port was 0).
    pub fn port(&self) -> u16 {
        self.actual_port.load(Ordering::SeqCst)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: TcpListener,
    store: Arc<dyn Store>,
    options: ServerOptions,
    running: Arc<AtomicBool>,
    clients: Arc<Mutex<Vec<ClientHandle>>>,
) {
    while running.load(Ordering::SeqCst) {
        reap_finished(&clients);

        if clients.lock().len() >= options.max_connections {
            thread::sleep(Duration::from_millis(10));
            continue;
        }

        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(10));
                continue;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::error!("accept failed: {}", e);
                    continue;
                }
                break;
            }
        };

        // accepted sockets inherit the listener's nonblocking mode on some
        // platforms; connection workers expect blocking reads
        let _ = stream.set_nonblocking(false);

        if let Some(timeout) = options.client_timeout {
            let _ = stream.set_read_timeout(Some(timeout));
            let _ = stream.set_write_timeout(Some(timeout));
        }

        tracing::debug!("client connected: {}", peer);

        let finished = Arc::new(AtomicBool::new(false));
        let worker_finished = Arc::clone(&finished);
        let worker_store = Arc::clone(&store);
        let worker_running = Arc::clone(&running);
        let force_binary = options.force_binary;

        let spawned = thread::Builder::new()
            .name(format!("ferrokv-conn-{}", peer))
            .spawn(move || {
                handle_client(stream, worker_store, worker_running, force_binary);
                worker_finished.store(true, Ordering::SeqCst);
                tracing::debug!("client disconnected: {}", peer);
            });

        match spawned {
            Ok(handle) => clients.lock().push(ClientHandle { handle, finished }),
            Err(e) => tracing::error!("failed to spawn connection worker: {}", e),
        }
    }
}

/// Join workers that have flagged themselves finished so a long-running
/// server does not accumulate dead handles.
fn reap_finished(clients: &Mutex<Vec<ClientHandle>>) {
    let mut clients = clients.lock();
    let mut i = 0;
    while i < clients.len() {
        if clients[i].finished.load(Ordering::SeqCst) {
            let client = clients.swap_remove(i);
            let _ = client.handle.join();
        } else {
            i += 1;
        }
    }
}

fn handle_client(
    mut stream: TcpStream,
    store: Arc<dyn Store>,
    running: Arc<AtomicBool>,
    force_binary: bool,
) {
    let mut driver = match ProtocolDriver::detect(&stream, force_binary) {
        Ok(Some(driver)) => driver,
        _ => return,
    };

    while running.load(Ordering::SeqCst) {
        let response = match driver.read_request(&mut stream) {
            Ok(Some(request)) => process_request(store.as_ref(), &request),
            Ok(None) => break,
            Err(e) => Response::error(e.to_string()),
        };

        if !driver.write_response(&mut stream, &response) || response.close_connection {
            break;
        }
    }
}

/// Map one request onto the store, converting any store failure into a
/// wire error so the connection survives.
fn process_request(store: &dyn Store, req: &Request) -> Response {
    let result = dispatch(store, req);
    result.unwrap_or_else(|e| Response::error(format!("internal error: {}", e)))
}

fn dispatch(store: &dyn Store, req: &Request) -> Result<Response> {
    Ok(match req.command {
        Command::Get => {
            if req.key.is_empty() {
                return Ok(Response::error("usage: GET key"));
            }
            match store.get(&req.key)? {
                Some(value) => Response::ok_with(value),
                None => Response::not_found(),
            }
        }

        Command::Put => {
            if req.key.is_empty() {
                return Ok(Response::error("usage: PUT key value"));
            }
            store.put(&req.key, &req.value)?;
            Response::ok()
        }

        Command::PutEx => {
            if req.key.is_empty() {
                return Ok(Response::error("usage: PUTEX key ms value"));
            }
            store.put_with_ttl(
                &req.key,
                &req.value,
                Duration::from_millis(req.ttl_ms.max(0) as u64),
            )?;
            Response::ok()
        }

        Command::Del => {
            if req.key.is_empty() {
                return Ok(Response::error("usage: DEL key"));
            }
            if store.remove(&req.key)? {
                Response::ok()
            } else {
                Response::not_found()
            }
        }

        Command::Exists => {
            if req.key.is_empty() {
                return Ok(Response::error("usage: EXISTS key"));
            }
            Response::ok_with(if store.contains(&req.key)? { "1" } else { "0" })
        }

        Command::Size => Response::ok_with(store.len().to_string()),

        Command::Clear => {
            store.clear()?;
            Response::ok()
        }

        Command::Ping => Response::ok_with("PONG"),

        Command::Quit => Response::bye(),

        Command::Unknown => Response::error("unknown command"),
    })
}
