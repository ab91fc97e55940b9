//! Event loop and connection table.
//!
//! The single-threaded driver: one `mio::Poll`, one listening socket,
//! and a `slab`-backed connection table keyed by mio `Token`. Readiness
//! is dispatched straight into `Connection::dispatch`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use socket2::{Domain, Socket, Type};

use crate::accesslog::AccessLog;
use crate::config::Config;
use crate::connection::{Connection, Outcome};
use crate::error::ServerError;

/// Reserved token for the listening socket; connection tokens are
/// `Token(slab_key + 1)`, keeping them disjoint without a second map.
const LISTENER_TOKEN: Token = Token(0);
const EVENTS_CAPACITY: usize = 1024;

/// Upper bound on simultaneously open connections.
const MAX_CONNECTIONS: usize = 1024;

pub struct Server {
    poll: Poll,
    listener: TcpListener,
    connections: Slab<Connection>,
    config: Config,
    access_log: Option<AccessLog>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Binds the listening socket with `SO_REUSEADDR` and a backlog of
    /// 10, and opens the access log if configured.
    pub fn bind(config: Config) -> Result<Server, ServerError> {
        let addr: SocketAddr = format!("0.0.0.0:{}", config.listen_port)
            .parse()
            .expect("0.0.0.0:<u16> always parses");

        let socket = Socket::new(Domain::IPV4, Type::STREAM, None)
            .map_err(|e| ServerError::BindFailed(e.to_string()))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::BindFailed(e.to_string()))?;
        socket
            .bind(&addr.into())
            .map_err(|e| ServerError::BindFailed(e.to_string()))?;
        socket
            .listen(10)
            .map_err(|e| ServerError::BindFailed(e.to_string()))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::BindFailed(e.to_string()))?;

        let std_listener: std::net::TcpListener = socket.into();
        let mut listener = TcpListener::from_std(std_listener);

        let poll = Poll::new().map_err(|e| ServerError::BindFailed(e.to_string()))?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(|e| ServerError::BindFailed(e.to_string()))?;

        let access_log = match &config.log_file {
            Some(path) => Some(
                AccessLog::open(path)
                    .map_err(|e| ServerError::BindFailed(format!("log file {:?}: {}", path, e)))?,
            ),
            None => None,
        };

        let shutdown = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))
            .map_err(|e| ServerError::BindFailed(format!("installing SIGINT handler: {}", e)))?;
        // Made explicit even though write() surfaces EPIPE directly.
        unsafe {
            signal_hook::low_level::register(signal_hook::consts::SIGPIPE, || {})
                .map_err(|e| ServerError::BindFailed(format!("installing SIGPIPE handler: {}", e)))?;
        }

        log::info!("listening on {}", addr);

        Ok(Server {
            poll,
            listener,
            connections: Slab::with_capacity(MAX_CONNECTIONS),
            config,
            access_log,
            shutdown,
        })
    }

    /// Runs the event loop until SIGINT triggers graceful teardown, or an
    /// unrecoverable poll error.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        let timeout = Duration::from_millis(self.config.timeout_ms);

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.poll.poll(&mut events, Some(timeout)) {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            for event in events.iter() {
                if event.token() == LISTENER_TOKEN {
                    self.accept_all();
                    continue;
                }

                let key = event.token().0 - 1;
                if !self.connections.contains(key) {
                    continue;
                }

                if event.is_error() || (event.is_read_closed() && event.is_write_closed()) {
                    self.retire(key);
                    continue;
                }

                let outcome = {
                    let conn = &mut self.connections[key];
                    conn.dispatch(&self.config, &mut self.access_log)
                };
                match outcome {
                    Outcome::Suspend => {}
                    Outcome::Finished | Outcome::Failed => self.retire(key),
                }
            }
        }

        self.shutdown_gracefully();
        Ok(())
    }

    /// Drains the accept queue: `accept()` in a loop
    /// until it would block, registering each new connection for
    /// combined read/write readiness (this server's sockets are always
    /// interested in both: a connection is either still reading its
    /// header or already writing its response).
    fn accept_all(&mut self) {
        loop {
            let (mut stream, peer) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(ref e) if crate::io::is_would_block(e) => return,
                Err(e) => {
                    log::warn!("accept failed: {}", e);
                    return;
                }
            };

            if self.connections.len() >= MAX_CONNECTIONS {
                log::warn!("connection table full, dropping new connection from {}", peer);
                continue;
            }

            let entry = self.connections.vacant_entry();
            let key = entry.key();
            let token = Token(key + 1);
            if let Err(e) = self.poll.registry().register(
                &mut stream,
                token,
                Interest::READABLE | Interest::WRITABLE,
            ) {
                log::warn!("failed to register connection from {}: {}", peer, e);
                continue;
            }
            entry.insert(Connection::new(stream, token, peer));
        }
    }

    fn retire(&mut self, key: usize) {
        if !self.connections.contains(key) {
            return;
        }
        let mut conn = self.connections.remove(key);
        let _ = self.poll.registry().deregister(&mut conn.stream);
        let _ = conn.stream.shutdown(std::net::Shutdown::Both);
    }

    fn shutdown_gracefully(&mut self) {
        log::info!("received shutdown signal, retiring {} connection(s)", self.connections.len());
        let keys: Vec<usize> = self.connections.iter().map(|(k, _)| k).collect();
        for key in keys {
            self.retire(key);
        }
        let _ = self.poll.registry().deregister(&mut self.listener);
        if let Some(log) = self.access_log.as_mut() {
            if let Err(e) = log.flush() {
                log::warn!("failed to flush access log during shutdown: {}", e);
            }
        }
    }
}
