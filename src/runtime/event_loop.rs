//! mio event loop implementation.
//!
//! Readiness-based model: poll tells us when sockets are ready,
//! then we perform non-blocking read/write syscalls.
//! Uses epoll on Linux, kqueue on macOS.
//!
//! Everything runs on the calling thread. Each connection is registered for
//! the readiness its state needs (see [`interest_for`]) and is re-armed only
//! when that changes. The poll wakes at least once per `poll_timeout` so
//! housekeeping (idle expiry, shutdown) runs even without traffic.
//!
//! [`interest_for`]: crate::runtime::interest_for

use crate::config::Config;
use crate::protocols::RequestHandler;
use crate::runtime::connection::Connection;
use crate::runtime::error::{ConnError, ServerError};
use crate::runtime::registry::ConnectionTable;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const LISTENER_TOKEN: Token = Token(usize::MAX);
const WAKER_TOKEN: Token = Token(usize::MAX - 1);

type Connections = ConnectionTable<TcpStream>;

/// Stops a running [`Server`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    /// Ask the event loop to close all connections and return.
    pub fn shutdown(&self) -> io::Result<()> {
        self.requested.store(true, Ordering::Release);
        self.waker.wake()
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// Single-threaded framed server.
pub struct Server {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    local_addr: SocketAddr,
    connections: Connections,
    shutdown: ShutdownHandle,
    poll_timeout: Duration,
    idle_timeout: Option<Duration>,
}

impl Server {
    /// Bind the listening socket and set up the poller.
    pub fn bind(config: &Config) -> Result<Self, ServerError> {
        let addr: SocketAddr =
            config
                .listen
                .parse()
                .map_err(|source| ServerError::InvalidAddress {
                    addr: config.listen.clone(),
                    source,
                })?;

        let listener = create_listener(addr, config.backlog)
            .map_err(|source| ServerError::Listen { addr, source })?;
        let mut listener = TcpListener::from_std(listener);
        let local_addr = listener.local_addr()?;

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        let waker = Waker::new(poll.registry(), WAKER_TOKEN)?;

        Ok(Self {
            poll,
            events: Events::with_capacity(config.events_capacity),
            listener,
            local_addr,
            connections: ConnectionTable::new(config.max_connections),
            shutdown: ShutdownHandle {
                requested: Arc::new(AtomicBool::new(false)),
                waker: Arc::new(waker),
            },
            poll_timeout: config.poll_timeout(),
            idle_timeout: config.idle_timeout(),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for stopping [`Server::run`] from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Serve connections until shutdown is requested.
    ///
    /// Per-connection failures never end the loop; only a failing poll or a
    /// broken connection-table invariant does.
    pub fn run<H: RequestHandler>(&mut self, handler: &mut H) -> Result<(), ServerError> {
        let Self {
            poll,
            events,
            listener,
            local_addr,
            connections,
            shutdown,
            poll_timeout,
            idle_timeout,
        } = self;

        info!(
            addr = %local_addr,
            max_connections = connections.capacity(),
            poll_timeout_ms = poll_timeout.as_millis() as u64,
            idle_timeout_ms = (*idle_timeout).map(|d| d.as_millis() as u64),
            "Server listening"
        );

        while !shutdown.is_shutdown() {
            if let Err(e) = poll.poll(events, Some(*poll_timeout)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!(error = %e, "Readiness poll failed");
                return Err(ServerError::Poll(e));
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => accept_connections(listener, poll, connections),
                    WAKER_TOKEN => {}
                    token => {
                        if let Err(e) = service_connection(token, poll, connections, handler) {
                            error!(conn_id = token.0, error = %e, "Event for unknown connection");
                            return Err(e);
                        }
                    }
                }
            }

            if let Some(timeout) = *idle_timeout {
                expire_idle(poll, connections, timeout);
            }
        }

        let open = connections.len();
        for mut conn in connections.drain() {
            conn.close(ConnError::Shutdown);
            if let Err(e) = poll.registry().deregister(conn.stream_mut()) {
                debug!(conn_id = conn.token().0, error = %e, "Failed to deregister connection");
            }
        }
        info!(closed = open, "Server stopped");
        Ok(())
    }
}

/// Bind, configure and start the server with `handler`.
pub fn run<H: RequestHandler>(config: &Config, mut handler: H) -> Result<(), ServerError> {
    let mut server = Server::bind(config)?;
    server.run(&mut handler)
}

fn accept_connections(listener: &TcpListener, poll: &Poll, connections: &mut Connections) {
    loop {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
                }

                let conn = match connections.register(|token| Connection::new(token, stream)) {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(peer = %peer_addr, error = %e, "Rejecting connection");
                        continue;
                    }
                };

                let token = conn.token();
                match poll
                    .registry()
                    .register(conn.stream_mut(), token, Interest::READABLE)
                {
                    Ok(()) => {
                        debug!(conn_id = token.0, peer = %peer_addr, "Accepted connection");
                    }
                    Err(e) => {
                        warn!(conn_id = token.0, error = %e, "Failed to register connection");
                        let _ = connections.remove(token);
                    }
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
                ) =>
            {
                continue
            }
            Err(e) => {
                warn!(error = %e, "Accept error");
                break;
            }
        }
    }
}

fn service_connection<H: RequestHandler>(
    token: Token,
    poll: &Poll,
    connections: &mut Connections,
    handler: &mut H,
) -> Result<(), ServerError> {
    let conn = connections.lookup(token)?;

    let before = conn.interest();
    conn.on_ready(handler);
    let after = conn.interest();

    if after != before {
        if let Some(interest) = after {
            if let Err(e) = poll.registry().reregister(conn.stream_mut(), token, interest) {
                conn.close(ConnError::Io(e));
            }
        }
    }

    if conn.is_closing() {
        close_connection(poll, connections, token);
    }
    Ok(())
}

fn expire_idle(poll: &Poll, connections: &mut Connections, timeout: Duration) {
    let now = Instant::now();
    let expired: Vec<Token> = connections
        .iter()
        .filter(|(_, conn)| conn.idle_for(now) >= timeout)
        .map(|(token, _)| token)
        .collect();

    for token in expired {
        if let Ok(conn) = connections.lookup(token) {
            conn.close(ConnError::IdleTimeout(timeout));
        }
        close_connection(poll, connections, token);
    }
}

/// Remove a closing connection, then deregister and close its socket.
fn close_connection(poll: &Poll, connections: &mut Connections, token: Token) {
    if let Ok(mut conn) = connections.remove(token) {
        if let Err(e) = poll.registry().deregister(conn.stream_mut()) {
            debug!(conn_id = token.0, error = %e, "Failed to deregister connection");
        }

        match conn.close_reason() {
            Some(reason) if reason.is_graceful() => {
                debug!(conn_id = token.0, reason = %reason, "Connection closed");
            }
            Some(reason) => {
                debug!(conn_id = token.0, error = %reason, "Connection closed with error");
            }
            None => debug!(conn_id = token.0, "Connection closed"),
        }
    }
}

/// Create a non-blocking TCP listener.
fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}
