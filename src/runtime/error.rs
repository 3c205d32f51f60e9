//! Runtime error types.
//!
//! Per-connection failures ([`ConnError`]) only ever close the connection
//! they happened on. [`ServerError`] is reserved for conditions that stop the
//! whole event loop.

use crate::codec::FrameError;
use crate::protocols::HandlerError;
use crate::runtime::registry::TableError;
use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// Why a connection was closed.
#[derive(Debug, Error)]
pub enum ConnError {
    /// Peer closed the connection between frames.
    #[error("peer closed the connection")]
    PeerClosed,
    /// Peer closed the connection with a partial frame buffered.
    #[error("peer closed the connection mid-frame ({buffered} bytes buffered)")]
    UnexpectedClose {
        /// Unconsumed bytes left in the read buffer.
        buffered: usize,
    },
    /// Read or write failed for a reason other than blocking.
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
    /// Peer violated the framing protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] FrameError),
    /// Request handler could not produce a reply.
    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),
    /// No I/O progress for longer than the configured idle timeout.
    #[error("idle for longer than {0:?}")]
    IdleTimeout(Duration),
    /// Server is shutting down.
    #[error("server shutting down")]
    Shutdown,
}

impl ConnError {
    /// Whether this is an orderly close rather than a failure.
    pub fn is_graceful(&self) -> bool {
        matches!(self, ConnError::PeerClosed | ConnError::Shutdown)
    }
}

/// Errors that stop the event loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listen address could not be parsed.
    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },
    /// Listening socket setup failed.
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The readiness poll itself failed.
    #[error("readiness poll failed: {0}")]
    Poll(#[source] io::Error),
    /// Connection table invariant broken.
    #[error(transparent)]
    Table(#[from] TableError),
    /// Poll registry setup failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
