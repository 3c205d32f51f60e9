//! Registry of live connections.
//!
//! The table is the sole owner of every connection. Handles are slab keys
//! wrapped in a `Token`, so they double as poll registration tokens and are
//! only reused after the previous owner has been removed.

use crate::runtime::connection::Connection;
use mio::Token;
use slab::Slab;
use thiserror::Error;

/// Connection table errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// Registry is at its configured capacity.
    #[error("connection limit of {max} reached")]
    Full { max: usize },
    /// No live connection owns the handle.
    #[error("no live connection for {0:?}")]
    NotFound(Token),
}

/// Registry of active connections using slab allocation.
///
/// Provides O(1) insert, lookup, and remove operations.
pub struct ConnectionTable<S> {
    connections: Slab<Connection<S>>,
    max_connections: usize,
}

impl<S> ConnectionTable<S> {
    /// Create a new table with the specified maximum capacity.
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: Slab::with_capacity(max_connections),
            max_connections,
        }
    }

    /// Insert a connection under a fresh handle.
    ///
    /// `build` receives the handle the connection will be stored under. The
    /// stored connection is returned so the caller can finish setting it up.
    pub fn register<F>(&mut self, build: F) -> Result<&mut Connection<S>, TableError>
    where
        F: FnOnce(Token) -> Connection<S>,
    {
        if self.is_full() {
            return Err(TableError::Full {
                max: self.max_connections,
            });
        }

        let entry = self.connections.vacant_entry();
        let token = Token(entry.key());
        let conn = build(token);
        debug_assert_eq!(conn.token(), token, "connection built for another handle");
        Ok(entry.insert(conn))
    }

    /// Get the connection owning `token`.
    pub fn lookup(&mut self, token: Token) -> Result<&mut Connection<S>, TableError> {
        self.connections
            .get_mut(token.0)
            .ok_or(TableError::NotFound(token))
    }

    /// Remove a connection, handing ownership back to the caller.
    ///
    /// The caller closes the socket by dropping the returned connection.
    pub fn remove(&mut self, token: Token) -> Result<Connection<S>, TableError> {
        self.connections
            .try_remove(token.0)
            .ok_or(TableError::NotFound(token))
    }

    /// Check if `token` is owned by a live connection.
    #[cfg(test)]
    pub fn contains(&self, token: Token) -> bool {
        self.connections.contains(token.0)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if no connections are live.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Check if the table is at its capacity.
    pub fn is_full(&self) -> bool {
        self.connections.len() >= self.max_connections
    }

    /// Maximum number of connections allowed.
    pub fn capacity(&self) -> usize {
        self.max_connections
    }

    /// Iterate over all connections.
    pub fn iter(&self) -> impl Iterator<Item = (Token, &Connection<S>)> {
        self.connections.iter().map(|(key, conn)| (Token(key), conn))
    }

    /// Remove every connection.
    pub fn drain(&mut self) -> impl Iterator<Item = Connection<S>> + '_ {
        self.connections.drain()
    }
}
