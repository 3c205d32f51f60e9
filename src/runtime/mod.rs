//! Single-threaded readiness runtime.
//!
//! One mio poll loop owns the listening socket and every accepted
//! connection. Building blocks:
//! - `ReadBuffer` / `WriteBuffer`: per-connection byte queues
//! - `Connection`: connection state machine
//! - `ConnectionTable`: slab-backed owner of live connections
//! - `Server`: the event loop tying them together

mod buffer;
mod connection;
mod error;
mod event_loop;
mod registry;

pub use buffer::{ReadBuffer, WriteBuffer};
pub use connection::{interest_for, ConnState, Connection};
pub use error::{ConnError, ServerError};
pub use event_loop::{run, Server, ShutdownHandle};
pub use registry::{ConnectionTable, TableError};
